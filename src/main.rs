use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod config;
mod db;
mod middleware;
mod realtime;
mod utils;

use crate::api::auth::AuthDoc;
use crate::config::Config;
use crate::db::pool::{get_db_pool, run_migrations};
use crate::db::queries::notification::NotificationDoc;
use crate::db::queries::project::ProjectDoc;
use crate::db::queries::task::TaskDoc;
use crate::db::queries::task_status::TaskStatusDoc;
use crate::db::queries::team::TeamDoc;
use crate::db::queries::user::UserDoc;
use crate::middleware::auth::{create_permission_cache, jwt_middleware, permission_middleware};
use crate::realtime::UserChannels;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Config::init();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let pool = get_db_pool().await?;
    run_migrations(&pool).await?;

    let permission_cache = create_permission_cache();
    let channels = UserChannels::new();

    let merged_doc = AuthDoc::openapi()
        .merge_from(TeamDoc::openapi())
        .merge_from(UserDoc::openapi())
        .merge_from(ProjectDoc::openapi())
        .merge_from(TaskDoc::openapi())
        .merge_from(TaskStatusDoc::openapi())
        .merge_from(NotificationDoc::openapi());

    // Public routes
    let public_routes = Router::new().merge(api::auth::auth_routes());

    // Private routes
    let private_routes = Router::new()
        .merge(api::team::team_routes())
        .merge(api::user::user_routes())
        .merge(api::project::project_routes())
        .merge(api::task::task_routes())
        .merge(api::task_status::task_status_routes())
        .merge(api::notification::notification_routes())
        .merge(api::events::event_routes())
        .route_layer(from_fn_with_state(pool.clone(), permission_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(Extension(permission_cache.clone()))
        .layer(Extension(channels.clone()))
        .with_state(pool.clone());

    run_server(app, pool).await;
    tracing::info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal(pool: PgPool) {
    signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Received Ctrl+C, shutting down...");
    pool.close().await;
    tracing::info!("Database pool closed. Server shutting down.");
}

async fn run_server(app: Router, pool: PgPool) {
    let addr = Config::get().bind_addr.clone();
    tracing::info!("Server running at http://{addr}");

    let listener = TcpListener::bind(&addr).await.expect("Failed to bind listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(pool))
        .await
        .expect("Server encountered an error");
}
