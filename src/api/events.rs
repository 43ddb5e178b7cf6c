use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::Extension,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use sqlx::PgPool;
use tokio_stream::{wrappers::BroadcastStream, StreamExt as _};

use crate::api::auth::Claims;
use crate::realtime::UserChannels;
use crate::utils::api_response::ApiResponse;

/// Register the realtime event route
pub fn event_routes() -> Router<PgPool> {
    Router::new().route("/events", get(notification_stream))
}

/// Live tail of the caller's private channel (`user.{id}`) as Server-Sent
/// Events. Each event is named `notification` and carries the
/// `{user, message}` payload persisted by the fan-out. Missed events are not
/// backfilled; the notification list endpoint is the durable record.
async fn notification_stream(
    Extension(claims): Extension<Claims>,
    Extension(channels): Extension<UserChannels>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiResponse<()>> {
    let user_id = claims.user_id()?;
    tracing::info!(user_id, "realtime subscription opened");

    let receiver = channels.subscribe(user_id);
    let stream = BroadcastStream::new(receiver).filter_map(|event| match event {
        Ok(event) => Event::default()
            .event("notification")
            .json_data(&event)
            .ok()
            .map(Ok::<_, Infallible>),
        // A lagged subscriber just skips what the ring buffer evicted.
        Err(_) => None,
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(25))))
}
