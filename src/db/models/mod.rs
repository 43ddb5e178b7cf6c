pub mod notification;
pub mod project;
pub mod task;
pub mod task_status;
pub mod team;
pub mod user;

use serde::Deserialize;
use utoipa::IntoParams;

/// Shared page/limit query parameters for list endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PaginationParams {
    /// Resolve to (page, limit, offset) with a per-endpoint default limit.
    /// Page and limit are clamped to at least 1.
    pub fn resolve(&self, default_limit: u32) -> (i64, i64, i64) {
        let page = i64::from(self.page.unwrap_or(1).max(1));
        let limit = i64::from(self.limit.unwrap_or(default_limit).max(1));
        (page, limit, (page - 1) * limit)
    }
}

/// Total page count for a list response.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    (total as f64 / limit as f64).ceil() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_params_absent() {
        let params = PaginationParams::default();
        assert_eq!(params.resolve(10), (1, 10, 0));
    }

    #[test]
    fn zero_values_are_clamped() {
        let params = PaginationParams {
            page: Some(0),
            limit: Some(0),
        };
        assert_eq!(params.resolve(10), (1, 1, 0));
    }

    #[test]
    fn offset_skips_previous_pages() {
        let params = PaginationParams {
            page: Some(3),
            limit: Some(20),
        };
        assert_eq!(params.resolve(10), (3, 20, 40));
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }
}
