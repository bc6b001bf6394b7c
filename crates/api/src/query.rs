//! Shared query parameter types for API handlers.

use rollcall_core::types::DbId;
use serde::Deserialize;

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 200;

/// `?limit=&offset=`.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    /// Limit clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// `?class_id=` narrows realtime reads and dashboard streams to one class.
#[derive(Debug, Default, Deserialize)]
pub struct ClassScopeParams {
    pub class_id: Option<DbId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(PaginationParams::default().limit(), DEFAULT_PAGE_LIMIT);
        let huge = PaginationParams {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(huge.limit(), MAX_PAGE_LIMIT);
        assert_eq!(huge.offset(), 0);
        let zero = PaginationParams {
            limit: Some(0),
            offset: None,
        };
        assert_eq!(zero.limit(), 1);
    }
}
