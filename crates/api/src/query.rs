//! Shared query parameter types for API handlers.

use serde::Deserialize;
use scholarship_core::types::DbId;

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Values are clamped by the handler or repository that consumes them.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    pub fn limit_or(&self, default: i64, max: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, max)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Renewal-cycle selector (`?school_year=&semester=&branch_id=`).
///
/// Used by the summary and assigned-renewal endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct CycleParams {
    pub school_year: Option<String>,
    pub semester: Option<String>,
    pub branch_id: Option<DbId>,
}
