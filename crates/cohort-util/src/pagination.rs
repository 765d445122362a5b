use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// Scroll-back parameters for group history: messages strictly older than
/// `before`, at most `limit` of them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryParams {
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl HistoryParams {
    pub fn limit_within(&self, default: i64, max: i64) -> i64 {
        self.limit.unwrap_or(default).min(max).max(1)
    }
}
