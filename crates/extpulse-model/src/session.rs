use crate::category::CategoryCounts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Insert shape for one usage event. The IP is derived server-side from the
/// request, never taken from the submission body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub session_start: Option<DateTime<Utc>>,
    pub session_end: Option<DateTime<Utc>>,
    pub user_count: Option<i64>,
    pub categories: CategoryCounts,
    pub ip_address: String,
}

/// One persisted usage event. Created exactly once, never updated or
/// deleted; duplicate submissions produce duplicate records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: i64,
    pub session_start: Option<DateTime<Utc>>,
    pub session_end: Option<DateTime<Utc>>,
    pub user_count: Option<i64>,
    pub categories: CategoryCounts,
    pub ip_address: String,
}

impl SessionRecord {
    #[must_use]
    pub fn from_new(id: i64, new: NewSession) -> Self {
        Self {
            id,
            session_start: new.session_start,
            session_end: new.session_end,
            user_count: new.user_count,
            categories: new.categories,
            ip_address: new.ip_address,
        }
    }
}
