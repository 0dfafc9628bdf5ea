use chrono::{DateTime, Utc};
use extpulse_model::{CategoryCounts, NewSession};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/sessions`. Every field is optional; absent timestamps
/// and counts persist as NULLs. The category map is the one closed surface:
/// labels outside the five recognized categories fail deserialization and
/// surface as a validation error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSubmission {
    #[serde(default)]
    pub session_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub session_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_count: Option<i64>,
    #[serde(default)]
    pub categories: CategoryCounts,
}

impl SessionSubmission {
    /// The caller IP is stamped here, server-side; the body never carries it.
    #[must_use]
    pub fn into_new_session(self, ip_address: String) -> NewSession {
        NewSession {
            session_start: self.session_start,
            session_end: self.session_end,
            user_count: self.user_count,
            categories: self.categories,
            ip_address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAck {
    pub message: String,
}

impl SessionAck {
    #[must_use]
    pub fn saved() -> Self {
        Self {
            message: "session saved".to_string(),
        }
    }
}
