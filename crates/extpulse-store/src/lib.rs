// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod memory;
mod sqlite;

use async_trait::async_trait;
use extpulse_model::{NewSession, SessionRecord};
use std::fmt::{Display, Formatter};

pub use memory::MemorySessionStore;
pub use sqlite::{SqliteSessionStore, SQLITE_SCHEMA_VERSION};

pub const CRATE_NAME: &str = "extpulse-store";

#[derive(Debug)]
pub struct StoreError(pub String);

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Persistence seam for session records. Implementations return records
/// ordered by `session_start` ascending (absent timestamps first), with the
/// insertion id as tiebreak so rollups are reproducible within a request.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn insert_session(&self, new: NewSession) -> Result<SessionRecord, StoreError>;

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, StoreError>;

    async fn list_sessions_for_ip(&self, ip: &str) -> Result<Vec<SessionRecord>, StoreError>;
}
