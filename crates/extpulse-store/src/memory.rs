// SPDX-License-Identifier: Apache-2.0

use crate::{SessionStore, StoreError};
use async_trait::async_trait;
use extpulse_model::{NewSession, SessionRecord};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;

/// In-memory store double for tests: same ordering contract as the SQLite
/// backend, plus a switch that makes every operation fail.
pub struct MemorySessionStore {
    pub records: Mutex<Vec<SessionRecord>>,
    pub fail_with: Mutex<Option<String>>,
    next_id: AtomicI64,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemorySessionStore {
    async fn check_failure(&self) -> Result<(), StoreError> {
        match self.fail_with.lock().await.as_ref() {
            Some(message) => Err(StoreError(message.clone())),
            None => Ok(()),
        }
    }
}

fn sorted(mut records: Vec<SessionRecord>) -> Vec<SessionRecord> {
    records.sort_by_key(|r| (r.session_start, r.id));
    records
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert_session(&self, new: NewSession) -> Result<SessionRecord, StoreError> {
        self.check_failure().await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = SessionRecord::from_new(id, new);
        self.records.lock().await.push(record.clone());
        Ok(record)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, StoreError> {
        self.check_failure().await?;
        Ok(sorted(self.records.lock().await.clone()))
    }

    async fn list_sessions_for_ip(&self, ip: &str) -> Result<Vec<SessionRecord>, StoreError> {
        self.check_failure().await?;
        let records = self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| r.ip_address == ip)
            .cloned()
            .collect();
        Ok(sorted(records))
    }
}
