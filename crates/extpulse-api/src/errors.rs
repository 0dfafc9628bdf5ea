// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiErrorCode {
    ValidationFailed,
    StorageUnavailable,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
    pub request_id: String,
}

impl ApiError {
    #[must_use]
    pub fn new(
        code: ApiErrorCode,
        message: impl Into<String>,
        details: Value,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            request_id: request_id.into(),
        }
    }

    #[must_use]
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ValidationFailed, message, json!({}), "req-unknown")
    }

    #[must_use]
    pub fn storage_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ApiErrorCode::Internal,
            message.clone(),
            json!({"message": message}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn storage_unavailable() -> Self {
        Self::new(
            ApiErrorCode::StorageUnavailable,
            "session store is unavailable",
            json!({}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

const _: fn() = || {
    fn assert_traits<T: Serialize + for<'de> Deserialize<'de>>() {}
    assert_traits::<ApiErrorCode>();
};
