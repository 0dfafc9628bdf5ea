// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod dto;
mod errors;

pub use dto::{SessionAck, SessionSubmission};
pub use errors::{ApiError, ApiErrorCode};

pub const CRATE_NAME: &str = "extpulse-api";
