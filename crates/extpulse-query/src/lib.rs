#![forbid(unsafe_code)]
//! Read-side aggregation over session records.
//!
//! "User" is not a stored entity: within one result set, distinct IP
//! addresses are mapped to sequential ordinals in first-seen order. The
//! mapping is recomputed per call and is not stable across requests.

mod rollup;

pub use rollup::{rollup_dashboard, total_categories, DashboardRollup, SessionWithUser, UserTotals};

pub const CRATE_NAME: &str = "extpulse-query";
