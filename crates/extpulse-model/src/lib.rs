#![forbid(unsafe_code)]
//! Extpulse model SSOT.

mod category;
mod session;

pub use category::{parse_category, Category, CategoryCounts, ValidationError, CATEGORY_COUNT};
pub use session::{NewSession, SessionRecord};

pub const CRATE_NAME: &str = "extpulse-model";
