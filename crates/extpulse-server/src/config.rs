use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub max_body_bytes: usize,
    pub slow_request_threshold: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 16 * 1024,
            slow_request_threshold: Duration::from_millis(200),
        }
    }
}
