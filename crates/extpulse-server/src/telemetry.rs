use axum::http::StatusCode;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;

pub const METRIC_SUBSYSTEM: &str = "extpulse";

#[derive(Debug, Clone, Copy, Default)]
struct RouteStat {
    count: u64,
    latency_ns_sum: u64,
}

/// Per-route request counters with latency sums, rendered in Prometheus
/// text exposition format.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    routes: Mutex<BTreeMap<(&'static str, u16), RouteStat>>,
}

impl RequestMetrics {
    pub async fn observe_request(&self, route: &'static str, status: StatusCode, latency: Duration) {
        let mut routes = self.routes.lock().await;
        let stat = routes.entry((route, status.as_u16())).or_default();
        stat.count += 1;
        stat.latency_ns_sum = stat
            .latency_ns_sum
            .saturating_add(u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX));
    }

    pub async fn render_prometheus(&self) -> String {
        let routes = self.routes.lock().await;
        let mut body = String::new();
        body.push_str(&format!(
            "# TYPE {METRIC_SUBSYSTEM}_requests_total counter\n"
        ));
        for ((route, status), stat) in routes.iter() {
            body.push_str(&format!(
                "{METRIC_SUBSYSTEM}_requests_total{{route=\"{route}\",status=\"{status}\"}} {}\n",
                stat.count
            ));
        }
        body.push_str(&format!(
            "# TYPE {METRIC_SUBSYSTEM}_request_latency_seconds_sum counter\n"
        ));
        for ((route, status), stat) in routes.iter() {
            body.push_str(&format!(
                "{METRIC_SUBSYSTEM}_request_latency_seconds_sum{{route=\"{route}\",status=\"{status}\"}} {:.9}\n",
                stat.latency_ns_sum as f64 / 1_000_000_000.0
            ));
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn observed_requests_show_up_in_exposition() {
        let metrics = RequestMetrics::default();
        metrics
            .observe_request("/", StatusCode::OK, Duration::from_millis(5))
            .await;
        metrics
            .observe_request("/", StatusCode::OK, Duration::from_millis(3))
            .await;
        metrics
            .observe_request("/api/sessions", StatusCode::INTERNAL_SERVER_ERROR, Duration::ZERO)
            .await;

        let body = metrics.render_prometheus().await;
        assert!(body.contains("extpulse_requests_total{route=\"/\",status=\"200\"} 2"));
        assert!(body.contains("extpulse_requests_total{route=\"/api/sessions\",status=\"500\"} 1"));
        assert!(body.contains("extpulse_request_latency_seconds_sum{route=\"/\",status=\"200\"}"));
    }
}
