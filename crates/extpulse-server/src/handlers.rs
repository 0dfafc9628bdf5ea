use crate::client_ip::caller_ip;
use crate::{AppState, CRATE_NAME};
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use extpulse_api::{ApiError, SessionAck, SessionSubmission};
use extpulse_query::{rollup_dashboard, total_categories};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{error, info, warn};

pub(crate) fn make_request_id(state: &AppState) -> String {
    let id = state.request_id_seed.fetch_add(1, Ordering::Relaxed);
    format!("req-{id:016x}")
}

pub(crate) fn propagated_request_id(headers: &HeaderMap, state: &AppState) -> String {
    if let Some(raw) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    make_request_id(state)
}

pub(crate) fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(v) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-request-id", v);
    }
    response
}

fn api_error_response(status: StatusCode, err: ApiError) -> Response {
    (status, Json(json!({"error": err}))).into_response()
}

// Dashboard routes surface failures as plain-text pages, not JSON.
fn plain_error_page(prefix: &str, message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("{prefix}: {message}"),
    )
        .into_response()
}

fn html_response(html: String) -> Response {
    let mut resp = Response::new(axum::body::Body::from(html));
    resp.headers_mut().insert(
        "content-type",
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    resp
}

fn warn_if_slow(state: &AppState, route: &'static str, started: Instant) {
    let elapsed = started.elapsed();
    if elapsed > state.api.slow_request_threshold {
        warn!(route, latency_ms = elapsed.as_millis() as u64, "slow request");
    }
}

pub(crate) async fn dashboard_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let Some(store) = state.store.as_ref() else {
        let resp = plain_error_page("Dashboard error", "session store is unavailable");
        state
            .metrics
            .observe_request("/", StatusCode::INTERNAL_SERVER_ERROR, started.elapsed())
            .await;
        return with_request_id(resp, &request_id);
    };

    let resp = match store.list_sessions().await {
        Ok(records) => {
            let rollup = rollup_dashboard(records);
            match state.views.render_dashboard(&rollup) {
                Ok(html) => html_response(html),
                Err(e) => {
                    error!(request_id = %request_id, "dashboard render failed: {e}");
                    plain_error_page("Dashboard error", &e.to_string())
                }
            }
        }
        Err(e) => plain_error_page("Dashboard error", &e.to_string()),
    };
    let status = resp.status();
    info!(request_id = %request_id, route = "/", status = status.as_u16(), "dashboard served");
    state
        .metrics
        .observe_request("/", status, started.elapsed())
        .await;
    warn_if_slow(&state, "/", started);
    with_request_id(resp, &request_id)
}

pub(crate) async fn my_analytics_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let ip = caller_ip(&headers, peer);
    let Some(store) = state.store.as_ref() else {
        let resp = plain_error_page("Error loading analytics", "session store is unavailable");
        state
            .metrics
            .observe_request(
                "/my-analytics",
                StatusCode::INTERNAL_SERVER_ERROR,
                started.elapsed(),
            )
            .await;
        return with_request_id(resp, &request_id);
    };

    // A caller with no history gets an empty list and all-zero totals.
    let resp = match store.list_sessions_for_ip(&ip).await {
        Ok(records) => {
            let totals = total_categories(&records);
            match state.views.render_my_analytics(&ip, &records, &totals) {
                Ok(html) => html_response(html),
                Err(e) => {
                    error!(request_id = %request_id, "analytics render failed: {e}");
                    plain_error_page("Error loading analytics", &e.to_string())
                }
            }
        }
        Err(e) => plain_error_page("Error loading analytics", &e.to_string()),
    };
    let status = resp.status();
    info!(
        request_id = %request_id,
        route = "/my-analytics",
        status = status.as_u16(),
        caller_ip = %ip,
        "analytics served"
    );
    state
        .metrics
        .observe_request("/my-analytics", status, started.elapsed())
        .await;
    warn_if_slow(&state, "/my-analytics", started);
    with_request_id(resp, &request_id)
}

pub(crate) async fn ingest_session_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);

    let submission: SessionSubmission = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            let resp = api_error_response(
                StatusCode::BAD_REQUEST,
                ApiError::validation_failed(e.to_string()).with_request_id(&request_id),
            );
            state
                .metrics
                .observe_request("/api/sessions", StatusCode::BAD_REQUEST, started.elapsed())
                .await;
            return with_request_id(resp, &request_id);
        }
    };

    let Some(store) = state.store.as_ref() else {
        let resp = api_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::storage_unavailable().with_request_id(&request_id),
        );
        state
            .metrics
            .observe_request(
                "/api/sessions",
                StatusCode::INTERNAL_SERVER_ERROR,
                started.elapsed(),
            )
            .await;
        return with_request_id(resp, &request_id);
    };

    let ip = caller_ip(&headers, peer);
    let resp = match store.insert_session(submission.into_new_session(ip.clone())).await {
        Ok(record) => {
            info!(
                request_id = %request_id,
                session_id = record.id,
                caller_ip = %ip,
                "session saved"
            );
            (StatusCode::OK, Json(SessionAck::saved())).into_response()
        }
        Err(e) => {
            error!(request_id = %request_id, "session save failed: {e}");
            api_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::storage_failed(e.to_string()).with_request_id(&request_id),
            )
        }
    };
    let status = resp.status();
    state
        .metrics
        .observe_request("/api/sessions", status, started.elapsed())
        .await;
    with_request_id(resp, &request_id)
}

pub(crate) async fn healthz_handler(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let request_id = make_request_id(&state);
    let resp = (StatusCode::OK, "ok").into_response();
    state
        .metrics
        .observe_request("/healthz", StatusCode::OK, started.elapsed())
        .await;
    with_request_id(resp, &request_id)
}

pub(crate) async fn readyz_handler(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let request_id = make_request_id(&state);
    let (status, body) = if state.store.is_some() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not-ready")
    };
    let resp = (status, body).into_response();
    state
        .metrics
        .observe_request("/readyz", status, started.elapsed())
        .await;
    with_request_id(resp, &request_id)
}

pub(crate) async fn version_handler(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let request_id = make_request_id(&state);
    let resp = Json(json!({
        "name": CRATE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response();
    state
        .metrics
        .observe_request("/version", StatusCode::OK, started.elapsed())
        .await;
    with_request_id(resp, &request_id)
}

pub(crate) async fn metrics_handler(State(state): State<AppState>) -> Response {
    let request_id = make_request_id(&state);
    let body = state.metrics.render_prometheus().await;
    let mut resp = (StatusCode::OK, body).into_response();
    resp.headers_mut().insert(
        "content-type",
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    with_request_id(resp, &request_id)
}
