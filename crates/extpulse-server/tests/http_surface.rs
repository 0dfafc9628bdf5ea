use extpulse_server::{build_router, AppState};
use extpulse_store::{MemorySessionStore, SessionStore, SqliteSessionStore};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn spawn_server(state: AppState) -> SocketAddr {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("serve app")
    });
    addr
}

async fn memory_server() -> (SocketAddr, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::default());
    let state = AppState::new(Some(store.clone() as Arc<dyn SessionStore>));
    (spawn_server(state).await, store)
}

async fn send_raw(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<&str>,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    if let Some(payload) = body {
        req.push_str(&format!("Content-Length: {}\r\n", payload.len()));
    }
    req.push_str("\r\n");
    if let Some(payload) = body {
        req.push_str(payload);
    }
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    (status, head.to_string(), body.to_string())
}

async fn get(addr: SocketAddr, path: &str, headers: &[(&str, &str)]) -> (u16, String, String) {
    send_raw(addr, "GET", path, headers, None).await
}

async fn post_json(
    addr: SocketAddr,
    path: &str,
    json: &str,
    extra_headers: &[(&str, &str)],
) -> (u16, String, String) {
    let mut headers = vec![("Content-Type", "application/json")];
    headers.extend_from_slice(extra_headers);
    send_raw(addr, "POST", path, &headers, Some(json)).await
}

fn user_ordinal_for(body: &str, ip: &str) -> u32 {
    let cell = format!("<td>{ip}</td>");
    let pos = body.find(&cell).expect("ip row present");
    let row_start = body[..pos].rfind("<tr data-session=").expect("session row");
    let row = &body[row_start..pos];
    let marker = "data-user=\"";
    let m = row.find(marker).expect("user attr") + marker.len();
    row[m..]
        .split('"')
        .next()
        .expect("attr value")
        .parse()
        .expect("ordinal")
}

#[tokio::test]
async fn ingest_then_dashboard_accumulates_per_user_totals() {
    let (addr, _store) = memory_server().await;

    let (status, _, body) = post_json(
        addr,
        "/api/sessions",
        r#"{
            "sessionStart": "2024-03-01T10:00:00Z",
            "sessionEnd": "2024-03-01T10:30:00Z",
            "userCount": 1,
            "categories": {"IDEA_GENERATION": 3, "OTHER": 1}
        }"#,
        &[("x-forwarded-for", "203.0.113.7")],
    )
    .await;
    assert_eq!(status, 200);
    let ack: Value = serde_json::from_str(&body).expect("ack json");
    assert_eq!(ack["message"], "session saved");

    let (status, _, _) = post_json(
        addr,
        "/api/sessions",
        r#"{"categories": {"IDEA_GENERATION": 2}}"#,
        &[("x-forwarded-for", "203.0.113.7")],
    )
    .await;
    assert_eq!(status, 200);

    let (status, head, body) = get(addr, "/", &[]).await;
    assert_eq!(status, 200);
    assert!(head.contains("text/html"));
    assert!(head.contains("x-request-id: "));
    // One derived user with IDEA_GENERATION=5, OTHER=1, the rest zero.
    assert!(body.contains(r#"data-category="IDEA_GENERATION">5<"#));
    assert!(body.contains(r#"data-category="OTHER">1<"#));
    assert!(body.contains(r#"data-category="REFINEMENT">0<"#));
    assert!(body.contains(r#"data-category="COGNITIVE">0<"#));
    assert!(!body.contains(r#"<tr data-user="2">"#), "only one user expected");
    assert!(body.contains(r#"data-session="1""#));
    assert!(body.contains(r#"data-session="2""#));
}

#[tokio::test]
async fn dashboard_assigns_ordinals_by_first_seen_in_start_order() {
    let (addr, _store) = memory_server().await;

    // Submitted out of order: the later session arrives first.
    let (status, _, _) = post_json(
        addr,
        "/api/sessions",
        r#"{"sessionStart": "2024-03-02T00:00:00Z", "categories": {"OTHER": 1}}"#,
        &[("x-forwarded-for", "10.0.0.2")],
    )
    .await;
    assert_eq!(status, 200);
    let (status, _, _) = post_json(
        addr,
        "/api/sessions",
        r#"{"sessionStart": "2024-03-01T00:00:00Z", "categories": {"OTHER": 1}}"#,
        &[("x-forwarded-for", "10.0.0.1")],
    )
    .await;
    assert_eq!(status, 200);

    let (status, _, body) = get(addr, "/", &[]).await;
    assert_eq!(status, 200);
    assert_eq!(user_ordinal_for(&body, "10.0.0.1"), 1, "earlier start is first seen");
    assert_eq!(user_ordinal_for(&body, "10.0.0.2"), 2);
    let first = body.find("10.0.0.1").expect("ip A rendered");
    let second = body.find("10.0.0.2").expect("ip B rendered");
    assert!(first < second, "session list is sorted by start time");
}

#[tokio::test]
async fn my_analytics_is_scoped_to_the_calling_ip() {
    let (addr, _store) = memory_server().await;

    post_json(
        addr,
        "/api/sessions",
        r#"{"categories": {"OTHER": 2}}"#,
        &[("x-forwarded-for", "203.0.113.1")],
    )
    .await;
    post_json(
        addr,
        "/api/sessions",
        r#"{"categories": {"OTHER": 5}}"#,
        &[("x-forwarded-for", "203.0.113.2")],
    )
    .await;

    let (status, _, body) = get(addr, "/my-analytics", &[("x-forwarded-for", "203.0.113.1")]).await;
    assert_eq!(status, 200);
    assert!(body.contains("203.0.113.1"));
    assert!(body.contains("<td>OTHER</td><td>2</td>"));
    assert!(!body.contains("<td>OTHER</td><td>5</td>"), "other caller's totals must not leak");
}

#[tokio::test]
async fn my_analytics_empty_state_renders_zero_totals() {
    let (addr, _store) = memory_server().await;

    let (status, _, body) = get(addr, "/my-analytics", &[("x-forwarded-for", "198.51.100.99")]).await;
    assert_eq!(status, 200);
    assert!(body.contains("No sessions recorded for this caller."));
    for label in ["IDEA_GENERATION", "REFINEMENT", "INFORMATION", "COGNITIVE", "OTHER"] {
        assert!(body.contains(&format!("<td>{label}</td><td>0</td>")));
    }
}

#[tokio::test]
async fn peer_address_is_used_when_no_forwarding_header_is_present() {
    let (addr, store) = memory_server().await;

    let (status, _, _) = post_json(addr, "/api/sessions", r#"{"categories": {"COGNITIVE": 4}}"#, &[]).await;
    assert_eq!(status, 200);
    assert_eq!(
        store.records.lock().await[0].ip_address,
        "127.0.0.1",
        "transport peer address is stamped"
    );

    let (status, _, body) = get(addr, "/my-analytics", &[]).await;
    assert_eq!(status, 200);
    assert!(body.contains("<td>COGNITIVE</td><td>4</td>"));
}

#[tokio::test]
async fn duplicate_submissions_create_two_records() {
    let (addr, store) = memory_server().await;
    let payload = r#"{"sessionStart": "2024-03-01T10:00:00Z", "categories": {"OTHER": 1}}"#;

    for _ in 0..2 {
        let (status, _, _) =
            post_json(addr, "/api/sessions", payload, &[("x-forwarded-for", "203.0.113.7")]).await;
        assert_eq!(status, 200);
    }
    assert_eq!(store.records.lock().await.len(), 2);

    let (_, _, body) = get(addr, "/my-analytics", &[("x-forwarded-for", "203.0.113.7")]).await;
    assert!(body.contains("<td>OTHER</td><td>2</td>"), "totals count both records");
}

#[tokio::test]
async fn unknown_category_label_is_rejected_and_not_stored() {
    let (addr, store) = memory_server().await;

    let (status, _, body) = post_json(
        addr,
        "/api/sessions",
        r#"{"categories": {"NAVIGATION": 2}}"#,
        &[("x-forwarded-for", "203.0.113.7")],
    )
    .await;
    assert_eq!(status, 400);
    let json: Value = serde_json::from_str(&body).expect("error json");
    assert_eq!(json["error"]["code"], "ValidationFailed");
    assert!(json["error"]["message"]
        .as_str()
        .expect("message string")
        .contains("NAVIGATION"));
    assert!(store.records.lock().await.is_empty(), "nothing persisted");
}

#[tokio::test]
async fn malformed_body_is_rejected_with_validation_error() {
    let (addr, _store) = memory_server().await;

    let (status, _, body) = post_json(addr, "/api/sessions", "not json at all", &[]).await;
    assert_eq!(status, 400);
    let json: Value = serde_json::from_str(&body).expect("error json");
    assert_eq!(json["error"]["code"], "ValidationFailed");

    let (status, _, _) = post_json(
        addr,
        "/api/sessions",
        r#"{"userCount": "many"}"#,
        &[],
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn cors_reflects_origin_and_short_circuits_preflight() {
    let (addr, _store) = memory_server().await;

    let (status, head, _) = send_raw(
        addr,
        "OPTIONS",
        "/api/sessions",
        &[("Origin", "https://extension.example")],
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert!(head.contains("access-control-allow-origin: https://extension.example"));
    assert!(head.contains("access-control-allow-methods: GET,POST"));
    assert!(head.contains("access-control-allow-headers: content-type"));

    let (status, head, _) = get(addr, "/", &[("Origin", "https://extension.example")]).await;
    assert_eq!(status, 200);
    assert!(head.contains("access-control-allow-origin: https://extension.example"));
    assert!(head.contains("vary: Origin"));
}

#[tokio::test]
async fn missing_store_degrades_per_route_without_killing_the_process() {
    let addr = spawn_server(AppState::new(None)).await;

    let (status, _, body) = get(addr, "/", &[]).await;
    assert_eq!(status, 500);
    assert!(body.starts_with("Dashboard error:"));

    let (status, _, body) = post_json(addr, "/api/sessions", r#"{"categories": {}}"#, &[]).await;
    assert_eq!(status, 500);
    let json: Value = serde_json::from_str(&body).expect("error json");
    assert_eq!(json["error"]["code"], "StorageUnavailable");

    let (status, _, body) = get(addr, "/readyz", &[]).await;
    assert_eq!(status, 503);
    assert_eq!(body, "not-ready");

    let (status, _, body) = get(addr, "/healthz", &[]).await;
    assert_eq!(status, 200);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn storage_failures_surface_the_underlying_message() {
    let (addr, store) = memory_server().await;
    *store.fail_with.lock().await = Some("disk on fire".to_string());

    let (status, _, body) = get(addr, "/", &[]).await;
    assert_eq!(status, 500);
    assert_eq!(body, "Dashboard error: disk on fire");

    let (status, _, body) = get(addr, "/my-analytics", &[]).await;
    assert_eq!(status, 500);
    assert_eq!(body, "Error loading analytics: disk on fire");

    let (status, _, body) = post_json(addr, "/api/sessions", r#"{"categories": {}}"#, &[]).await;
    assert_eq!(status, 500);
    let json: Value = serde_json::from_str(&body).expect("error json");
    assert_eq!(json["error"]["message"], "disk on fire");
}

#[tokio::test]
async fn full_stack_over_sqlite_store() {
    let dir = tempdir().expect("tempdir");
    let store =
        SqliteSessionStore::open(&dir.path().join("sessions.sqlite")).expect("open store");
    let state = AppState::new(Some(Arc::new(store) as Arc<dyn SessionStore>));
    let addr = spawn_server(state).await;

    let (status, _, _) = post_json(
        addr,
        "/api/sessions",
        r#"{"sessionStart": "2024-03-01T10:00:00Z", "categories": {"REFINEMENT": 6}}"#,
        &[("x-forwarded-for", "203.0.113.7")],
    )
    .await;
    assert_eq!(status, 200);

    let (status, _, body) = get(addr, "/", &[]).await;
    assert_eq!(status, 200);
    assert!(body.contains(r#"data-category="REFINEMENT">6<"#));

    let (status, _, body) = get(addr, "/my-analytics", &[("x-forwarded-for", "203.0.113.7")]).await;
    assert_eq!(status, 200);
    assert!(body.contains("<td>REFINEMENT</td><td>6</td>"));
}

#[tokio::test]
async fn operational_endpoints_respond() {
    let (addr, _store) = memory_server().await;

    let (status, _, body) = get(addr, "/version", &[]).await;
    assert_eq!(status, 200);
    let json: Value = serde_json::from_str(&body).expect("version json");
    assert_eq!(json["name"], "extpulse-server");

    let (status, _, _) = get(addr, "/", &[]).await;
    assert_eq!(status, 200);

    let (status, head, body) = get(addr, "/metrics", &[]).await;
    assert_eq!(status, 200);
    assert!(head.contains("text/plain"));
    assert!(body.contains("extpulse_requests_total{route=\"/\",status=\"200\"}"));
}
