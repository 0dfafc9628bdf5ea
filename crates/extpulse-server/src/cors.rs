use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

fn reflect_origin(resp: &mut Response, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        resp.headers_mut().insert("access-control-allow-origin", value);
        resp.headers_mut()
            .insert("vary", HeaderValue::from_static("Origin"));
    }
}

/// Every origin is reflected; only GET/POST and the content-type header are
/// allowed. Preflight short-circuits with a bare 200 before routing.
pub(crate) async fn cors_middleware(req: Request<Body>, next: Next) -> Response {
    let origin = req
        .headers()
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::OK.into_response();
        if let Some(origin_value) = origin {
            reflect_origin(&mut resp, &origin_value);
            resp.headers_mut().insert(
                "access-control-allow-methods",
                HeaderValue::from_static("GET,POST"),
            );
            resp.headers_mut().insert(
                "access-control-allow-headers",
                HeaderValue::from_static("content-type"),
            );
        }
        return resp;
    }

    let mut resp = next.run(req).await;
    if let Some(origin_value) = origin {
        reflect_origin(&mut resp, &origin_value);
    }
    resp
}
