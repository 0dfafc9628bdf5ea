use axum::http::HeaderMap;
use std::net::SocketAddr;

/// First `x-forwarded-for` entry, accepted only if it looks like an
/// address. A spoofable header as tenant key is a documented limitation of
/// the IP-bucketing design, not a security control.
pub(crate) fn normalized_forwarded_for(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    if first.is_empty() || first.len() > 64 {
        return None;
    }
    if first
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b':' || b == b'-')
    {
        Some(first.to_string())
    } else {
        None
    }
}

pub(crate) fn caller_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    normalized_forwarded_for(headers).unwrap_or_else(|| peer.ip().to_string())
}
