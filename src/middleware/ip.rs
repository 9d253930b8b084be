use axum::{
    extract::{connect_info::ConnectInfo, Request},
    http::HeaderMap,
};
use std::net::{IpAddr, SocketAddr};

/// Extract client IP from proxy headers and optional transport metadata.
pub fn extract_ip_from_headers(headers: &HeaderMap, fallback: Option<IpAddr>) -> IpAddr {
    if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
        if let Some(first) = h.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }
    if let Some(h) = headers.get("x-real-ip").and_then(|hv| hv.to_str().ok()) {
        if let Ok(ip) = h.trim().parse::<IpAddr>() {
            return ip;
        }
    }
    fallback.unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

/// Rate-limit key for a request.
///
/// Uses the transport peer address. Proxy headers are only consulted when the deployment sits
/// behind a trusted reverse proxy, since any client can set them.
pub fn client_ip(req: &Request, trust_proxy_headers: bool) -> IpAddr {
    let remote = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    if trust_proxy_headers {
        extract_ip_from_headers(req.headers(), remote)
    } else {
        remote.unwrap_or(IpAddr::from([127, 0, 0, 1]))
    }
}
