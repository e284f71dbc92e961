//! IP address extraction utilities
//!
//! Provides secure extraction of client IP addresses from X-Forwarded-For headers
//! with validation to prevent header spoofing attacks.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// Peer socket address recorded by the server's connect-info service.
///
/// Extraction never fails; the address is absent for requests that did not
/// pass through a TCP accept, such as in-process test requests.
#[derive(Debug, Clone, Copy)]
pub struct PeerAddr(pub Option<SocketAddr>);

impl<S> FromRequestParts<S> for PeerAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PeerAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|connect_info| connect_info.0),
        ))
    }
}

/// Extract and validate client IP from request headers
///
/// When behind a load balancer or proxy, the X-Forwarded-For header contains a
/// chain of IP addresses. This function validates and extracts the appropriate
/// client IP based on the number of trusted proxies.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&std::net::SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(header_value) = forwarded_for.to_str() {
            let ip = extract_from_forwarded_for(header_value, trusted_proxy_count);
            if ip != "unknown" {
                return ip;
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(header_value) = real_ip.to_str() {
            let trimmed = header_value.trim();
            if is_valid_ip(trimmed) {
                return trimmed.to_string();
            }
        }
    }

    if let Some(addr) = socket_addr {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Extract client IP from X-Forwarded-For header chain
///
/// The header contains comma-separated IPs in order `client, proxy1, proxy2`.
/// If `trusted_proxy_count` is N, we trust the last N IPs and use the one
/// before them.
fn extract_from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> String {
    let ips: Vec<&str> = header_value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if ips.is_empty() {
        return "unknown".to_string();
    }

    // With no trusted proxies the header could be spoofed; use the last IP in
    // the chain (closest to us) after validation.
    if trusted_proxy_count == 0 || ips.len() <= trusted_proxy_count {
        let last_ip = ips.last().unwrap_or(&"");
        if is_valid_ip(last_ip) {
            return last_ip.to_string();
        }
        return "unknown".to_string();
    }

    let client_ip_pos = ips.len().saturating_sub(trusted_proxy_count + 1);
    let client_ip = ips.get(client_ip_pos).unwrap_or(&"");

    if is_valid_ip(client_ip) {
        return client_ip.to_string();
    }

    "unknown".to_string()
}

fn is_valid_ip(ip_str: &str) -> bool {
    ip_str.parse::<IpAddr>().is_ok()
}
