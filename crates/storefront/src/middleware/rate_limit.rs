//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Only the admin login is limited: it is the one endpoint that checks a
//! shared secret.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers consulted for the client IP, in order.
const CLIENT_IP_HEADERS: &[&str] = &["cf-connecting-ip", "x-real-ip", "fly-client-ip"];

/// Key extractor for the client IP.
///
/// Keys on the TCP peer address. Proxy headers (`X-Forwarded-For` first,
/// then [`CLIENT_IP_HEADERS`]) are read only when `trust_proxy_headers` is
/// set, since any client can send them.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor {
    trust_proxy_headers: bool,
}

impl ClientIpKeyExtractor {
    #[must_use]
    pub const fn new(trust_proxy_headers: bool) -> Self {
        Self {
            trust_proxy_headers,
        }
    }
}

fn forwarded_ip<T>(req: &Request<T>) -> Option<IpAddr> {
    let headers = req.headers();

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .or_else(|| {
            CLIENT_IP_HEADERS.iter().find_map(|name| {
                headers
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<IpAddr>().ok())
            })
        })
}

fn peer_ip<T>(req: &Request<T>) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        self.trust_proxy_headers
            .then(|| forwarded_ip(req))
            .flatten()
            .or_else(|| peer_ip(req))
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for the admin login: ~10 attempts per minute per IP.
///
/// The server must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the peer address
/// is available.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 5.
///
/// # Panics
///
/// This function will not panic. The configuration uses only valid positive
/// integers (`per_second(6)` and `burst_size(5)`), which are always accepted
/// by `GovernorConfigBuilder`.
#[must_use]
pub fn admin_login_rate_limiter(trust_proxy_headers: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trust_proxy_headers))
        .per_second(6) // Replenish 1 token every 6 seconds (~10/minute)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/admin/login");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 50], 51234))));
        req
    }

    #[test]
    fn test_keys_on_peer_address_by_default() {
        let req = request(&[("x-forwarded-for", "203.0.113.7")]);
        let ip = ClientIpKeyExtractor::new(false).extract(&req).unwrap();
        assert_eq!(ip.to_string(), "192.0.2.50");
    }

    #[test]
    fn test_trusted_proxy_uses_first_forwarded_hop() {
        let req = request(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        let ip = ClientIpKeyExtractor::new(true).extract(&req).unwrap();
        assert_eq!(ip.to_string(), "203.0.113.7");
    }

    #[test]
    fn test_trusted_proxy_falls_back_to_other_headers_then_peer() {
        let req = request(&[("fly-client-ip", "198.51.100.2")]);
        let ip = ClientIpKeyExtractor::new(true).extract(&req).unwrap();
        assert_eq!(ip.to_string(), "198.51.100.2");

        let ip = ClientIpKeyExtractor::new(true).extract(&request(&[])).unwrap();
        assert_eq!(ip.to_string(), "192.0.2.50");
    }

    #[test]
    fn test_missing_peer_address_is_an_error() {
        let req = Request::builder().uri("/admin/login").body(()).unwrap();
        assert!(ClientIpKeyExtractor::new(false).extract(&req).is_err());
    }
}
