//! Client identity extraction for rate limiting and CSRF binding.
//!
//! Behind the reverse proxy the peer address is the proxy itself, so the
//! forwarding headers are consulted first. The string is an identity, not a
//! verified address; spoofing it only partitions the spoofer's own rate
//! limit bucket.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

/// Best-effort client identity: first `X-Forwarded-For` entry, then
/// `X-Real-Ip`, then the socket peer address.
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(client_ip(parts)))
    }
}

fn client_ip(parts: &Parts) -> String {
    if let Some(forwarded) = header_value(parts, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = header_value(parts, "x-real-ip") {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    "unknown".to_string()
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn forwarded_for_takes_the_first_entry() {
        let mut parts = parts_with(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);

        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(ip, "203.0.113.7");
    }

    #[tokio::test]
    async fn real_ip_is_the_fallback_header() {
        let mut parts = parts_with(&[("x-real-ip", "198.51.100.4")]);

        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(ip, "198.51.100.4");
    }

    #[tokio::test]
    async fn falls_back_to_the_peer_address() {
        let mut parts = parts_with(&[]);
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 9], 4321))));

        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(ip, "192.168.1.9");
    }

    #[tokio::test]
    async fn no_signal_yields_the_unknown_identity() {
        let mut parts = parts_with(&[]);

        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(ip, "unknown");
    }

    #[tokio::test]
    async fn empty_forwarded_header_is_skipped() {
        let mut parts = parts_with(&[("x-forwarded-for", " "), ("x-real-ip", "198.51.100.4")]);

        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(ip, "198.51.100.4");
    }
}
