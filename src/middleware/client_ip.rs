use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use sha2::{Digest, Sha256};
use std::{convert::Infallible, net::SocketAddr};

/// Address of the caller: first `X-Forwarded-For` hop, else the peer address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Salted SHA-256 of the address, truncated to 16 hex chars
    pub fn hashed(&self, salt: &str) -> String {
        let digest = Sha256::digest(format!("{}{}", salt, self.0).as_bytes());
        let mut hex = format!("{:x}", digest);
        hex.truncate(16);
        hex
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        if let Some(ip) = forwarded {
            return Ok(ClientIp(ip.to_string()));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientIp(peer.unwrap_or_else(|| "unknown".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> ClientIp {
        let (mut parts, _) = request.into_parts();
        ClientIp::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_prefers_first_forwarded_hop() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, ClientIp("203.0.113.7".to_string()));
    }

    #[tokio::test]
    async fn test_falls_back_to_peer_address() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4242))));
        assert_eq!(extract(request).await.as_str(), "192.0.2.1");
    }

    #[tokio::test]
    async fn test_unknown_without_any_source() {
        let request = Request::builder().body(()).unwrap();
        assert_eq!(extract(request).await.as_str(), "unknown");
    }

    #[test]
    fn test_hash_is_salted_and_short() {
        let ip = ClientIp("203.0.113.7".to_string());
        let a = ip.hashed("salt-a");
        let b = ip.hashed("salt-b");
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
        assert_eq!(a, ip.hashed("salt-a"));
    }
}
