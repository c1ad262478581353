//! Custom Axum extractors for the gateway.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use gateway_core::ClientKey;
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::state::AppState;

/// Header carrying the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID from `X-Request-ID` when it is a UUID, otherwise a fresh one
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub gateway_core::RequestId);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let supplied = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok());
        Ok(Self(gateway_core::RequestId::parse_or_generate(supplied)))
    }
}

/// Rate-limit key of the caller
#[derive(Debug, Clone)]
pub struct Client(pub ClientKey);

#[async_trait]
impl FromRequestParts<AppState> for Client {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(Self(state.trusted_proxies.client_key(&parts.headers, peer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn parts(peer: Option<&str>, forwarded: Option<&'static str>) -> Parts {
        let mut builder = Request::builder().uri("/v1/chat/completions");
        if let Some(value) = forwarded {
            builder = builder.header("x-forwarded-for", HeaderValue::from_static(value));
        }
        let mut request = builder.body(()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            request.extensions_mut().insert(ConnectInfo(addr));
        }
        request.into_parts().0
    }

    fn state() -> AppState {
        AppState::builder().build().unwrap()
    }

    #[tokio::test]
    async fn test_client_keyed_by_peer_address() {
        let state = state();

        let mut first = parts(Some("198.51.100.1:5000"), None);
        let mut second = parts(Some("198.51.100.2:5000"), None);
        let Client(a) = Client::from_request_parts(&mut first, &state).await.unwrap();
        let Client(b) = Client::from_request_parts(&mut second, &state).await.unwrap();
        assert_eq!(a.as_str(), "198.51.100.1");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_forwarded_for_only_from_trusted_proxy() {
        let state = state();

        let Client(spoofed) = Client::from_request_parts(
            &mut parts(Some("198.51.100.1:5000"), Some("203.0.113.9")),
            &state,
        )
        .await
        .unwrap();
        assert_eq!(spoofed.as_str(), "198.51.100.1");

        let Client(proxied) = Client::from_request_parts(
            &mut parts(Some("127.0.0.1:5000"), Some("203.0.113.9")),
            &state,
        )
        .await
        .unwrap();
        assert_eq!(proxied.as_str(), "203.0.113.9");
    }

    #[tokio::test]
    async fn test_request_id_parsed_or_generated() {
        let mut request = Request::builder()
            .header(REQUEST_ID_HEADER, "0b8f6c1e-3d2a-4f5b-9c7e-1a2b3c4d5e6f")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let RequestId(id) = RequestId::from_request_parts(&mut request, &()).await.unwrap();
        assert_eq!(id.to_string(), "0b8f6c1e-3d2a-4f5b-9c7e-1a2b3c4d5e6f");
    }
}
