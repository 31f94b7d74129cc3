use crate::errors::ServiceError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Header carrying the acting user's name.
pub const ACTOR_HEADER: &str = "x-actor";
/// Alternative to `Authorization` for clients that cannot set it.
pub const API_KEY_HEADER: &str = "x-api-key";

const MAX_ACTOR_LEN: usize = 100;

/// Authenticated caller identity passed to every ledger operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Shared-secret authentication settings.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    api_key: Arc<str>,
    default_actor: Arc<str>,
}

impl ApiKeyAuth {
    pub fn new(api_key: impl Into<Arc<str>>, default_actor: impl Into<Arc<str>>) -> Self {
        Self {
            api_key: api_key.into(),
            default_actor: default_actor.into(),
        }
    }

    fn presented_key<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            let value = value.trim();
            return Some(value.strip_prefix("Bearer ").map(str::trim).unwrap_or(value));
        }
        headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
    }

    /// Resolves the caller, or fails when the key is missing or wrong.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Actor, ServiceError> {
        let key = self
            .presented_key(headers)
            .ok_or_else(|| ServiceError::Unauthorized("missing API key".into()))?;
        if !constant_time_eq(key.as_bytes(), self.api_key.as_bytes()) {
            return Err(ServiceError::Unauthorized("invalid API key".into()));
        }

        let actor = headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|name| {
                !name.is_empty()
                    && name.chars().count() <= MAX_ACTOR_LEN
                    && !name.chars().any(char::is_control)
            })
            .unwrap_or(&*self.default_actor);
        Ok(Actor(actor.to_string()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Rejects unauthenticated requests and attaches the [`Actor`] extension.
pub async fn require_api_key(
    State(auth): State<ApiKeyAuth>,
    mut request: Request,
    next: Next,
) -> Response {
    match auth.authenticate(request.headers()) {
        Ok(actor) => {
            debug!(actor = %actor.as_str(), "request authenticated");
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        Err(err) => {
            warn!(uri = %request.uri(), error = %err, "authentication failed");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn auth() -> ApiKeyAuth {
        ApiKeyAuth::new("test-key-0123456789", "household")
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_and_raw_keys_are_accepted() {
        let a = auth();
        assert!(a
            .authenticate(&headers(&[("authorization", "Bearer test-key-0123456789")]))
            .is_ok());
        assert!(a
            .authenticate(&headers(&[("authorization", "test-key-0123456789")]))
            .is_ok());
        assert!(a
            .authenticate(&headers(&[("x-api-key", "test-key-0123456789")]))
            .is_ok());
    }

    #[test]
    fn wrong_or_missing_key_is_unauthorized() {
        let a = auth();
        assert!(matches!(
            a.authenticate(&headers(&[("authorization", "Bearer nope")])),
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            a.authenticate(&HeaderMap::new()),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn actor_header_overrides_default() {
        let a = auth();
        let actor = a
            .authenticate(&headers(&[
                ("authorization", "Bearer test-key-0123456789"),
                ("x-actor", "alex"),
            ]))
            .unwrap();
        assert_eq!(actor.as_str(), "alex");

        let fallback = a
            .authenticate(&headers(&[("authorization", "Bearer test-key-0123456789")]))
            .unwrap();
        assert_eq!(fallback.as_str(), "household");
    }
}
