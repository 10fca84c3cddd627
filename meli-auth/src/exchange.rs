//! Backchannel exchange of an authorization code for an access token.
//!
//! One POST to the provider token endpoint, parameters in the query string and
//! an empty body, as the provider expects. Failures are never retried:
//! authorization codes are single-use and expire quickly, so a retry can only
//! fail again or leak the code.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{exchange_error, Error, ExchangeErrorKind};

/// Result of one successful token exchange. Consumed immediately to build the
/// identity; never retained.
#[derive(Debug)]
pub struct TokenGrant {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_in: Option<Duration>,
    /// Provider user id, taken from the payload's `user_id` field.
    pub user_id: Option<String>,
    /// The full payload as received, for hooks that need provider extras.
    pub raw: Value,
}

impl TokenGrant {
    /// Parse a token endpoint payload.
    ///
    /// `access_token` is required; its absence is a fatal parse error. Other
    /// fields tolerate provider variance: `expires_in` may arrive as a number
    /// or numeric string and is ignored when it is neither, and `user_id` may
    /// arrive as a string or number.
    pub fn from_value(raw: Value) -> Result<Self, Error> {
        let access_token = match raw.get("access_token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => SecretString::from(token.to_string()),
            _ => {
                return Err(exchange_error(
                    ExchangeErrorKind::MissingAccessToken,
                    "token response carried no access_token",
                ))
            }
        };

        let refresh_token = raw
            .get("refresh_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::from(t.to_string()));

        let expires_in = match raw.get("expires_in") {
            Some(Value::Number(n)) => n.as_u64().map(Duration::from_secs),
            Some(Value::String(s)) => s.parse::<u64>().ok().map(Duration::from_secs),
            _ => None,
        };

        let user_id = match raw.get("user_id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Ok(Self {
            access_token,
            refresh_token,
            expires_in,
            user_id,
            raw,
        })
    }
}

/// Backchannel client for the provider token endpoint.
///
/// Holds the shared pooled HTTP client; safe for concurrent use. The request
/// is bounded by the configured timeout, and the response body by the
/// configured size cap. Dropping the returned future aborts the in-flight
/// call, so host-side cancellation propagates into the transport.
pub struct TokenExchange {
    client: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: SecretString,
    max_response_size: usize,
}

impl TokenExchange {
    pub(crate) fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            token_endpoint: config.token_endpoint.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            max_response_size: config.max_response_size,
        }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// `redirect_uri` must be the exact string used in the authorize step;
    /// providers reject a mismatch.
    pub async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<TokenGrant, Error> {
        debug!("exchanging authorization code for tokens");

        let response = self
            .client
            .post(&self.token_endpoint)
            .query(&[
                ("grant_type", "authorization_code"),
                ("client_id", &self.client_id),
                ("client_secret", self.client_secret.expose_secret()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| Error {
                source: Some(Box::new(e)),
                error_kind: crate::error::ErrorKind::Exchange(ExchangeErrorKind::Network),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = Self::read_capped(response, self.max_response_size)
                .await
                .map(|body| String::from_utf8_lossy(&body).into_owned())
                .unwrap_or_default();
            return Err(exchange_error(
                ExchangeErrorKind::Status,
                &format!("token endpoint returned {}: {}", status, detail),
            ));
        }

        let body = Self::read_capped(response, self.max_response_size).await?;
        let raw: Value = serde_json::from_slice(&body).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: crate::error::ErrorKind::Exchange(ExchangeErrorKind::InvalidPayload),
        })?;

        TokenGrant::from_value(raw)
    }

    /// Read the response body in chunks, failing once the cap is exceeded.
    async fn read_capped(mut response: reqwest::Response, cap: usize) -> Result<Vec<u8>, Error> {
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: crate::error::ErrorKind::Exchange(ExchangeErrorKind::Network),
        })? {
            if body.len() + chunk.len() > cap {
                return Err(exchange_error(
                    ExchangeErrorKind::BodyTooLarge,
                    "token endpoint response exceeded the configured size cap",
                ));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn exchange_for(server_url: &str) -> TokenExchange {
        let config = Config::new("app-id", "app-secret")
            .with_token_endpoint(format!("{}/oauth/token", server_url));
        TokenExchange::new(reqwest::Client::new(), &config)
    }

    #[test]
    fn test_grant_parses_full_payload() {
        let grant = TokenGrant::from_value(json!({
            "access_token": "APP_USR-tok",
            "refresh_token": "TG-ref",
            "expires_in": 21600,
            "user_id": 123456,
            "scope": "read"
        }))
        .unwrap();

        assert_eq!(grant.access_token.expose_secret(), "APP_USR-tok");
        assert_eq!(
            grant.refresh_token.as_ref().unwrap().expose_secret(),
            "TG-ref"
        );
        assert_eq!(grant.expires_in, Some(Duration::from_secs(21600)));
        assert_eq!(grant.user_id.as_deref(), Some("123456"));
        assert_eq!(grant.raw["scope"], "read");
    }

    #[test]
    fn test_grant_requires_access_token() {
        let err = TokenGrant::from_value(json!({ "user_id": "42" })).unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Exchange(ExchangeErrorKind::MissingAccessToken)
        );

        let err = TokenGrant::from_value(json!({ "access_token": 99 })).unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Exchange(ExchangeErrorKind::MissingAccessToken)
        );
    }

    #[test]
    fn test_grant_tolerates_expires_in_variance() {
        let numeric_string =
            TokenGrant::from_value(json!({ "access_token": "t", "expires_in": "3600" })).unwrap();
        assert_eq!(numeric_string.expires_in, Some(Duration::from_secs(3600)));

        let garbage =
            TokenGrant::from_value(json!({ "access_token": "t", "expires_in": "soon" })).unwrap();
        assert_eq!(garbage.expires_in, None);

        let negative =
            TokenGrant::from_value(json!({ "access_token": "t", "expires_in": -5 })).unwrap();
        assert_eq!(negative.expires_in, None);
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("client_id".into(), "app-id".into()),
                Matcher::UrlEncoded("client_secret".into(), "app-secret".into()),
                Matcher::UrlEncoded("code".into(), "ABC123".into()),
                Matcher::UrlEncoded(
                    "redirect_uri".into(),
                    "https://example.com/ml-signin?state=xyz".into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok1","user_id":"42"}"#)
            .expect(1)
            .create_async()
            .await;

        let grant = exchange_for(&server.url())
            .exchange("ABC123", "https://example.com/ml-signin?state=xyz")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(grant.access_token.expose_secret(), "tok1");
        assert_eq!(grant.user_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_exchange_maps_error_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = exchange_for(&server.url())
            .exchange("ABC123", "https://example.com/ml-signin")
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Exchange(ExchangeErrorKind::Status));
    }

    #[tokio::test]
    async fn test_exchange_rejects_non_json_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let err = exchange_for(&server.url())
            .exchange("ABC123", "https://example.com/ml-signin")
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Exchange(ExchangeErrorKind::InvalidPayload)
        );
    }

    #[tokio::test]
    async fn test_exchange_enforces_body_cap() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("x".repeat(4096))
            .create_async()
            .await;

        let config = Config::new("app-id", "app-secret")
            .with_token_endpoint(format!("{}/oauth/token", server.url()))
            .with_max_response_size(1024);
        let exchange = TokenExchange::new(reqwest::Client::new(), &config);

        let err = exchange
            .exchange("ABC123", "https://example.com/ml-signin")
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Exchange(ExchangeErrorKind::BodyTooLarge)
        );
    }
}
