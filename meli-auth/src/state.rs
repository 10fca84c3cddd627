//! Tamper-evident encoding of the OAuth `state` round-trip parameter.
//!
//! The state carries the caller's original redirect target and arbitrary
//! properties across the provider redirect. Nothing is persisted server-side:
//! the token is a pure function of the state and a process-held secret, so any
//! instance behind a load balancer can decode what another instance encoded.
//! The redirect target inside the state is an open-redirect risk if forgeable,
//! which is why decoding fails closed on any signature mismatch.

use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretVec};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{state_error, Error, StateErrorKind};

type HmacSha256 = Hmac<Sha256>;

/// Per-challenge state round-tripped through the provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthSessionState {
    /// Where to send the user after sign-in completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// Arbitrary host-defined properties carried across the round trip.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
}

impl AuthSessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Serializes session state into an opaque, integrity-protected token and back.
///
/// Hosts with their own data-protection layer can substitute it by passing a
/// custom implementation to the handler builder.
pub trait StateCodec: Send + Sync {
    /// Produce an opaque token safe for URL embedding.
    fn encode(&self, state: &AuthSessionState) -> Result<String, Error>;

    /// Decode and verify a token. Malformed, truncated, unsigned, or
    /// wrongly-signed input must fail, never yield a partially-trusted value.
    fn decode(&self, token: &str) -> Result<AuthSessionState, Error>;
}

/// Default codec: JSON payload authenticated with HMAC-SHA256.
///
/// Token layout is `base64url(payload).base64url(tag)`.
pub struct SignedStateCodec {
    secret: SecretVec<u8>,
}

impl SignedStateCodec {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: SecretVec::new(secret.into()),
        }
    }

    fn mac(&self) -> Result<HmacSha256, Error> {
        HmacSha256::new_from_slice(self.secret.expose_secret())
            .map_err(|_| state_error(StateErrorKind::Malformed, "invalid signing key"))
    }
}

impl StateCodec for SignedStateCodec {
    fn encode(&self, state: &AuthSessionState) -> Result<String, Error> {
        let payload = serde_json::to_vec(state).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: crate::error::ErrorKind::State(StateErrorKind::Malformed),
        })?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        let tag = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }

    fn decode(&self, token: &str) -> Result<AuthSessionState, Error> {
        let (payload, tag) = token
            .split_once('.')
            .ok_or_else(|| state_error(StateErrorKind::Malformed, "missing signature segment"))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| state_error(StateErrorKind::Malformed, "payload is not base64url"))?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| state_error(StateErrorKind::Malformed, "signature is not base64url"))?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&tag)
            .map_err(|_| state_error(StateErrorKind::SignatureMismatch, "signature mismatch"))?;

        serde_json::from_slice(&payload).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: crate::error::ErrorKind::State(StateErrorKind::Malformed),
        })
    }
}
