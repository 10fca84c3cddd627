//! Handler configuration.
//!
//! Immutable after construction; shared read-only across concurrent requests.
//! Endpoint scheme and host are configuration, not constants, so deployments
//! pick the regional MercadoLibre hosts they actually use.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString, SecretVec};
use url::Url;

use crate::error::{config_error, ConfigErrorKind, Error};

/// Default authentication scheme name, also used as the claim issuer.
pub const AUTH_SCHEME: &str = "MercadoLibre";

/// Default path at which the provider callback is intercepted.
pub const DEFAULT_CALLBACK_PATH: &str = "/ml-signin";

/// Default authorize endpoint. Most deployments override this with the
/// regional host for their site (e.g. `auth.mercadolibre.com.ar`).
pub const DEFAULT_AUTHORIZE_ENDPOINT: &str = "https://auth.mercadolibre.com/authorization";

/// Default token endpoint.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://api.mercadolibre.com/oauth/token";

const DEFAULT_BACKCHANNEL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Configuration for the authorization-code flow handler.
pub struct Config {
    /// OAuth client id issued by the provider.
    pub client_id: String,
    /// OAuth client secret issued by the provider.
    pub client_secret: SecretString,
    /// Request path within the application where the user-agent is returned.
    pub callback_path: String,
    /// Absolute URL of the provider authorize endpoint.
    pub authorize_endpoint: String,
    /// Absolute URL of the provider token endpoint.
    pub token_endpoint: String,
    /// Timeout for the backchannel token exchange call.
    pub backchannel_timeout: Duration,
    /// Cap on the token endpoint response body, in bytes.
    pub max_response_size: usize,
    /// Name of the host scheme responsible for actually signing the user in.
    pub sign_in_scheme: String,
    /// Text a sign-in user interface can display for this provider.
    pub caption: String,
    /// Secret used by the default signed state codec. Required unless the
    /// handler is built with a custom codec.
    pub state_secret: Option<SecretVec<u8>>,
    /// Custom backchannel HTTP client. When set, `root_certificate` must not be.
    pub http_client: Option<reqwest::Client>,
    /// Additional trusted root certificate for backchannel calls.
    pub root_certificate: Option<reqwest::Certificate>,
}

// Manual impl: `SecretVec<u8>` is not `Clone` in secrecy 0.8, so the secret
// is re-wrapped by hand; all other fields clone as a derive would.
impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            callback_path: self.callback_path.clone(),
            authorize_endpoint: self.authorize_endpoint.clone(),
            token_endpoint: self.token_endpoint.clone(),
            backchannel_timeout: self.backchannel_timeout,
            max_response_size: self.max_response_size,
            sign_in_scheme: self.sign_in_scheme.clone(),
            caption: self.caption.clone(),
            state_secret: self
                .state_secret
                .as_ref()
                .map(|s| SecretVec::new(s.expose_secret().clone())),
            http_client: self.http_client.clone(),
            root_certificate: self.root_certificate.clone(),
        }
    }
}

impl Config {
    /// Create a configuration with provider defaults for the given credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            authorize_endpoint: DEFAULT_AUTHORIZE_ENDPOINT.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            backchannel_timeout: DEFAULT_BACKCHANNEL_TIMEOUT,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            sign_in_scheme: AUTH_SCHEME.to_string(),
            caption: AUTH_SCHEME.to_string(),
            state_secret: None,
            http_client: None,
            root_certificate: None,
        }
    }

    /// Set the callback path.
    pub fn with_callback_path(mut self, path: impl Into<String>) -> Self {
        self.callback_path = path.into();
        self
    }

    /// Set the authorize endpoint URL.
    pub fn with_authorize_endpoint(mut self, url: impl Into<String>) -> Self {
        self.authorize_endpoint = url.into();
        self
    }

    /// Set the token endpoint URL.
    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint = url.into();
        self
    }

    /// Set the backchannel timeout.
    pub fn with_backchannel_timeout(mut self, timeout: Duration) -> Self {
        self.backchannel_timeout = timeout;
        self
    }

    /// Set the response body cap for the token exchange.
    pub fn with_max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes;
        self
    }

    /// Set the sign-in scheme the host uses to establish the session.
    pub fn with_sign_in_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.sign_in_scheme = scheme.into();
        self
    }

    /// Set the sign-in UI caption.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Set the secret for the default signed state codec.
    pub fn with_state_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.state_secret = Some(SecretVec::new(secret.into()));
        self
    }

    /// Supply a pre-built backchannel HTTP client.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Trust an additional root certificate on the backchannel.
    pub fn with_root_certificate(mut self, certificate: reqwest::Certificate) -> Self {
        self.root_certificate = Some(certificate);
        self
    }

    /// Validate the configuration.
    ///
    /// Called by the handler constructor so that a bad configuration prevents
    /// startup instead of failing per-request.
    pub fn validate(&self) -> Result<(), Error> {
        if self.client_id.trim().is_empty() {
            return Err(config_error(
                ConfigErrorKind::MissingClientId,
                "client_id must be provided",
            ));
        }
        if self.client_secret.expose_secret().trim().is_empty() {
            return Err(config_error(
                ConfigErrorKind::MissingClientSecret,
                "client_secret must be provided",
            ));
        }
        if !self.callback_path.starts_with('/') {
            return Err(config_error(
                ConfigErrorKind::InvalidCallbackPath,
                "callback_path must begin with '/'",
            ));
        }
        for endpoint in [&self.authorize_endpoint, &self.token_endpoint] {
            Url::parse(endpoint).map_err(|e| Error {
                source: Some(Box::new(e)),
                error_kind: crate::error::ErrorKind::Config(ConfigErrorKind::InvalidEndpoint),
            })?;
        }
        // A root certificate cannot be applied to an already-built client.
        if self.http_client.is_some() && self.root_certificate.is_some() {
            return Err(config_error(
                ConfigErrorKind::TransportValidatorMismatch,
                "root_certificate cannot be combined with a custom http_client",
            ));
        }
        Ok(())
    }
}
