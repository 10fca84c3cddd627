//! The authorization-code flow handler.
//!
//! Transport-agnostic: the host adapts its request type into a
//! [`CallbackRequest`], calls [`AuthHandler::challenge`] when a response needs
//! authentication, and [`AuthHandler::handle_callback`] for requests arriving
//! at the callback path. Every per-request failure is converted into a
//! [`CallbackOutcome`] at this boundary; none escapes as a raw error.

use secrecy::ExposeSecret;
use tracing::{debug, error, warn};

use crate::claims::Identity;
use crate::config::Config;
use crate::error::{config_error, ConfigErrorKind, Error};
use crate::exchange::TokenExchange;
use crate::hooks::{ApplyRedirectContext, AuthenticatedContext, Hooks, NoopHooks, ReturnEndpointContext};
use crate::request::CallbackRequest;
use crate::state::{AuthSessionState, SignedStateCodec, StateCodec};

/// Error hint appended to the redirect target on a failed sign-in.
const ERROR_HINT: (&str, &str) = ("error", "access_denied");

/// Status the host pipeline uses to signal that authentication is required.
const CHALLENGE_STATUS: u16 = 401;

/// Result of applying a challenge.
#[derive(Debug, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// Send the user-agent to this authorize URL.
    Redirect(String),
    /// A hook issued its own response.
    Handled,
}

/// Terminal result of one callback invocation.
pub enum CallbackOutcome {
    /// Establish a session for `identity` under `sign_in_scheme`, then send
    /// the user-agent to `redirect_uri`.
    Completed {
        identity: Identity,
        sign_in_scheme: String,
        redirect_uri: String,
        properties: std::collections::HashMap<String, String>,
    },
    /// The provider declined, or a hook vetoed the login. `redirect_uri`
    /// already carries the error hint.
    ProviderError { reason: String, redirect_uri: String },
    /// The state parameter was missing, forged, or malformed. There is no
    /// trusted redirect target; respond with a server error.
    InvalidState,
    /// The token exchange failed. No identity; `redirect_uri` carries the
    /// error hint.
    TransportFailure { source: Error, redirect_uri: String },
    /// A hook produced its own response; nothing further to do.
    Handled,
}

/// Server side of the OAuth2 authorization-code login flow.
///
/// Holds only immutable configuration and a shared pooled HTTP client, so one
/// instance serves concurrent requests without synchronization.
pub struct AuthHandler {
    config: Config,
    codec: Box<dyn StateCodec>,
    hooks: Box<dyn Hooks>,
    exchange: TokenExchange,
}

impl std::fmt::Debug for AuthHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHandler").finish_non_exhaustive()
    }
}

impl AuthHandler {
    /// Build a handler with the default signed state codec and no-op hooks.
    pub fn new(config: Config) -> Result<Self, Error> {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> AuthHandlerBuilder {
        AuthHandlerBuilder {
            config,
            codec: None,
            hooks: None,
        }
    }

    /// The path at which provider callbacks are intercepted.
    pub fn callback_path(&self) -> &str {
        &self.config.callback_path
    }

    /// Whether this request targets the callback path.
    pub fn is_callback(&self, request: &CallbackRequest) -> bool {
        request.path == self.config.callback_path
    }

    /// Whether a response status signals that a challenge should be applied.
    pub fn should_challenge(status: u16) -> bool {
        status == CHALLENGE_STATUS
    }

    /// Apply a challenge: encode the state and build the redirect to the
    /// provider authorize endpoint.
    ///
    /// An absent or empty redirect target defaults to the current request URL
    /// so the user returns to where they started.
    pub fn challenge(
        &self,
        request: &CallbackRequest,
        mut state: AuthSessionState,
    ) -> Result<ChallengeOutcome, Error> {
        if state.redirect_uri.as_deref().map_or(true, str::is_empty) {
            state.redirect_uri = Some(request.current_url());
        }

        let token = self.codec.encode(&state)?;
        let return_to = self.return_to_url(request, &token);
        let authorize_url = self.authorize_url(&return_to);
        debug!(url = %authorize_url, "applying sign-in challenge");

        let mut context = ApplyRedirectContext::new(authorize_url, state.properties);
        self.hooks.on_apply_redirect(&mut context);

        if context.is_handled() {
            Ok(ChallengeOutcome::Handled)
        } else {
            Ok(ChallengeOutcome::Redirect(context.redirect_uri))
        }
    }

    /// Process a provider callback and decide the terminal outcome.
    pub async fn handle_callback(&self, request: &CallbackRequest) -> CallbackOutcome {
        let raw_state = match request.single_query("state") {
            Some(raw) => raw,
            None => {
                warn!("callback carried no usable state parameter");
                return CallbackOutcome::InvalidState;
            }
        };

        let state = match self.codec.decode(raw_state) {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %err, "invalid return state");
                return CallbackOutcome::InvalidState;
            }
        };

        // The state is trusted from here on, so there is always a target to
        // bounce failures back to: the embedded one, or the application root
        // of the callback itself.
        let redirect_target = state
            .redirect_uri
            .clone()
            .filter(|uri| !uri.is_empty())
            .unwrap_or_else(|| format!("{}://{}/", request.scheme, request.host));

        if let Some(provider_error) = request.first_query("error") {
            debug!(error = provider_error, "provider returned an error");
        }

        // `code` wins when the provider sets `error` alongside a valid code.
        let code = match request.single_query("code") {
            Some(code) => code,
            None => {
                let reason = request
                    .first_query("error")
                    .unwrap_or(ERROR_HINT.1)
                    .to_string();
                warn!(reason = %reason, "provider declined the sign-in");
                return CallbackOutcome::ProviderError {
                    reason,
                    redirect_uri: append_query(&redirect_target, ERROR_HINT.0, ERROR_HINT.1),
                };
            }
        };

        let return_to = self.return_to_url(request, raw_state);
        let grant = match self.exchange.exchange(code, &return_to).await {
            Ok(grant) => grant,
            Err(err) => {
                error!(error = %err, "authentication failed");
                return CallbackOutcome::TransportFailure {
                    source: err,
                    redirect_uri: append_query(&redirect_target, ERROR_HINT.0, ERROR_HINT.1),
                };
            }
        };

        let identity = Identity::from_provider_id(
            grant.user_id.as_deref(),
            &self.config.sign_in_scheme,
        );

        let mut authenticated = AuthenticatedContext {
            identity: Some(identity),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_in: grant.expires_in,
            provider_user_id: grant.user_id,
            user: grant.raw,
            properties: state.properties,
        };
        self.hooks.on_authenticated(&mut authenticated).await;

        let mut return_endpoint = ReturnEndpointContext::new(
            authenticated.identity,
            authenticated.properties,
            redirect_target.clone(),
            self.config.sign_in_scheme.clone(),
        );
        self.hooks.on_return_endpoint(&mut return_endpoint).await;

        if return_endpoint.is_handled() {
            return CallbackOutcome::Handled;
        }

        let redirect_uri = return_endpoint
            .redirect_uri
            .filter(|uri| !uri.is_empty())
            .unwrap_or(redirect_target);

        match (return_endpoint.identity, return_endpoint.sign_in_scheme) {
            (Some(identity), Some(sign_in_scheme)) => CallbackOutcome::Completed {
                identity,
                sign_in_scheme,
                redirect_uri,
                properties: return_endpoint.properties,
            },
            _ => CallbackOutcome::ProviderError {
                reason: ERROR_HINT.1.to_string(),
                redirect_uri: append_query(&redirect_uri, ERROR_HINT.0, ERROR_HINT.1),
            },
        }
    }

    /// The callback URL with the encoded state in its own query string.
    ///
    /// The provider only forwards `code`/`state`/`error`, so the state rides
    /// on the callback URL itself. This exact string is used as `redirect_uri`
    /// in both the authorize URL and the token exchange.
    fn return_to_url(&self, request: &CallbackRequest, state_token: &str) -> String {
        format!(
            "{}://{}{}?state={}",
            request.scheme,
            request.host,
            self.config.callback_path,
            urlencoding::encode(state_token)
        )
    }

    /// The absolute authorize-endpoint URL. Pure and byte-reproducible.
    fn authorize_url(&self, return_to: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}",
            self.config.authorize_endpoint,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(return_to)
        )
    }
}

/// Builder composing the handler with optional codec and hooks overrides.
pub struct AuthHandlerBuilder {
    config: Config,
    codec: Option<Box<dyn StateCodec>>,
    hooks: Option<Box<dyn Hooks>>,
}

impl AuthHandlerBuilder {
    /// Substitute the state codec.
    pub fn with_state_codec(mut self, codec: Box<dyn StateCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Install host hooks.
    pub fn with_hooks(mut self, hooks: Box<dyn Hooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Validate the configuration and build the handler.
    ///
    /// Fails fast on bad configuration so the middleware never starts in a
    /// state that would fail per-request.
    pub fn build(self) -> Result<AuthHandler, Error> {
        self.config.validate()?;

        let codec: Box<dyn StateCodec> = match self.codec {
            Some(codec) => codec,
            None => {
                let secret = self.config.state_secret.as_ref().ok_or_else(|| {
                    config_error(
                        ConfigErrorKind::MissingStateSecret,
                        "state_secret is required unless a custom state codec is supplied",
                    )
                })?;
                Box::new(SignedStateCodec::new(secret.expose_secret().clone()))
            }
        };

        let client = match &self.config.http_client {
            Some(client) => client.clone(),
            None => {
                let mut builder = reqwest::Client::builder()
                    .use_rustls_tls()
                    .timeout(self.config.backchannel_timeout);
                if let Some(certificate) = &self.config.root_certificate {
                    builder = builder.add_root_certificate(certificate.clone());
                }
                builder.build()?
            }
        };

        let exchange = TokenExchange::new(client, &self.config);

        Ok(AuthHandler {
            exchange,
            codec,
            hooks: self.hooks.unwrap_or_else(|| Box::new(NoopHooks)),
            config: self.config,
        })
    }
}

/// Append a query parameter to a URL that may or may not have a query string.
fn append_query(url: &str, name: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}{}={}",
        url,
        separator,
        urlencoding::encode(name),
        urlencoding::encode(value)
    )
}
