//! Host extension points for the sign-in flow.
//!
//! A strategy trait with no-op defaults, composed into the handler at
//! construction time. Hosts override only the decision points they care about.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::claims::Identity;

/// Context for [`Hooks::on_authenticated`], after a successful token exchange.
pub struct AuthenticatedContext {
    /// The identity built from the provider payload. Clearing it vetoes the
    /// login without re-entering the protocol logic.
    pub identity: Option<Identity>,
    /// Access token returned by the provider.
    pub access_token: SecretString,
    /// Refresh token, when the provider issued one.
    pub refresh_token: Option<SecretString>,
    /// Access token lifetime, when the provider reported one.
    pub expires_in: Option<Duration>,
    /// Provider user id extracted from the payload.
    pub provider_user_id: Option<String>,
    /// The raw token endpoint payload, for provider-specific augmentation.
    pub user: serde_json::Value,
    /// Properties carried through the state round trip.
    pub properties: HashMap<String, String>,
}

/// Context for [`Hooks::on_return_endpoint`], just before the handler commits
/// to a sign-in or redirect decision.
pub struct ReturnEndpointContext {
    pub identity: Option<Identity>,
    pub properties: HashMap<String, String>,
    /// Target of the post-sign-in redirect. Clearing it falls back to the
    /// original challenge target.
    pub redirect_uri: Option<String>,
    pub sign_in_scheme: Option<String>,
    request_handled: bool,
}

impl ReturnEndpointContext {
    pub(crate) fn new(
        identity: Option<Identity>,
        properties: HashMap<String, String>,
        redirect_uri: String,
        sign_in_scheme: String,
    ) -> Self {
        Self {
            identity,
            properties,
            redirect_uri: Some(redirect_uri),
            sign_in_scheme: Some(sign_in_scheme),
            request_handled: false,
        }
    }

    /// Suppress the handler's default outcome; the hook produced its own
    /// response.
    pub fn mark_handled(&mut self) {
        self.request_handled = true;
    }

    pub fn is_handled(&self) -> bool {
        self.request_handled
    }
}

/// Context for [`Hooks::on_apply_redirect`], holding the fully-built
/// authorize URL for a challenge.
pub struct ApplyRedirectContext {
    /// The authorize endpoint URL the user-agent will be sent to. Hooks may
    /// rewrite it (e.g. to add provider-specific parameters).
    pub redirect_uri: String,
    /// Properties of the challenge being applied.
    pub properties: HashMap<String, String>,
    request_handled: bool,
}

impl ApplyRedirectContext {
    pub(crate) fn new(redirect_uri: String, properties: HashMap<String, String>) -> Self {
        Self {
            redirect_uri,
            properties,
            request_handled: false,
        }
    }

    /// Take over the redirect side effect entirely.
    pub fn mark_handled(&mut self) {
        self.request_handled = true;
    }

    pub fn is_handled(&self) -> bool {
        self.request_handled
    }
}

/// Extension points invoked at the three decision points of the flow.
///
/// All methods default to no-ops; [`NoopHooks`] is the stock implementation.
#[async_trait]
pub trait Hooks: Send + Sync {
    /// Invoked whenever the provider successfully authenticates a user,
    /// before the identity is finalized. May run further async work, such as
    /// fetching additional profile data with the access token.
    async fn on_authenticated(&self, _context: &mut AuthenticatedContext) {}

    /// Invoked prior to the host being signalled to establish the session and
    /// redirect to the originally requested URL.
    async fn on_return_endpoint(&self, _context: &mut ReturnEndpointContext) {}

    /// Invoked when a challenge causes a redirect to the authorize endpoint.
    fn on_apply_redirect(&self, _context: &mut ApplyRedirectContext) {}
}

/// Hooks implementation that accepts every default.
pub struct NoopHooks;

#[async_trait]
impl Hooks for NoopHooks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_hooks_leave_context_untouched() {
        let hooks = NoopHooks;
        let mut context = ReturnEndpointContext::new(
            Some(Identity::new()),
            HashMap::new(),
            "https://example.com/".to_string(),
            "Cookies".to_string(),
        );
        hooks.on_return_endpoint(&mut context).await;
        assert!(!context.is_handled());
        assert!(context.identity.is_some());
        assert_eq!(context.redirect_uri.as_deref(), Some("https://example.com/"));
    }
}
