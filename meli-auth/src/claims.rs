//! Portable identity built from the provider payload.

use serde::{Deserialize, Serialize};

/// Claim type for the subject identifier.
pub const NAME_IDENTIFIER: &str =
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";

/// Provider-namespaced claim type mirroring the MercadoLibre user id.
pub const MERCADOLIBRE_ID: &str = "urn:mercadolibre:id";

/// A single typed fact about the authenticated subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
    pub issuer: String,
}

/// The portable identity handed to the host for session establishment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    /// The provider's unique identifier for the user, when one was present.
    pub subject: Option<String>,
    pub claims: Vec<Claim>,
}

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the identity for a provider user id.
    ///
    /// Emits the subject claim and the `urn:mercadolibre:id` claim, both only
    /// when the id is non-empty. An empty id still yields a usable (if
    /// anonymous) identity rather than a failure.
    pub fn from_provider_id(id: Option<&str>, issuer: &str) -> Self {
        let mut identity = Self::new();
        if let Some(id) = id {
            identity.subject = Some(id.to_string()).filter(|s| !s.is_empty());
            identity.add_claim(NAME_IDENTIFIER, id, issuer);
            identity.add_claim(MERCADOLIBRE_ID, id, issuer);
        }
        identity
    }

    /// Add a claim, skipping empty values.
    pub fn add_claim(&mut self, claim_type: &str, value: &str, issuer: &str) {
        if value.is_empty() {
            return;
        }
        self.claims.push(Claim {
            claim_type: claim_type.to_string(),
            value: value.to_string(),
            issuer: issuer.to_string(),
        });
    }

    /// The first claim of the given type, if any.
    pub fn find(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.claim_type == claim_type)
    }
}
