//! # meli-auth
//!
//! Server side of the OAuth2 authorization-code login flow for MercadoLibre:
//! - Challenge redirects to the provider authorize endpoint
//! - Tamper-evident `state` round-tripping across the redirect
//! - Backchannel exchange of the authorization code for an access token
//! - Claims built from the provider payload, handed to the host for sign-in
//! - Host extension points at the three decision points of the flow
//!
//! ## Architecture
//!
//! The crate binds to no HTTP framework. The host adapts its request type into
//! a [`CallbackRequest`], asks the handler to [`challenge`](AuthHandler::challenge)
//! when a response would otherwise be a 401, and routes requests at the
//! callback path (default `/ml-signin`) into
//! [`handle_callback`](AuthHandler::handle_callback), which returns a
//! [`CallbackOutcome`] the host turns into a sign-in, a redirect, or an error
//! response.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meli_auth::{AuthHandler, AuthSessionState, CallbackRequest, Config};
//!
//! let handler = AuthHandler::new(
//!     Config::new(client_id, client_secret).with_state_secret(state_secret),
//! )?;
//!
//! // On a 401:
//! let outcome = handler.challenge(&request, AuthSessionState::new())?;
//!
//! // On GET /ml-signin:
//! let outcome = handler.handle_callback(&request).await;
//! ```

pub mod claims;
pub mod config;
pub mod error;
pub mod exchange;
pub mod handler;
pub mod hooks;
pub mod request;
pub mod state;

// Re-export commonly used types
pub use claims::{Claim, Identity};
pub use config::Config;
pub use error::{Error, ErrorKind};
pub use handler::{AuthHandler, CallbackOutcome, ChallengeOutcome};
pub use hooks::{Hooks, NoopHooks};
pub use request::CallbackRequest;
pub use state::{AuthSessionState, SignedStateCodec, StateCodec};
