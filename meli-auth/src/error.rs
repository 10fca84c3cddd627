//! Error types for the `meli-auth` crate.
//!
//! A root Error struct holds the error kind and an optional source for chaining.
//! Per-request failures never escape the callback handler as raw errors; they
//! are converted into `CallbackOutcome` variants at that boundary.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for meli-auth.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in meli-auth.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Config(ConfigErrorKind),
    State(StateErrorKind),
    Exchange(ExchangeErrorKind),
}

/// Errors raised while validating configuration or constructing the handler.
/// These are fatal at initialization time and never occur per-request.
#[derive(Debug, PartialEq)]
pub enum ConfigErrorKind {
    MissingClientId,
    MissingClientSecret,
    MissingStateSecret,
    InvalidEndpoint,
    InvalidCallbackPath,
    TransportValidatorMismatch,
    ClientBuild,
}

/// Errors from encoding or decoding the `state` round-trip parameter.
#[derive(Debug, PartialEq)]
pub enum StateErrorKind {
    Malformed,
    SignatureMismatch,
}

/// Errors from the backchannel token exchange.
#[derive(Debug, PartialEq)]
pub enum ExchangeErrorKind {
    Network,
    Status,
    BodyTooLarge,
    InvalidPayload,
    MissingAccessToken,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Config(kind) => write!(f, "configuration error: {:?}", kind)?,
            ErrorKind::State(kind) => write!(f, "state error: {:?}", kind)?,
            ErrorKind::Exchange(kind) => write!(f, "token exchange error: {:?}", kind)?,
        }
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Config(ConfigErrorKind::ClientBuild)
        } else if err.is_status() {
            ErrorKind::Exchange(ExchangeErrorKind::Status)
        } else {
            ErrorKind::Exchange(ExchangeErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

/// Helper function to create configuration errors.
pub fn config_error(kind: ConfigErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Config(kind),
    }
}

/// Helper function to create state codec errors.
pub fn state_error(kind: StateErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::State(kind),
    }
}

/// Helper function to create token exchange errors.
pub fn exchange_error(kind: ExchangeErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Exchange(kind),
    }
}
