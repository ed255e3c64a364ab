//! Typed failures per component.
//!
//! Application edges (config, stores, CLI) use `anyhow`; these enums are what
//! engine callers match on.

use thiserror::Error;

use crate::http::HttpError;

/// Any login step failure. Aborts the whole attempt.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not parse {what} from the {step} response")]
    ParseFailure {
        step: &'static str,
        what: &'static str,
    },

    #[error("network failure during {step}: {source}")]
    NetworkFailure {
        step: &'static str,
        #[source]
        source: HttpError,
    },

    #[error("credential encryption failed: {0}")]
    EncryptionFailure(String),

    #[error("login was not verified: no logout link on the platform home page")]
    VerificationFailed,

    #[error("login step {step} called in state {state}")]
    OutOfOrder {
        step: &'static str,
        state: &'static str,
    },
}

/// Discovery failures. Variants hold strings so a shared single-flight
/// result can be cloned to every waiter.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("failed to parse {0}")]
    PageParseFailure(String),

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("session expired; log in again")]
    SessionExpired,

    #[error("cache store: {0}")]
    Cache(String),
}

impl From<HttpError> for DiscoveryError {
    fn from(e: HttpError) -> Self {
        DiscoveryError::NetworkFailure(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no media reference found on {0}")]
    NotFound(String),

    #[error("{0} is a streaming manifest, which is not downloadable")]
    UnsupportedFormat(String),

    #[error("could not fetch viewer page: {0}")]
    NetworkFailure(#[from] HttpError),
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("download sink failed: {0}")]
    SinkFailure(String),

    #[error("payload rejected: {0}")]
    PayloadValidationFailure(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task {0} not found")]
    NotFound(u64),

    #[error("task {id}: cannot {command} while {status}")]
    InvalidStateTransition {
        id: u64,
        command: &'static str,
        status: &'static str,
    },
}

/// Failures surfaced by the [`Engine`](crate::engine::Engine) control surface.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not logged in")]
    NotLoggedIn,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("course {0} is not in the course list for this term")]
    UnknownCourse(String),

    #[error("cache store: {0}")]
    Cache(String),
}
