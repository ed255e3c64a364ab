//! Retries for page fetches.
//!
//! Discovery and viewer-page resolution retry network failures and 5xx/429
//! answers with a doubling backoff. Login steps never retry; a failed
//! handshake step aborts the attempt.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{get_with_retry, run_with_retry};
