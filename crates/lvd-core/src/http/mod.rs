//! HTTP transport seam.
//!
//! Everything that talks to the platform goes through [`HttpTransport`], so
//! the authenticator, discovery and resolver can be driven by a scripted
//! transport in tests and by [`ReqwestTransport`] in production. The session
//! (cookie jar) lives inside the transport.

mod error;
mod reqwest_transport;
#[cfg(test)]
pub(crate) mod testing;

pub use error::HttpError;
pub use reqwest_transport::ReqwestTransport;

use std::path::Path;

use async_trait::async_trait;

/// A fetched text page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET a page; non-2xx statuses are errors.
    async fn get(&self, url: &str) -> Result<Page, HttpError>;

    /// POST an urlencoded form; non-2xx statuses are errors.
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Page, HttpError>;

    /// Stream a binary payload to `dest` with the session cookies, through
    /// `<dest>.part` and a rename. Returns the bytes written.
    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, HttpError>;

    /// Drop all session cookies.
    fn reset_session(&self);
}
