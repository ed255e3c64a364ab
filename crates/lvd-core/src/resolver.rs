//! Media resolver: turns a lecture's viewer page into a concrete media reference.
//!
//! The orchestrator only depends on the [`MediaResolver`] trait; the
//! platform-backed implementation fetches the viewer page through the session
//! transport and hands the markup to `page_model::parse_viewer`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;
use crate::http::HttpTransport;
use crate::page_model;
use crate::retry::{get_with_retry, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    /// A single downloadable file (mp4).
    DirectFile,
    /// An HLS manifest; never downloaded by this engine.
    StreamManifest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
}

#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, viewer_url: &str) -> Result<MediaRef, ResolutionError>;
}

/// Resolver backed by the authenticated platform session.
pub struct ViewerPageResolver {
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
}

impl ViewerPageResolver {
    pub fn new(transport: Arc<dyn HttpTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }
}

#[async_trait]
impl MediaResolver for ViewerPageResolver {
    async fn resolve(&self, viewer_url: &str) -> Result<MediaRef, ResolutionError> {
        let page = get_with_retry(self.transport.as_ref(), &self.retry, viewer_url).await?;
        match page_model::parse_viewer(&page.body, viewer_url) {
            Some(media) => {
                tracing::debug!(viewer_url, media_url = %media.url, kind = ?media.kind, "resolved media");
                Ok(media)
            }
            None => Err(ResolutionError::NotFound(viewer_url.to_string())),
        }
    }
}
