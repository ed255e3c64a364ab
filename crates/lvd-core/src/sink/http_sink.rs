//! Streaming HTTP sink built on reqwest.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{temp_path, DownloadSink, SinkReceipt};
use crate::error::TransferError;

/// Streams a media URL to disk without session cookies; media hosts serve
/// signed URLs. Failures fall back to the orchestrator's authenticated fetch.
pub struct HttpSink {
    client: reqwest::Client,
}

impl HttpSink {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .context("build sink http client")?;
        Ok(Self { client })
    }

    async fn stream_to(&self, url: &str, tmp: &Path) -> Result<u64> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        let mut file = tokio::fs::File::create(tmp)
            .await
            .with_context(|| format!("create {}", tmp.display()))?;
        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await.with_context(|| format!("read body of {url}"))? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl DownloadSink for HttpSink {
    async fn submit(&self, url: &str, dest: &Path) -> Result<SinkReceipt, TransferError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::SinkFailure(format!("{}: {}", parent.display(), e)))?;
        }
        let tmp = temp_path(dest);
        match self.stream_to(url, &tmp).await {
            Ok(bytes) => {
                tokio::fs::rename(&tmp, dest)
                    .await
                    .map_err(|e| TransferError::SinkFailure(format!("finalize {}: {}", dest.display(), e)))?;
                tracing::info!(url, path = %dest.display(), bytes, "download finished");
                Ok(SinkReceipt {
                    path: dest.to_path_buf(),
                    bytes,
                })
            }
            Err(e) => {
                super::discard(&tmp).await;
                Err(TransferError::SinkFailure(format!("{:#}", e)))
            }
        }
    }
}
