//! Download sink: where resolved media payloads end up on disk.
//!
//! Payloads are written to `<dest>.part` and renamed into place once
//! complete, so a destination path only ever holds a finished file.

mod http_sink;

pub use http_sink::HttpSink;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::TransferError;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Appends `.part` to the final path (`a.mp4` → `a.mp4.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Result of a completed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReceipt {
    pub path: PathBuf,
    pub bytes: u64,
}

#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Download `url` to `dest`, resolving once the file is complete.
    async fn submit(&self, url: &str, dest: &Path) -> Result<SinkReceipt, TransferError>;
}

/// Write an in-memory payload through the same temp-and-rename path.
pub async fn write_payload(dest: &Path, bytes: &[u8]) -> Result<SinkReceipt, TransferError> {
    let io_err = |e: std::io::Error| TransferError::SinkFailure(format!("{}: {}", dest.display(), e));
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let tmp = temp_path(dest);
    let mut file = tokio::fs::File::create(&tmp).await.map_err(io_err)?;
    file.write_all(bytes).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    drop(file);
    tokio::fs::rename(&tmp, dest).await.map_err(io_err)?;
    Ok(SinkReceipt {
        path: dest.to_path_buf(),
        bytes: bytes.len() as u64,
    })
}

const MANIFEST_MAGIC: &[u8] = b"#EXTM3U";

/// Heuristic payload check: too small, or manifest text instead of media.
pub async fn validate_payload(path: &Path, min_bytes: u64) -> Result<u64, TransferError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| TransferError::SinkFailure(format!("{}: {}", path.display(), e)))?;
    let size = meta.len();
    if size < min_bytes {
        return Err(TransferError::PayloadValidationFailure(format!(
            "{} is {} bytes, below the {} byte minimum",
            path.display(),
            size,
            min_bytes
        )));
    }

    let mut head = [0u8; 64];
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| TransferError::SinkFailure(format!("{}: {}", path.display(), e)))?;
    let n = file
        .read(&mut head)
        .await
        .map_err(|e| TransferError::SinkFailure(format!("{}: {}", path.display(), e)))?;
    if looks_like_manifest(&head[..n]) {
        return Err(TransferError::PayloadValidationFailure(format!(
            "{} contains a stream manifest, not media",
            path.display()
        )));
    }
    Ok(size)
}

fn looks_like_manifest(head: &[u8]) -> bool {
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace() && *b != 0xEF && *b != 0xBB && *b != 0xBF)
        .unwrap_or(head.len());
    head[start..].starts_with(MANIFEST_MAGIC)
}

/// Remove a rejected payload; a missing file is not an error.
pub async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("could not delete {}: {}", path.display(), e);
        }
    }
}
