//! The per-task item loop.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::task::{TaskHandle, TaskId, TaskStatus};
use super::{CatalogEntry, LectureCatalog, Pipeline};
use crate::error::{ResolutionError, TransferError};
use crate::paths;
use crate::resolver::MediaKind;
use crate::sink;

/// What happened to one item. Failures are recorded, never escalated.
enum ItemOutcome {
    Done(String),
    Failed(String),
}

fn stop_requested(handle: &TaskHandle) -> bool {
    handle.borrow().stop_requested
}

fn finish_stopped(handle: &TaskHandle, id: TaskId) {
    handle.send_modify(|r| {
        r.status = TaskStatus::Stopped;
        r.log.push(format!(
            "stopped by user ({} completed, {} failed)",
            r.completed_count, r.failed_count
        ));
    });
    tracing::info!(task = id, "task stopped");
}

pub(super) async fn run_items(
    id: TaskId,
    handle: TaskHandle,
    items: Vec<String>,
    catalog: Arc<dyn LectureCatalog>,
    pipeline: Arc<Pipeline>,
) -> Result<()> {
    let total = items.len();
    let mut rx = handle.subscribe();

    for (idx, item) in items.iter().enumerate() {
        if stop_requested(&handle) {
            finish_stopped(&handle, id);
            return Ok(());
        }

        let paused = handle.borrow().pause_requested;
        if paused {
            tracing::debug!(task = id, "paused before item {}", idx + 1);
            rx.wait_for(|r| !r.pause_requested || r.stop_requested)
                .await
                .map_err(|_| anyhow!("task channel closed while paused"))?;
        }

        if stop_requested(&handle) {
            finish_stopped(&handle, id);
            return Ok(());
        }

        let outcome = process_item(item, catalog.as_ref(), &pipeline).await?;
        let progress = ((idx + 1) * 100 / total) as u8;
        handle.send_modify(|r| {
            match &outcome {
                ItemOutcome::Done(msg) => {
                    r.completed_count += 1;
                    r.log.push(format!("[{}/{}] {}: {}", idx + 1, total, item, msg));
                }
                ItemOutcome::Failed(msg) => {
                    r.failed_count += 1;
                    r.log.push(format!("[{}/{}] {} failed: {}", idx + 1, total, item, msg));
                }
            }
            r.progress_percent = r.progress_percent.max(progress);
        });
        match &outcome {
            ItemOutcome::Done(msg) => tracing::info!(task = id, item = %item, "{}", msg),
            ItemOutcome::Failed(msg) => tracing::warn!(task = id, item = %item, "item failed: {}", msg),
        }
    }

    // A stop accepted during the last item still wins over completion.
    if stop_requested(&handle) {
        finish_stopped(&handle, id);
        return Ok(());
    }

    handle.send_modify(|r| {
        r.status = TaskStatus::Completed;
        r.progress_percent = 100;
        r.log.push(format!(
            "finished: {} completed, {} failed",
            r.completed_count, r.failed_count
        ));
    });
    tracing::info!(task = id, "task completed");
    Ok(())
}

/// Locate, refreshing the catalog once on a miss.
async fn locate(item: &str, catalog: &dyn LectureCatalog) -> Result<Option<CatalogEntry>> {
    if let Some(entry) = catalog.find(item).await? {
        return Ok(Some(entry));
    }
    tracing::debug!(item, "not in cache, refreshing discovery");
    if let Err(e) = catalog.refresh().await {
        tracing::warn!(item, "discovery refresh failed: {}", e);
        return Ok(None);
    }
    catalog.find(item).await
}

/// Process one item. `Err` means a fault outside the per-item taxonomy.
async fn process_item(
    item: &str,
    catalog: &dyn LectureCatalog,
    pipeline: &Pipeline,
) -> Result<ItemOutcome> {
    let Some(entry) = locate(item, catalog).await? else {
        return Ok(ItemOutcome::Failed("not found in the course list".to_string()));
    };

    let media = match pipeline.resolver.resolve(&entry.lecture.viewer_url).await {
        Ok(m) => m,
        Err(e) => return Ok(ItemOutcome::Failed(e.to_string())),
    };
    if media.kind == MediaKind::StreamManifest {
        return Ok(ItemOutcome::Failed(
            ResolutionError::UnsupportedFormat(media.url).to_string(),
        ));
    }

    let dest = paths::destination_path(
        &pipeline.download_root,
        &entry.course,
        &entry.lecture,
        &media.url,
    );
    if tokio::fs::try_exists(&dest).await.unwrap_or(false)
        && sink::validate_payload(&dest, pipeline.min_payload_bytes).await.is_ok()
    {
        return Ok(ItemOutcome::Done(format!("already downloaded at {}", dest.display())));
    }

    Ok(match transfer(&media.url, &dest, pipeline).await {
        Ok(bytes) => ItemOutcome::Done(format!("saved {} ({} bytes)", dest.display(), bytes)),
        Err(e) => ItemOutcome::Failed(e.to_string()),
    })
}

/// Sink submit, one authenticated fetch on sink failure, then validation.
async fn transfer(url: &str, dest: &Path, pipeline: &Pipeline) -> Result<u64, TransferError> {
    if let Err(sink_err) = pipeline.sink.submit(url, dest).await {
        tracing::warn!(url, "sink failed, trying authenticated fetch: {}", sink_err);
        pipeline.transport.download_to(url, dest).await.map_err(|e| {
            TransferError::SinkFailure(format!("{}; fallback fetch failed: {}", sink_err, e))
        })?;
    }
    match sink::validate_payload(dest, pipeline.min_payload_bytes).await {
        Ok(size) => Ok(size),
        Err(e) => {
            sink::discard(dest).await;
            Err(e)
        }
    }
}
