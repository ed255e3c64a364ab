//! Download task orchestrator.
//!
//! `create_task` registers a task, moves it to RUNNING and spawns its item
//! loop. Items run strictly one after another; pause and stop are
//! cooperative and only take effect between items. Per-item failures are
//! counted, never fatal; ERROR is reserved for faults outside that taxonomy.

mod run;
mod task;

pub use task::{TaskId, TaskRecord, TaskStatus, TaskStore};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{DiscoveryError, TaskError};
use crate::http::HttpTransport;
use crate::model::{Course, Lecture};
use crate::resolver::MediaResolver;
use crate::sink::DownloadSink;

/// A lecture located in the discovery cache, with its course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub course: Course,
    pub lecture: Lecture,
}

/// Where a task looks up its item references.
#[async_trait]
pub trait LectureCatalog: Send + Sync {
    /// Look up an item in the current cache. `Err` is a store fault, not a miss.
    async fn find(&self, key: &str) -> anyhow::Result<Option<CatalogEntry>>;

    /// Force a discovery refresh.
    async fn refresh(&self) -> Result<(), DiscoveryError>;
}

/// Collaborators shared by every task's item loop.
pub(crate) struct Pipeline {
    pub resolver: Arc<dyn MediaResolver>,
    pub sink: Arc<dyn DownloadSink>,
    pub transport: Arc<dyn HttpTransport>,
    pub download_root: PathBuf,
    pub min_payload_bytes: u64,
}

pub struct Orchestrator {
    store: Arc<TaskStore>,
    pipeline: Arc<Pipeline>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<TaskStore>,
        resolver: Arc<dyn MediaResolver>,
        sink: Arc<dyn DownloadSink>,
        transport: Arc<dyn HttpTransport>,
        download_root: PathBuf,
        min_payload_bytes: u64,
    ) -> Self {
        Self {
            store,
            pipeline: Arc::new(Pipeline {
                resolver,
                sink,
                transport,
                download_root,
                min_payload_bytes,
            }),
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Register a task for `items` (lecture ids or fingerprints) and start it.
    /// Must be called within a tokio runtime.
    pub fn create_task(&self, items: Vec<String>, catalog: Arc<dyn LectureCatalog>) -> TaskId {
        let (id, handle) = self.store.insert(items.clone());
        handle.send_modify(|r| {
            r.status = TaskStatus::Running;
            r.log.push(format!("started with {} item(s)", items.len()));
        });
        tracing::info!(task = id, items = items.len(), "task started");

        let looped = tokio::spawn(run::run_items(
            id,
            Arc::clone(&handle),
            items,
            catalog,
            Arc::clone(&self.pipeline),
        ));
        // Supervisor: anything that escapes the loop marks the task ERROR.
        tokio::spawn(async move {
            let fault = match looped.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("{:#}", e)),
                Err(join) => Some(format!("item loop aborted: {}", join)),
            };
            if let Some(msg) = fault {
                tracing::error!(task = id, "task failed: {}", msg);
                handle.send_modify(|r| {
                    r.status = TaskStatus::Error;
                    r.log.push(format!("fatal: {}", msg));
                });
            }
        });
        id
    }

    pub fn get_status(&self, id: TaskId) -> Result<TaskRecord, TaskError> {
        self.store.get(id)
    }

    pub fn pause(&self, id: TaskId) -> Result<(), TaskError> {
        self.store.pause(id)
    }

    pub fn resume(&self, id: TaskId) -> Result<(), TaskError> {
        self.store.resume(id)
    }

    pub fn stop(&self, id: TaskId) -> Result<(), TaskError> {
        self.store.stop(id)
    }

    pub fn subscribe(&self, id: TaskId) -> Result<watch::Receiver<TaskRecord>, TaskError> {
        self.store.subscribe(id)
    }

    pub fn forget(&self, id: TaskId) -> Result<TaskRecord, TaskError> {
        self.store.forget(id)
    }

    /// Resolve once the task reaches a terminal status.
    pub async fn wait_terminal(&self, id: TaskId) -> Result<TaskRecord, TaskError> {
        let mut rx = self.store.subscribe(id)?;
        let reached = rx
            .wait_for(|r| r.status.is_terminal())
            .await
            .map(|r| (*r).clone())
            .ok();
        // None: the sender is gone (task forgotten); report its last state.
        Ok(reached.unwrap_or_else(|| rx.borrow().clone()))
    }
}
