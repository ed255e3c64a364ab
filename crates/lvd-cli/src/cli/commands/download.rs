//! `lvd download` – run one download task in the foreground.
//!
//! The task is steerable from other shells through the control socket and
//! stopped cleanly on Ctrl-C.

use anyhow::{bail, Result};
use lvd_core::config;
use lvd_core::model::Term;
use lvd_core::orchestrator::TaskStatus;
use lvd_core::Engine;
use std::sync::Arc;

use crate::cli::control_socket;

pub async fn run_download(engine: Engine, lectures: Vec<String>, term: Term) -> Result<()> {
    let engine = Arc::new(engine);
    let id = engine.create_task(lectures, term)?;

    let socket_path = config::control_socket_path().ok();
    let listener = socket_path.as_ref().and_then(|p| {
        match control_socket::spawn_control_listener(Arc::clone(&engine), p) {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::warn!("control socket unavailable: {:#}", e);
                None
            }
        }
    });
    println!("Task {id} started for {term}. Use `lvd pause|resume|stop {id}` from another shell.");

    let mut rx = engine.subscribe(id)?;
    let mut printed = 0usize;
    let mut last_status = TaskStatus::Running;
    let record = loop {
        let snapshot = rx.borrow_and_update().clone();
        for line in &snapshot.log[printed.min(snapshot.log.len())..] {
            println!("  {line}");
        }
        printed = snapshot.log.len();
        if snapshot.status != last_status {
            println!("[{}] {}%", snapshot.status, snapshot.progress_percent);
            last_status = snapshot.status;
        }
        if snapshot.status.is_terminal() {
            break snapshot;
        }
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break engine.get_status(id)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted, stopping after the current lecture...");
                let _ = engine.stop(id);
            }
        }
    };

    if let Some(h) = listener {
        h.abort();
    }
    if let Some(p) = socket_path {
        let _ = std::fs::remove_file(p);
    }

    println!(
        "Task {id}: {} ({} completed, {} failed)",
        record.status, record.completed_count, record.failed_count
    );
    if record.status == TaskStatus::Error {
        bail!("task {id} ended with an error");
    }
    Ok(())
}
