//! Control socket: server (during `lvd download`) and client (`lvd pause|resume|stop`).
//! Protocol: one request line "pause <id>", "resume <id>" or "stop <id>";
//! the server answers with one line, "ok" or "error: <reason>".

use anyhow::{bail, Context, Result};
use lvd_core::orchestrator::TaskId;
use lvd_core::Engine;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlVerb {
    Pause,
    Resume,
    Stop,
}

impl ControlVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlVerb::Pause => "pause",
            ControlVerb::Resume => "resume",
            ControlVerb::Stop => "stop",
        }
    }
}

/// Parse one request line. Malformed lines yield `None`.
pub fn parse_line(line: &str) -> Option<(ControlVerb, TaskId)> {
    let (verb, id) = line.trim().split_once(' ')?;
    let verb = match verb {
        "pause" => ControlVerb::Pause,
        "resume" => ControlVerb::Resume,
        "stop" => ControlVerb::Stop,
        _ => return None,
    };
    Some((verb, id.trim().parse().ok()?))
}

fn apply(engine: &Engine, verb: ControlVerb, id: TaskId) -> String {
    let result = match verb {
        ControlVerb::Pause => engine.pause(id),
        ControlVerb::Resume => engine.resume(id),
        ControlVerb::Stop => engine.stop(id),
    };
    match result {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    }
}

/// Spawns a task that listens on `path` and applies each request to `engine`.
pub fn spawn_control_listener(
    engine: Arc<Engine>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let engine = Arc::clone(&engine);
                    tokio::spawn(async move {
                        let (read, mut write) = stream.into_split();
                        let mut lines = BufReader::new(read).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            let reply = match parse_line(&line) {
                                Some((verb, id)) => apply(&engine, verb, id),
                                None => format!("error: malformed request '{}'", line.trim()),
                            };
                            if write.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Send one command to the running download. A refusal becomes an error.
pub async fn send_command(socket_path: &Path, verb: ControlVerb, id: TaskId) -> Result<()> {
    if !socket_path.exists() {
        bail!("no running `lvd download` (control socket {} not found)", socket_path.display());
    }
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect {}", socket_path.display()))?;
    let (read, mut write) = stream.into_split();
    write
        .write_all(format!("{} {}\n", verb.as_str(), id).as_bytes())
        .await?;
    let reply = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .context("control socket closed without a reply")?;
    match reply.strip_prefix("error: ") {
        Some(reason) => bail!("{reason}"),
        None => Ok(()),
    }
}
