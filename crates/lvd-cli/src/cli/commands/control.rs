//! `lvd pause|resume|stop <id>` – steer a task inside a running `lvd download`.

use anyhow::Result;
use lvd_core::config;
use lvd_core::orchestrator::TaskId;

use crate::cli::control_socket::{self, ControlVerb};

pub async fn run_control(verb: ControlVerb, id: TaskId) -> Result<()> {
    let path = config::control_socket_path()?;
    control_socket::send_command(&path, verb, id).await?;
    let done = match verb {
        ControlVerb::Pause => "Pause requested for",
        ControlVerb::Resume => "Resumed",
        ControlVerb::Stop => "Stop requested for",
    };
    println!("{done} task {id}");
    Ok(())
}
