//! `lvd login` – verify credentials.

use anyhow::{Context, Result};
use lvd_core::model::Credentials;
use lvd_core::Engine;

pub async fn run_login(engine: &Engine, creds: &Credentials) -> Result<()> {
    let session = engine.login(creds).await.context("login failed")?;
    println!(
        "Logged in as {} (verified {})",
        session.user_id,
        session.verified_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}
