//! `lvd clear-cache [--scope]`.

use anyhow::Result;
use lvd_core::Engine;

pub async fn run_clear_cache(engine: &Engine, scope: Option<&str>) -> Result<()> {
    let removed = engine.clear_cache(scope).await?;
    match scope {
        Some(s) => println!("Removed {removed} cache entr(ies) for {s}"),
        None => println!("Removed {removed} cache entr(ies)"),
    }
    Ok(())
}
