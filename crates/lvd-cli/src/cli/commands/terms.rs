//! `lvd terms` – recent terms with courses.

use anyhow::Result;
use lvd_core::Engine;

pub async fn run_terms(engine: &Engine, years: u32) -> Result<()> {
    let terms = engine.available_terms(years).await?;
    if terms.is_empty() {
        println!("No courses found in the last {years} year(s).");
        return Ok(());
    }
    println!("{:<10} {}", "TERM", "COURSES");
    for (term, count) in terms {
        println!("{:<10} {}", term.to_string(), count);
    }
    Ok(())
}
