//! `lvd materials` – file and folder materials of one course.

use anyhow::Result;
use lvd_core::model::Term;
use lvd_core::Engine;

pub async fn run_materials(engine: &Engine, course_id: &str, term: Term) -> Result<()> {
    let report = engine.download_materials(course_id, term).await?;
    for path in &report.saved {
        println!("saved {}", path.display());
    }
    println!(
        "{} saved, {} already present, {} failed, {} assignment/quiz item(s) skipped",
        report.saved.len(),
        report.existing,
        report.failed,
        report.skipped
    );
    if report.failed > 0 {
        anyhow::bail!("{} material file(s) failed", report.failed);
    }
    Ok(())
}
