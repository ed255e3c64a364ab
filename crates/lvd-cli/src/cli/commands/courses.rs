//! `lvd courses` – courses and lectures of a term.

use anyhow::Result;
use lvd_core::model::{LectureStatus, Term};
use lvd_core::Engine;

pub async fn run_courses(engine: &Engine, term: Term, refresh: bool) -> Result<()> {
    let snapshot = engine.discover_courses(term, refresh).await?;
    if snapshot.courses.is_empty() {
        println!("No courses for {term}.");
        return Ok(());
    }
    for course in &snapshot.courses {
        let prof = if course.professor.is_empty() {
            String::new()
        } else {
            format!(" ({})", course.professor)
        };
        println!("[{}] {}{}", course.id, course.name, prof);
        for l in &course.lectures {
            let mark = match l.status {
                LectureStatus::Done => "x",
                LectureStatus::New => " ",
            };
            println!(
                "  [{}] {:<8} {}  {} / {}",
                mark, l.id, l.fingerprint, l.week, l.title
            );
        }
        if !course.materials.is_empty() {
            println!("  + {} other item(s)", course.materials.len());
        }
    }
    if snapshot.failed_courses > 0 {
        println!(
            "warning: {} course page(s) could not be read; try --refresh later",
            snapshot.failed_courses
        );
    }
    println!(
        "{} lecture(s), discovered {}",
        snapshot.lectures.len(),
        snapshot.discovered_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}
