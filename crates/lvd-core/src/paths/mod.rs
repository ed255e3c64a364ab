//! Destination paths for downloaded lectures and course materials.

mod sanitize;

pub use sanitize::sanitize;

use std::path::{Path, PathBuf};

use crate::model::{Course, Lecture};

const DEFAULT_EXTENSION: &str = "mp4";

/// File extension from the media URL path, lowercased; `mp4` when absent.
pub fn extension_from_url(url: &str) -> String {
    let ext = url::Url::parse(url).ok().and_then(|u| {
        let last = u.path_segments()?.filter(|s| !s.is_empty()).last()?.to_string();
        let (_, ext) = last.rsplit_once('.')?;
        let ok = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
        ok.then(|| ext.to_ascii_lowercase())
    });
    ext.unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// `{year}-{semester}-{course}/{week}_{title}.{ext}`, every part sanitized.
pub fn relative_destination(course: &Course, lecture: &Lecture, ext: &str) -> PathBuf {
    let file = format!("{}_{}", sanitize(&lecture.week), sanitize(&lecture.title));
    course_dir(course).join(format!("{}.{}", file, ext))
}

pub fn destination_path(root: &Path, course: &Course, lecture: &Lecture, media_url: &str) -> PathBuf {
    root.join(relative_destination(course, lecture, &extension_from_url(media_url)))
}

fn course_dir(course: &Course) -> PathBuf {
    PathBuf::from(sanitize(&format!("{}-{}-{}", course.year, course.semester, course.name)))
}

/// `{year}-{semester}-{course}/{week}_{name}` for a single file, or
/// `{year}-{semester}-{course}/{week}_{folder}/{name}` for a file inside a
/// folder activity. The name keeps whatever extension it carries.
pub fn material_destination(
    root: &Path,
    course: &Course,
    week: &str,
    folder: Option<&str>,
    name: &str,
) -> PathBuf {
    let dir = root.join(course_dir(course));
    match folder {
        Some(folder) => dir
            .join(format!("{}_{}", sanitize(week), sanitize(folder)))
            .join(sanitize(name)),
        None => dir.join(format!("{}_{}", sanitize(week), sanitize(name))),
    }
}
