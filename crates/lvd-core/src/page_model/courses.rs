//! Course listing and course detail pages.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html};

use super::{absolutize, clean_text, collapse_ws, select_all, select_first, visible_text};
use crate::error::DiscoveryError;
use crate::model::{lecture_fingerprint, Course, Lecture, LectureStatus, Material, MaterialKind, Term};

const VIDEO_MARKER: &str = "mod/vod";

fn course_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]id=(\d+)").expect("compile course id regex"))
}

fn bracket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]*\]").expect("compile bracket regex"))
}

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "(CSI2103-01)", "(2024-2)" and similar course codes.
    RE.get_or_init(|| Regex::new(r"\([^)]*\d{2,}[^)]*\)").expect("compile code regex"))
}

fn section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^section-(\d+)$").expect("compile section regex"))
}

fn completion_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"completion-[a-z]+-y\b").expect("compile completion regex"))
}

fn professor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:교수|professor|instructor|강사)\s*[:：]\s*([^,\n|]+)")
            .expect("compile professor regex")
    })
}

fn onclick_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"id=(\d+)").expect("compile onclick id regex"))
}

fn extract_course_id(href: &str) -> Option<String> {
    course_id_re()
        .captures(href)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Strip embedded course codes and `[semester]` tags from a course name.
fn clean_course_name(raw: &str) -> String {
    let s = bracket_re().replace_all(raw, " ");
    let s = code_re().replace_all(&s, " ");
    collapse_ws(&s)
}

fn professor_in(root: ElementRef<'_>) -> String {
    select_first(root, ".prof, .professor, .teacher")
        .map(clean_text)
        .unwrap_or_default()
}

/// Parse the course listing for `term`. Recognizes the table layout
/// (`tbody.my-course-lists tr`) and the card layout (`.course-box`).
/// Courses without a numeric id are skipped; duplicates keep the first entry.
pub fn parse_course_list(body: &str, platform_base: &str, term: &Term) -> Vec<Course> {
    let doc = Html::parse_document(body);
    let root = doc.root_element();
    let mut courses = Vec::new();

    let rows = select_all(root, "tbody.my-course-lists tr");
    if !rows.is_empty() {
        for row in rows {
            let cols = select_all(row, "td");
            if cols.len() < 3 {
                continue;
            }
            let Some(link) = select_first(cols[2], r#"a[href*="id="]"#) else {
                continue;
            };
            let href = link.value().attr("href").unwrap_or("");
            let Some(id) = extract_course_id(href) else {
                continue;
            };
            let professor = match cols.get(3) {
                Some(col) => clean_text(*col),
                None => professor_in(row),
            };
            courses.push(Course {
                id,
                name: clean_course_name(&clean_text(link)),
                professor,
                year: clean_text(cols[0]),
                semester: clean_text(cols[1]),
                url: absolutize(platform_base, href),
                lectures: Vec::new(),
                materials: Vec::new(),
            });
        }
    } else {
        for card in select_all(root, ".course-box") {
            let Some(link) = select_first(card, "a.course-title") else {
                continue;
            };
            let href = link.value().attr("href").unwrap_or("");
            let Some(id) = extract_course_id(href) else {
                continue;
            };
            let name = select_first(link, "h3, h4")
                .map(clean_text)
                .unwrap_or_else(|| clean_text(link));
            let semester = select_first(card, ".semester")
                .map(clean_text)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| term.semester.code().to_string());
            courses.push(Course {
                id,
                name: clean_course_name(&name),
                professor: professor_in(card),
                year: term.year.to_string(),
                semester,
                url: absolutize(platform_base, href),
                lectures: Vec::new(),
                materials: Vec::new(),
            });
        }
    }

    let mut seen = HashSet::new();
    courses.retain(|c| seen.insert(c.id.clone()));
    courses
}

/// Everything extracted from one course detail page.
#[derive(Debug, Clone, Default)]
pub struct CoursePage {
    pub lectures: Vec<Lecture>,
    pub materials: Vec<Material>,
    pub professor: Option<String>,
}

struct Week {
    name: String,
    ordinal: Option<u32>,
}

/// Week label from the nearest enclosing `section-N` container.
fn week_of(doc: &Html, activity: ElementRef<'_>) -> Week {
    let section = activity.ancestors().filter_map(ElementRef::wrap).find_map(|el| {
        let id = el.value().id()?;
        let n = section_re().captures(id)?.get(1)?.as_str().parse::<u32>().ok()?;
        Some((el, n))
    });
    let Some((section, n)) = section else {
        return Week {
            name: "General".to_string(),
            ordinal: None,
        };
    };

    let name = select_first(section, ".sectionname")
        .map(clean_text)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            select_first(doc.root_element(), &format!("#sectionname-{n}"))
                .map(clean_text)
                .filter(|s| !s.is_empty())
        })
        .or_else(|| {
            section
                .value()
                .attr("aria-label")
                .map(collapse_ws)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| format!("Week {n}"));
    Week {
        name,
        ordinal: Some(n),
    }
}

/// Completion marker in the actions region next to the activity.
fn is_done(activity: ElementRef<'_>) -> bool {
    let container = activity
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().classes().any(|c| c == "activity"))
        .or_else(|| activity.parent().and_then(ElementRef::wrap))
        .unwrap_or(activity);
    select_all(container, "img, span, button").into_iter().any(|el| {
        let v = el.value();
        ["src", "class", "data-state"]
            .iter()
            .filter_map(|a| v.attr(a))
            .any(|val| completion_re().is_match(val))
    })
}

/// Viewer URL for a `mod/vod` activity link.
fn viewer_url(platform_base: &str, href: &str, onclick: &str) -> Option<String> {
    if onclick.contains("viewer.php") {
        let id = onclick_id_re().captures(onclick)?.get(1)?.as_str().to_string();
        return Some(format!("{platform_base}/mod/vod/viewer.php?id={id}"));
    }
    if href.contains("viewer.php") {
        return Some(absolutize(platform_base, href));
    }
    if href.contains("view.php") {
        return Some(absolutize(platform_base, &href.replacen("view.php", "viewer.php", 1)));
    }
    None
}

fn material_kind(href: &str) -> Option<MaterialKind> {
    if href.contains("mod/resource") {
        Some(MaterialKind::File)
    } else if href.contains("mod/folder") {
        Some(MaterialKind::Folder)
    } else if href.contains("mod/assign") {
        Some(MaterialKind::Assignment)
    } else if href.contains("mod/quiz") {
        Some(MaterialKind::Quiz)
    } else {
        None
    }
}

fn title_of(activity: ElementRef<'_>, link: ElementRef<'_>) -> String {
    let raw = select_first(activity, "span.instancename")
        .map(visible_text)
        .unwrap_or_else(|| clean_text(link));
    // The platform appends a "동영상" (video) type suffix to VOD titles.
    let title = raw.trim_end_matches("동영상").trim().to_string();
    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title
    }
}

fn professor_on_page(doc: &Html) -> Option<String> {
    let root = doc.root_element();
    for css in [".course-info", ".teacher-info"] {
        if let Some(el) = select_first(root, css) {
            let text = clean_text(el);
            if let Some((_, name)) = text.split_once(':') {
                let name = name.trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }
    let text: String = root.text().collect::<Vec<_>>().join("\n");
    professor_re()
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| collapse_ws(m.as_str()))
        .filter(|s| !s.is_empty())
}

/// Course pages carry week sections or activity blocks even when empty.
/// Anything else (maintenance notices, error pages) is not a course page.
fn looks_like_course_page(doc: &Html) -> bool {
    select_first(
        doc.root_element(),
        r#"[id^="section-"], .course-content, div.activityinstance"#,
    )
    .is_some()
}

/// Parse lectures (video activities) and materials from a course page.
/// Lecture ordinals count matching activities in document order, from 1.
pub fn parse_course_page(
    body: &str,
    course_id: &str,
    platform_base: &str,
) -> Result<CoursePage, DiscoveryError> {
    let doc = Html::parse_document(body);
    if !looks_like_course_page(&doc) {
        return Err(DiscoveryError::PageParseFailure(format!(
            "course {course_id}: no course content on page"
        )));
    }
    let mut page = CoursePage {
        professor: professor_on_page(&doc),
        ..CoursePage::default()
    };
    let mut ordinal = 0u32;

    for activity in select_all(doc.root_element(), "div.activityinstance") {
        let Some(link) = select_first(activity, "a[href]") else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or("");
        let onclick = link.value().attr("onclick").unwrap_or("");

        if href.contains(VIDEO_MARKER) || onclick.contains(VIDEO_MARKER) {
            let Some(viewer) = viewer_url(platform_base, href, onclick) else {
                tracing::debug!(course_id, href, "vod activity without viewer link");
                continue;
            };
            ordinal += 1;
            let week = week_of(&doc, activity);
            page.lectures.push(Lecture {
                id: format!("{course_id}_{ordinal}"),
                title: title_of(activity, link),
                week: week.name,
                week_ordinal: week.ordinal,
                status: if is_done(activity) {
                    LectureStatus::Done
                } else {
                    LectureStatus::New
                },
                fingerprint: lecture_fingerprint(course_id, &viewer),
                viewer_url: viewer,
                course_id: course_id.to_string(),
            });
        } else if let Some(kind) = material_kind(href) {
            page.materials.push(Material {
                title: title_of(activity, link),
                kind,
                url: absolutize(platform_base, href),
                week: week_of(&doc, activity).name,
            });
        }
    }
    Ok(page)
}
