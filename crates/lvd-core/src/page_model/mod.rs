//! Page model: raw platform markup in, typed entities out.
//!
//! All scraping lives here as pure functions over `scraper::Html`, so the
//! authenticator, discovery and resolver never touch selectors directly and
//! the fragile parts can be tested against fixture markup. `Html` is not
//! `Send`; parse results are returned as owned values and no document is held
//! across an await.

mod courses;
mod folder;
mod sso;
mod viewer;

pub use courses::{parse_course_list, parse_course_page, CoursePage};
pub use folder::{parse_folder_page, FolderFile};
pub use sso::{has_logout_link, is_login_page, parse_input_tags, parse_sso_challenge, SsoChallenge};
pub use viewer::parse_viewer;

use scraper::{ElementRef, Node, Selector};

fn select_all<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => root.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

fn select_first<'a>(root: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(css).ok()?;
    root.select(&sel).next()
}

/// Text content with whitespace collapsed to single spaces.
fn clean_text(el: ElementRef<'_>) -> String {
    collapse_ws(&el.text().collect::<String>())
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text content skipping any `.accesshide` (screen-reader only) subtree.
fn visible_text(el: ElementRef<'_>) -> String {
    fn walk(el: ElementRef<'_>, out: &mut String) {
        for child in el.children() {
            match child.value() {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => {
                    if e.classes().any(|c| c == "accesshide") {
                        continue;
                    }
                    if let Some(child_el) = ElementRef::wrap(child) {
                        walk(child_el, out);
                    }
                }
                _ => {}
            }
        }
    }
    let mut out = String::new();
    walk(el, &mut out);
    collapse_ws(&out)
}

/// Resolve `href` against the platform origin. Absolute URLs pass through.
fn absolutize(platform_base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else if href.starts_with('/') {
        format!("{}{}", platform_base, href)
    } else {
        format!("{}/{}", platform_base, href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn visible_text_skips_accesshide() {
        let doc = Html::parse_fragment(
            r#"<span class="instancename">Week 1 intro<span class="accesshide"> VOD</span></span>"#,
        );
        let span = select_first(doc.root_element(), "span.instancename").unwrap();
        assert_eq!(visible_text(span), "Week 1 intro");
    }

    #[test]
    fn absolutize_variants() {
        let base = "https://ys.learnus.org";
        assert_eq!(absolutize(base, "/course/view.php?id=1"), "https://ys.learnus.org/course/view.php?id=1");
        assert_eq!(absolutize(base, "course/view.php?id=1"), "https://ys.learnus.org/course/view.php?id=1");
        assert_eq!(absolutize(base, "//cdn.example/x"), "https://cdn.example/x");
        assert_eq!(absolutize(base, "http://other/x"), "http://other/x");
    }
}
