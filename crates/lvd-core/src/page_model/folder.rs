//! Folder pages (`mod/folder/view.php`): the files a folder activity holds.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html};

use super::{absolutize, clean_text, collapse_ws, select_all, select_first};

const MAX_NAME_CHARS: usize = 250;
const NAV_WORDS: &[&str] = &["download", "view", "open", "link", "here", "click"];

fn file_param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]file=([^&]+)").expect("compile file param regex"))
}

fn loose_file_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)forcedownload|pluginfile|mod/resource|\.(pdf|docx?|pptx?|xlsx?|zip|py|r|c|cpp)(\?|$)")
            .expect("compile file link regex")
    })
}

/// One downloadable file inside a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderFile {
    pub name: String,
    pub url: String,
}

fn is_tree_file_link(href: &str) -> bool {
    ["forcedownload=1", "pluginfile.php", "mod/resource"]
        .iter()
        .any(|m| href.contains(m))
}

/// Last path segment with a dot, or the `file=` query parameter.
fn name_from_url(href: &str) -> Option<String> {
    if let Some(c) = file_param_re().captures(href) {
        return c.get(1).map(|m| m.as_str().to_string());
    }
    let path = href.split(['?', '#']).next().unwrap_or("");
    let last = path.rsplit('/').next().unwrap_or("");
    last.contains('.').then(|| last.to_string())
}

fn file_name(link: ElementRef<'_>, href: &str) -> Option<String> {
    let shown = select_first(link, "span.fp-filename")
        .map(clean_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| clean_text(link));
    let name = if shown.is_empty() || shown.chars().count() > 200 {
        name_from_url(href)?
    } else {
        shown
    };
    let name = collapse_ws(&name);
    let nav = NAV_WORDS.iter().any(|w| name.eq_ignore_ascii_case(w));
    (!name.is_empty() && !nav && name.chars().count() < MAX_NAME_CHARS).then_some(name)
}

fn collect<'a>(
    links: impl IntoIterator<Item = ElementRef<'a>>,
    platform_base: &str,
    accept: impl Fn(&str) -> bool,
) -> Vec<FolderFile> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for link in links {
        let href = link.value().attr("href").unwrap_or("");
        if !accept(href) {
            continue;
        }
        let url = absolutize(platform_base, href);
        if !seen.insert(url.clone()) {
            continue;
        }
        if let Some(name) = file_name(link, href) {
            files.push(FolderFile { name, url });
        }
    }
    files
}

/// Files listed on a folder page. The file-manager tree is preferred; when it
/// is absent or empty, any download-looking link on the page is taken.
pub fn parse_folder_page(body: &str, platform_base: &str) -> Vec<FolderFile> {
    let doc = Html::parse_document(body);
    let root = doc.root_element();

    if let Some(tree) = select_first(root, r#"div.filemanager, div.foldertree, div[id*="folder_tree"]"#) {
        let files = collect(select_all(tree, "a[href]"), platform_base, is_tree_file_link);
        if !files.is_empty() {
            return files;
        }
    }
    collect(select_all(root, "a[href]"), platform_base, |href| {
        loose_file_link_re().is_match(href)
    })
}
