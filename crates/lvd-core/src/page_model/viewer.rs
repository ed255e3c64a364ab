//! Viewer page: locate the media reference behind a lecture.

use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;

use super::select_all;
use crate::resolver::{MediaKind, MediaRef};

fn manifest_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)https?://[^\s"'<>\\]+\.m3u8[^\s"'<>\\]*"#).expect("compile manifest regex")
    })
}

fn file_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)https?://[^\s"'<>\\]+\.mp4[^\s"'<>\\]*"#).expect("compile mp4 regex")
    })
}

fn script_var_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(videoUrl|video_url|streamUrl|src)\s*[:=]\s*["']([^"']+)["']"#)
            .expect("compile script var regex")
    })
}

fn kind_from_url(url: &str) -> Option<MediaKind> {
    let lower = url.to_ascii_lowercase();
    if lower.contains(".m3u8") {
        Some(MediaKind::StreamManifest)
    } else if lower.contains(".mp4") {
        Some(MediaKind::DirectFile)
    } else {
        None
    }
}

/// Make a found URL absolute relative to the viewer page.
fn normalize(viewer_url: &str, raw: &str) -> String {
    let raw = raw.trim().replace("&amp;", "&");
    if let Some(rest) = raw.strip_prefix("//") {
        return format!("https://{rest}");
    }
    match url::Url::parse(viewer_url).and_then(|base| base.join(&raw)) {
        Ok(u) => u.to_string(),
        Err(_) => raw,
    }
}

fn media(viewer_url: &str, raw: &str, kind: MediaKind) -> MediaRef {
    MediaRef {
        url: normalize(viewer_url, raw),
        kind,
    }
}

/// Find the media reference on a viewer page. First match wins:
/// `source[src]`, then `video[src]`, then absolute URLs in the raw markup
/// (manifest before mp4), then player script variables.
pub fn parse_viewer(body: &str, viewer_url: &str) -> Option<MediaRef> {
    let doc = Html::parse_document(body);
    let root = doc.root_element();

    for source in select_all(root, "source[src]") {
        let el = source.value();
        let src = el.attr("src").unwrap_or("");
        let ty = el.attr("type").unwrap_or("").to_ascii_lowercase();
        let kind = if ty.contains("mpegurl") {
            Some(MediaKind::StreamManifest)
        } else if ty.contains("video/mp4") {
            Some(MediaKind::DirectFile)
        } else {
            kind_from_url(src)
        };
        if let Some(kind) = kind {
            return Some(media(viewer_url, src, kind));
        }
    }

    if let Some(src) = select_all(root, "video[src]")
        .into_iter()
        .find_map(|v| v.value().attr("src").filter(|s| !s.trim().is_empty()))
    {
        let kind = kind_from_url(src).unwrap_or(MediaKind::DirectFile);
        return Some(media(viewer_url, src, kind));
    }

    if let Some(m) = manifest_url_re().find(body) {
        return Some(media(viewer_url, m.as_str(), MediaKind::StreamManifest));
    }
    if let Some(m) = file_url_re().find(body) {
        return Some(media(viewer_url, m.as_str(), MediaKind::DirectFile));
    }

    for script in select_all(root, "script") {
        let code: String = script.text().collect();
        for caps in script_var_re().captures_iter(&code) {
            let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let kind = match kind_from_url(value.as_str()) {
                Some(k) => k,
                // A bare `src` must look like media; the named player vars need not.
                None if !name.as_str().eq_ignore_ascii_case("src") => MediaKind::DirectFile,
                None => continue,
            };
            return Some(media(viewer_url, value.as_str(), kind));
        }
    }

    None
}
