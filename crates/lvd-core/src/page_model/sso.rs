//! SSO handshake pages: hidden form inputs, challenge script, login markers.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;

use super::{select_all, select_first};

/// Challenge and RSA public key embedded in the SSO exchange response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoChallenge {
    pub challenge: String,
    pub modulus: String,
    pub exponent: String,
}

fn challenge_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"var\s+ssoChallenge\s*=\s*['"]([^'"]+)['"]"#).expect("valid regex")
    })
}

fn public_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)rsa\.setPublic\(\s*['"]([^'"]+)['"]\s*,\s*['"]([^'"]+)['"]"#)
            .expect("valid regex")
    })
}

/// All named `<input>` values on the page.
pub fn parse_input_tags(body: &str) -> HashMap<String, String> {
    let doc = Html::parse_document(body);
    select_all(doc.root_element(), "input[name]")
        .into_iter()
        .filter_map(|input| {
            let el = input.value();
            let name = el.attr("name")?;
            Some((name.to_string(), el.attr("value").unwrap_or("").to_string()))
        })
        .collect()
}

/// Extract `ssoChallenge` and `rsa.setPublic(modulus, exponent)`.
pub fn parse_sso_challenge(body: &str) -> Option<SsoChallenge> {
    let challenge = challenge_re().captures(body)?.get(1)?.as_str().to_string();
    let key = public_key_re().captures(body)?;
    Some(SsoChallenge {
        challenge,
        modulus: key.get(1)?.as_str().to_string(),
        exponent: key.get(2)?.as_str().to_string(),
    })
}

/// True when the page carries a logout-capable link (logged-in marker).
pub fn has_logout_link(body: &str) -> bool {
    let doc = Html::parse_document(body);
    select_first(doc.root_element(), r#"a[href*="logout"]"#).is_some()
}

/// True when the platform answered with its login form instead of content.
pub fn is_login_page(final_url: &str, body: &str) -> bool {
    let path = url::Url::parse(final_url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    if path.contains("login") {
        return true;
    }
    let doc = Html::parse_document(body);
    select_first(doc.root_element(), r#"input[type="password"]"#).is_some()
}
