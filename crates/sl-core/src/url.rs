//! Hostname normalization and URL helpers
//!
//! Scheme checks scan the string directly; host parsing follows the URL
//! standard through the `url` crate.

use std::borrow::Cow;

use ::url::{form_urlencoded, Url};

use crate::types::SchemeMask;

/// Scheme assumed for user input typed without one.
const DEFAULT_SCHEME: &str = "http://";

/// Label stripped from the front of every hostname.
const WWW_PREFIX: &str = "www.";

// =============================================================================
// Scheme Extraction
// =============================================================================

/// Internal page schemes that never count as browsing time.
const INTERNAL_SCHEMES: &[&str] = &[
    "chrome:",
    "about:",
    "chrome-extension:",
    "moz-extension:",
    "edge:",
    "brave:",
    "view-source:",
    "devtools:",
];

/// Fast scheme extraction without URL parsing.
/// Returns the scheme mask or None if unknown.
#[inline]
pub fn extract_scheme(url: &str) -> Option<SchemeMask> {
    let bytes = url.as_bytes();
    if bytes.len() < 5 {
        return None;
    }

    // Lowercase first char
    let c0 = bytes[0] | 0x20;

    match c0 {
        b'h' => {
            if bytes.len() >= 8 && bytes[..8].eq_ignore_ascii_case(b"https://") {
                Some(SchemeMask::HTTPS)
            } else if bytes.len() >= 7 && bytes[..7].eq_ignore_ascii_case(b"http://") {
                Some(SchemeMask::HTTP)
            } else {
                None
            }
        }
        b'w' => {
            if bytes.len() >= 6 && bytes[..6].eq_ignore_ascii_case(b"wss://") {
                Some(SchemeMask::WSS)
            } else if bytes[..5].eq_ignore_ascii_case(b"ws://") {
                Some(SchemeMask::WS)
            } else {
                None
            }
        }
        b'f' => {
            if bytes.len() >= 6 && bytes[..6].eq_ignore_ascii_case(b"ftp://") {
                Some(SchemeMask::FTP)
            } else if bytes.len() >= 7 && bytes[..7].eq_ignore_ascii_case(b"file://") {
                Some(SchemeMask::FILE)
            } else {
                None
            }
        }
        _ => INTERNAL_SCHEMES
            .iter()
            .any(|scheme| {
                bytes.len() >= scheme.len() && bytes[..scheme.len()].eq_ignore_ascii_case(scheme.as_bytes())
            })
            .then_some(SchemeMask::INTERNAL),
    }
}

/// Check whether the string starts with `http://` or `https://`.
#[inline]
pub fn has_web_scheme(url: &str) -> bool {
    extract_scheme(url).is_some_and(|scheme| SchemeMask::WEB.contains(scheme))
}

// =============================================================================
// Host Validation
// =============================================================================

/// Check that every label of an ASCII host is non-empty and made of hostname
/// characters. IDN hosts arrive here already in punycode.
fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && label
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
}

/// Strip exactly one leading `www.` label.
#[inline]
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix(WWW_PREFIX).unwrap_or(host)
}

// =============================================================================
// Normalization
// =============================================================================

/// Reduce a URL or bare domain to its canonical hostname.
///
/// Input without `http://` or `https://` is treated as `http://<input>`, so
/// `"example.com"` and `"https://www.example.com/watch?v=1"` both normalize to
/// `"example.com"`. The host is parsed the way browsers parse it: lowercased,
/// internationalized names converted to punycode, userinfo and a numeric port
/// dropped. Returns `None` when no valid host can be extracted.
pub fn normalize_hostname(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let candidate: Cow<'_, str> = if has_web_scheme(input) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{DEFAULT_SCHEME}{input}"))
    };

    let parsed = Url::parse(&candidate).ok()?;
    let host = parsed.host_str()?;
    if !is_valid_host(host) {
        return None;
    }

    Some(strip_www(host).to_string())
}

/// Normalize a site typed into the rule form.
///
/// On top of [`normalize_hostname`], the result must contain a dot, which
/// rejects bare names such as `localhost`.
pub fn normalize_site_input(input: &str) -> Option<String> {
    normalize_hostname(input).filter(|host| host.contains('.'))
}

/// Hostname of a tab URL, or `None` for anything that is not a web page.
pub fn tab_hostname(url: &str) -> Option<String> {
    if !has_web_scheme(url.trim()) {
        return None;
    }
    normalize_hostname(url)
}

// =============================================================================
// Query Parameter Handling
// =============================================================================

/// Form-encode `pairs` into a query string (no leading `?`).
pub fn build_query<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Look up the first value of `key` in a query string or full URL.
///
/// Values are decoded once; `+` is a space and malformed escapes are kept.
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let query = match url.find('?') {
        Some(q_pos) => &url[q_pos + 1..],
        None => url,
    };
    let query = match query.find('#') {
        Some(hash_pos) => &query[..hash_pos],
        None => query,
    };

    form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}
