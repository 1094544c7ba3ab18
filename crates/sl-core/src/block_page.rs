//! Block page address and message
//!
//! The enforcer sends an over-limit tab to
//! `<block page>?site=<rule key>&time=<seconds>&limit=<minutes>`; the block
//! page reads the same three parameters back to explain why it is shown.

use crate::url::{build_query, query_param};

/// What the block page is told about a blocked site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPage {
    /// Rule key that was exceeded
    pub site: String,
    /// Accumulated seconds at block time
    pub seconds: u64,
    /// Configured daily limit in minutes
    pub limit_minutes: u32,
}

impl BlockPage {
    pub fn new(site: impl Into<String>, seconds: u64, limit_minutes: u32) -> Self {
        Self {
            site: site.into(),
            seconds,
            limit_minutes,
        }
    }

    /// Full address of the block page for this site.
    pub fn to_url(&self, base: &str) -> String {
        let seconds = self.seconds.to_string();
        let limit = self.limit_minutes.to_string();
        let query = build_query([
            ("site", self.site.as_str()),
            ("time", seconds.as_str()),
            ("limit", limit.as_str()),
        ]);
        format!("{base}?{query}")
    }
}

/// Parameters as read back by the block page. Any of them may be missing or
/// malformed when the page is opened by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockPageQuery {
    pub site: Option<String>,
    pub seconds: Option<i64>,
    pub limit_minutes: Option<i64>,
}

impl BlockPageQuery {
    /// Read the parameters from a query string or full URL.
    pub fn parse(query: &str) -> Self {
        Self {
            site: query_param(query, "site").filter(|site| !site.is_empty()),
            seconds: query_param(query, "time").as_deref().and_then(parse_int_prefix),
            limit_minutes: query_param(query, "limit").as_deref().and_then(parse_int_prefix),
        }
    }
}

/// Leading-integer parse: `"600"` and `"600s"` are 600, `"abc"` is nothing.
pub(crate) fn parse_int_prefix(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    let parsed: i64 = digits[..end].parse().ok()?;
    Some(if negative { -parsed } else { parsed })
}

/// Whole minutes for display, rounding halves up.
fn rounded_minutes(seconds: i64) -> i64 {
    (seconds as f64 / 60.0 + 0.5).floor() as i64
}

/// Text shown on the block page for the given query.
pub fn block_message(query: &str) -> String {
    let query = BlockPageQuery::parse(query);

    let Some(site) = query.site else {
        return "Unable to read the block details.".to_string();
    };

    if query.limit_minutes == Some(0) {
        return format!("\"{site}\" has no daily allowance. It stays blocked today.");
    }

    match query.seconds {
        Some(seconds) => format!(
            "You have already spent {} minutes on \"{}\" today.",
            rounded_minutes(seconds),
            site
        ),
        None => format!("\"{site}\" is blocked. The time spent is unavailable."),
    }
}
