//! Rule Matching
//!
//! A hostname is governed by the rule whose key is the hostname itself or one
//! of its parent domains. When several keys qualify (`bilibili.com` and
//! `live.bilibili.com` for `live.bilibili.com`) the most specific one wins,
//! independent of the rule map's iteration order.

use crate::types::{BlockRule, RuleSet};

// =============================================================================
// Suffix Walking
// =============================================================================

/// Get the parent domain (strip leftmost label).
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Iterator over a host and each of its parent domains, most specific first.
///
/// `a.b.example.com` yields `a.b.example.com`, `b.example.com`,
/// `example.com`, `com`.
pub struct HostSuffixIter<'a> {
    current: Option<&'a str>,
}

impl<'a> HostSuffixIter<'a> {
    pub fn new(host: &'a str) -> Self {
        Self {
            current: (!host.is_empty()).then_some(host),
        }
    }
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        self.current = get_parent_domain(result);
        Some(result)
    }
}

/// Walk host suffixes from most specific to least specific.
pub fn walk_host_suffixes(host: &str) -> HostSuffixIter<'_> {
    HostSuffixIter::new(host)
}

// =============================================================================
// Matching
// =============================================================================

/// Find the rule key governing a normalized hostname.
///
/// Returns the key itself on an exact match, otherwise the longest key that
/// `host` is a subdomain of, otherwise `None`.
pub fn match_rule<'r>(host: &str, rules: &'r RuleSet) -> Option<&'r str> {
    walk_host_suffixes(host).find_map(|suffix| {
        rules
            .get_key_value(suffix)
            .map(|(key, _)| key.as_str())
    })
}

/// Rule lookups against a borrowed rule set.
pub struct RuleMatcher<'a> {
    rules: &'a RuleSet,
}

impl<'a> RuleMatcher<'a> {
    /// Create a new matcher over the given rules.
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// The governing rule key for `host`.
    pub fn match_host(&self, host: &str) -> Option<&'a str> {
        match_rule(host, self.rules)
    }

    /// The governing rule key and its rule.
    pub fn match_with_rule(&self, host: &str) -> Option<(&'a str, &'a BlockRule)> {
        walk_host_suffixes(host).find_map(|suffix| {
            self.rules
                .get_key_value(suffix)
                .map(|(key, rule)| (key.as_str(), rule))
        })
    }

    /// Whether any rule governs `host`.
    pub fn is_tracked(&self, host: &str) -> bool {
        self.match_host(host).is_some()
    }
}
