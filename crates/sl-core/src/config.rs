//! Rule management behind the popup form

use log::info;
use serde::Serialize;

use crate::block_page::parse_int_prefix;
use crate::error::{ConfigError, Result};
use crate::store::{RuleStore, UsageStore};
use crate::types::BlockRule;
use crate::url::normalize_site_input;

/// One row of the rule list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub site: String,
    pub limit_minutes: u32,
    pub used_minutes: u64,
}

/// Parse a limit typed into the form.
///
/// Only the leading integer counts, so a decimal such as `"1.5"` from a
/// number input is truncated to 1.
pub fn parse_limit(raw_limit: &str) -> std::result::Result<u32, ConfigError> {
    let value = parse_int_prefix(raw_limit)
        .ok_or_else(|| ConfigError::InvalidLimit(raw_limit.to_string()))?;
    if value < 0 {
        return Err(ConfigError::NegativeLimit(value));
    }
    u32::try_from(value).map_err(|_| ConfigError::InvalidLimit(raw_limit.to_string()))
}

/// Validate the form fields without touching storage.
pub fn validate_rule(raw_site: &str, raw_limit: &str) -> std::result::Result<(String, BlockRule), ConfigError> {
    let site = normalize_site_input(raw_site)
        .ok_or_else(|| ConfigError::InvalidSite(raw_site.to_string()))?;
    let limit = parse_limit(raw_limit)?;
    Ok((site, BlockRule::new(limit)))
}

/// Add or update a rule from raw form input. Returns the stored key.
pub fn add_rule<R>(rules: &R, raw_site: &str, raw_limit: &str) -> Result<String>
where
    R: RuleStore + ?Sized,
{
    let (site, rule) = validate_rule(raw_site, raw_limit)?;
    rules.upsert_rule(&site, rule)?;
    info!("Rule saved: {site} ({} min/day)", rule.limit_minutes);
    Ok(site)
}

/// Delete a rule and its usage counter. Returns whether the rule existed.
pub fn remove_rule<R, U>(rules: &R, usage: &U, key: &str) -> Result<bool>
where
    R: RuleStore + ?Sized,
    U: UsageStore + ?Sized,
{
    let existed = rules.remove_rule(key)?;
    usage.remove_usage(key)?;
    info!("Rule removed: {key}");
    Ok(existed)
}

/// All rules with today's usage, sorted by site.
pub fn list_rules<R, U>(rules: &R, usage: &U) -> Result<Vec<RuleSummary>>
where
    R: RuleStore + ?Sized,
    U: UsageStore + ?Sized,
{
    let rules = rules.rules()?;
    let usage = usage.usage()?;

    // RuleSet is ordered by key
    Ok(rules
        .into_iter()
        .map(|(site, rule)| {
            let used_minutes = usage.get(&site).copied().unwrap_or(0) / 60;
            RuleSummary {
                site,
                limit_minutes: rule.limit_minutes,
                used_minutes,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MemoryStore;

    #[test]
    fn test_add_rule_normalizes() {
        let store = MemoryStore::new();
        let key = add_rule(&store, "https://www.YouTube.com/watch?v=1", "30").unwrap();
        assert_eq!(key, "youtube.com");
        assert_eq!(store.rules().unwrap()["youtube.com"].limit_minutes, 30);
    }

    #[test]
    fn test_add_rule_upserts() {
        let store = MemoryStore::new();
        add_rule(&store, "example.com", "10").unwrap();
        add_rule(&store, "www.example.com", "0").unwrap();
        let rules = store.rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules["example.com"].limit_minutes, 0);
    }

    #[test]
    fn test_add_rule_rejects_bad_input() {
        let store = MemoryStore::new();
        assert!(matches!(
            add_rule(&store, "localhost", "10"),
            Err(Error::Config(ConfigError::InvalidSite(_)))
        ));
        assert!(matches!(
            add_rule(&store, "not a site", "10"),
            Err(Error::Config(ConfigError::InvalidSite(_)))
        ));
        assert!(matches!(
            add_rule(&store, "example.com", "-1"),
            Err(Error::Config(ConfigError::NegativeLimit(-1)))
        ));
        assert!(matches!(
            add_rule(&store, "example.com", "ten"),
            Err(Error::Config(ConfigError::InvalidLimit(_)))
        ));
        assert!(store.rules().unwrap().is_empty());
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(" 15 "), Ok(15));
        assert_eq!(parse_limit("0"), Ok(0));
        assert_eq!(parse_limit(""), Err(ConfigError::InvalidLimit(String::new())));
        assert!(matches!(parse_limit("99999999999"), Err(ConfigError::InvalidLimit(_))));
    }

    #[test]
    fn test_parse_limit_truncates_decimals() {
        assert_eq!(parse_limit("1.5"), Ok(1));
        assert_eq!(parse_limit("30 minutes"), Ok(30));
        assert_eq!(parse_limit("-2.5"), Err(ConfigError::NegativeLimit(-2)));
        assert_eq!(parse_limit(".5"), Err(ConfigError::InvalidLimit(".5".to_string())));

        let store = MemoryStore::new();
        add_rule(&store, "example.com", "1.5").unwrap();
        assert_eq!(store.rules().unwrap()["example.com"].limit_minutes, 1);
    }

    #[test]
    fn test_remove_rule_purges_usage() {
        let store = MemoryStore::new();
        add_rule(&store, "example.com", "10").unwrap();
        add_rule(&store, "other.com", "10").unwrap();
        store.add_seconds("example.com", 120).unwrap();
        store.add_seconds("other.com", 60).unwrap();

        assert!(remove_rule(&store, &store, "example.com").unwrap());
        assert!(!store.rules().unwrap().contains_key("example.com"));
        assert!(!store.usage().unwrap().contains_key("example.com"));
        assert_eq!(store.seconds("other.com").unwrap(), 60);

        assert!(!remove_rule(&store, &store, "example.com").unwrap());
    }

    #[test]
    fn test_list_rules_sorted_with_usage() {
        let store = MemoryStore::new();
        add_rule(&store, "zhihu.com", "20").unwrap();
        add_rule(&store, "bilibili.com", "5").unwrap();
        store.add_seconds("bilibili.com", 150).unwrap();

        let list = list_rules(&store, &store).unwrap();
        assert_eq!(
            list,
            vec![
                RuleSummary {
                    site: "bilibili.com".to_string(),
                    limit_minutes: 5,
                    used_minutes: 2,
                },
                RuleSummary {
                    site: "zhihu.com".to_string(),
                    limit_minutes: 20,
                    used_minutes: 0,
                },
            ]
        );
    }
}
