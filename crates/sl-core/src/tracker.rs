//! Per-tick usage accounting
//!
//! Usage is sampled: whichever tab is active when the tick fires is charged a
//! full tick, and nothing else is. A site left a second before the tick is not
//! charged for that minute.

use log::debug;

use crate::enforcer::{enforce, Enforcement};
use crate::host::TabHost;
use crate::matcher::match_rule;
use crate::store::{RuleStore, StoreResult, UsageStore};
use crate::types::{EngineConfig, TabId};
use crate::url::tab_hostname;

/// Why a tick charged nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSkip {
    /// No focused window or no active tab
    NoActiveTab,
    /// The tab has no URL or shows a browser-internal page
    NotWebPage,
    /// The tab's host is not governed by any rule
    Untracked,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    Skipped(TickSkip),
    Charged {
        tab_id: TabId,
        rule_key: String,
        total_seconds: u64,
        enforcement: Enforcement,
    },
}

/// Charge the active tab's rule one tick and enforce its limit.
pub fn track_tick<S, H>(store: &S, host: &H, config: &EngineConfig) -> StoreResult<TickReport>
where
    S: RuleStore + UsageStore + ?Sized,
    H: TabHost + ?Sized,
{
    let Some(tab) = host.active_tab() else {
        return Ok(TickReport::Skipped(TickSkip::NoActiveTab));
    };

    let Some(host_name) = tab.url.as_deref().and_then(tab_hostname) else {
        return Ok(TickReport::Skipped(TickSkip::NotWebPage));
    };

    let rules = store.rules()?;
    let Some(rule_key) = match_rule(&host_name, &rules) else {
        return Ok(TickReport::Skipped(TickSkip::Untracked));
    };
    let rule_key = rule_key.to_string();

    let total_seconds = store.add_seconds(&rule_key, config.tick_seconds)?;
    debug!("Time spent under {rule_key}: {total_seconds}s (host {host_name})");

    let enforcement = enforce(store, host, config, tab.id, &rule_key)?;

    Ok(TickReport::Charged {
        tab_id: tab.id,
        rule_key,
        total_seconds,
        enforcement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SnapshotHost;
    use crate::store::MemoryStore;
    use crate::types::{BlockRule, TabSnapshot};

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.upsert_rule("bilibili.com", BlockRule::new(5)).unwrap();
        store
    }

    #[test]
    fn test_no_active_tab() {
        let store = store();
        let host = SnapshotHost::new(None);
        let report = track_tick(&store, &host, &EngineConfig::default()).unwrap();
        assert_eq!(report, TickReport::Skipped(TickSkip::NoActiveTab));
    }

    #[test]
    fn test_tab_without_url() {
        let store = store();
        let host = SnapshotHost::new(Some(TabSnapshot { id: 1, url: None }));
        let report = track_tick(&store, &host, &EngineConfig::default()).unwrap();
        assert_eq!(report, TickReport::Skipped(TickSkip::NotWebPage));
    }

    #[test]
    fn test_internal_page() {
        let store = store();
        let host = SnapshotHost::with_active(1, "chrome://extensions/");
        let report = track_tick(&store, &host, &EngineConfig::default()).unwrap();
        assert_eq!(report, TickReport::Skipped(TickSkip::NotWebPage));
        assert!(store.usage().unwrap().is_empty());
    }

    #[test]
    fn test_untracked_site() {
        let store = store();
        let host = SnapshotHost::with_active(1, "https://example.com/");
        let report = track_tick(&store, &host, &EngineConfig::default()).unwrap();
        assert_eq!(report, TickReport::Skipped(TickSkip::Untracked));
        assert!(store.usage().unwrap().is_empty());
    }

    #[test]
    fn test_subdomain_charged_to_parent_rule() {
        let store = store();
        let host = SnapshotHost::with_active(4, "https://live.bilibili.com/123");
        let report = track_tick(&store, &host, &EngineConfig::default()).unwrap();

        match report {
            TickReport::Charged {
                tab_id,
                rule_key,
                total_seconds,
                enforcement,
            } => {
                assert_eq!(tab_id, 4);
                assert_eq!(rule_key, "bilibili.com");
                assert_eq!(total_seconds, 60);
                assert!(matches!(enforcement, Enforcement::Allowed { .. }));
            }
            other => panic!("unexpected report: {other:?}"),
        }

        let usage = store.usage().unwrap();
        assert_eq!(usage.get("bilibili.com"), Some(&60));
        assert!(!usage.contains_key("live.bilibili.com"));
    }

    #[test]
    fn test_custom_tick_length() {
        let store = store();
        let host = SnapshotHost::with_active(1, "https://bilibili.com/");
        let config = EngineConfig {
            tick_seconds: 30,
            ..EngineConfig::default()
        };
        track_tick(&store, &host, &config).unwrap();
        assert_eq!(store.seconds("bilibili.com").unwrap(), 30);
    }
}
