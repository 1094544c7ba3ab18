//! End-to-end behaviour through the dispatcher

use sl_core::config::{add_rule, remove_rule};
use sl_core::host::SnapshotHost;
use sl_core::{
    BlockPage, BlockRule, Dispatcher, EngineConfig, MemoryStore, Outcome, RuleStore, Trigger,
    UsageStore,
};

const BLOCK_PAGE: &str = "chrome-extension://abc/block_page.html";

fn config() -> EngineConfig {
    EngineConfig::with_block_page(BLOCK_PAGE)
}

#[test]
fn test_limit_reached_on_tenth_tick() {
    let store = MemoryStore::new();
    store.upsert_rule("example.com", BlockRule::new(10)).unwrap();
    let host = SnapshotHost::with_active(7, "https://example.com/article");
    let dispatcher = Dispatcher::new(&store, &host, config());

    for _ in 0..9 {
        let outcome = dispatcher.dispatch(&Trigger::Tick).unwrap();
        assert!(!outcome.is_blocked());
    }
    assert_eq!(store.seconds("example.com").unwrap(), 540);
    assert!(host.redirects().is_empty());

    let outcome = dispatcher.dispatch(&Trigger::Tick).unwrap();
    assert_eq!(
        outcome,
        Outcome::Blocked {
            tab_id: 7,
            page: BlockPage::new("example.com", 600, 10),
        }
    );
    assert_eq!(store.seconds("example.com").unwrap(), 600);

    let redirects = host.redirects();
    assert_eq!(redirects.len(), 1);
    assert_eq!(redirects[0].tab_id, 7);
    assert_eq!(
        redirects[0].url,
        format!("{BLOCK_PAGE}?site=example.com&time=600&limit=10")
    );
}

#[test]
fn test_subdomain_usage_goes_to_parent_rule() {
    let store = MemoryStore::new();
    store.upsert_rule("bilibili.com", BlockRule::new(5)).unwrap();
    let host = SnapshotHost::with_active(1, "https://live.bilibili.com/21452505");
    let dispatcher = Dispatcher::new(&store, &host, config());

    dispatcher.dispatch(&Trigger::Tick).unwrap();

    let usage = store.usage().unwrap();
    assert_eq!(usage.get("bilibili.com"), Some(&60));
    assert_eq!(usage.get("live.bilibili.com"), None);
}

#[test]
fn test_daily_reset_clears_usage_only() {
    let store = MemoryStore::new();
    store.upsert_rule("example.com", BlockRule::new(10)).unwrap();
    store.upsert_rule("news.org", BlockRule::new(3)).unwrap();
    store.add_seconds("example.com", 420).unwrap();
    store.add_seconds("news.org", 180).unwrap();
    let before = store.rules().unwrap();

    let host = SnapshotHost::new(None);
    let dispatcher = Dispatcher::new(&store, &host, config());
    assert_eq!(dispatcher.dispatch(&Trigger::DailyReset).unwrap(), Outcome::Reset);

    assert!(store.usage().unwrap().is_empty());
    assert_eq!(store.rules().unwrap(), before);
}

#[test]
fn test_deleting_rule_removes_usage() {
    let store = MemoryStore::new();
    add_rule(&store, "example.com", "10").unwrap();
    store.add_seconds("example.com", 300).unwrap();

    remove_rule(&store, &store, "example.com").unwrap();

    assert!(!store.rules().unwrap().contains_key("example.com"));
    assert!(!store.usage().unwrap().contains_key("example.com"));
}

#[test]
fn test_navigation_blocks_immediately_when_over_limit() {
    let store = MemoryStore::new();
    store.upsert_rule("example.com", BlockRule::new(1)).unwrap();
    store.add_seconds("example.com", 120).unwrap();

    // No tick involved: the tab just finished loading
    let host = SnapshotHost::new(None);
    let dispatcher = Dispatcher::new(&store, &host, config());
    let outcome = dispatcher
        .dispatch(&Trigger::NavigationComplete {
            tab_id: 12,
            url: "https://m.example.com/".to_string(),
        })
        .unwrap();

    assert!(outcome.is_blocked());
    assert_eq!(store.seconds("example.com").unwrap(), 120);
    assert_eq!(
        host.redirects()[0].url,
        format!("{BLOCK_PAGE}?site=example.com&time=120&limit=1")
    );
}

#[test]
fn test_after_reset_site_is_usable_again() {
    let store = MemoryStore::new();
    store.upsert_rule("example.com", BlockRule::new(1)).unwrap();
    let host = SnapshotHost::with_active(2, "https://example.com/");
    let dispatcher = Dispatcher::new(&store, &host, config());

    assert!(dispatcher.dispatch(&Trigger::Tick).unwrap().is_blocked());
    dispatcher.dispatch(&Trigger::DailyReset).unwrap();

    let outcome = dispatcher
        .dispatch(&Trigger::NavigationComplete {
            tab_id: 2,
            url: "https://example.com/".to_string(),
        })
        .unwrap();
    assert!(matches!(outcome, Outcome::UnderLimit { seconds: 0, .. }));
}

#[test]
fn test_internationalized_site_matches_punycode_tab() {
    let store = MemoryStore::new();
    let key = add_rule(&store, "bücher.de", "0").unwrap();
    assert_eq!(key, "xn--bcher-kva.de");

    let host = SnapshotHost::with_active(4, "https://shop.xn--bcher-kva.de/");
    let dispatcher = Dispatcher::new(&store, &host, config());
    let outcome = dispatcher.dispatch(&Trigger::Tick).unwrap();

    assert!(outcome.is_blocked());
    assert_eq!(store.seconds("xn--bcher-kva.de").unwrap(), 60);
    assert_eq!(
        host.redirects()[0].url,
        format!("{BLOCK_PAGE}?site=xn--bcher-kva.de&time=60&limit=0")
    );
}
