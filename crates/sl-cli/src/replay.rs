//! Replay a recorded event log against a store.
//!
//! One JSON object per line:
//!
//! ```text
//! {"at":"2025-05-01T23:58:00+08:00","trigger":{"type":"tick"},"active_tab":{"id":1,"url":"https://example.com/"}}
//! {"at":"2025-05-02T00:01:00+08:00","trigger":{"type":"navigation_complete","tab_id":1,"url":"https://example.com/"}}
//! ```
//!
//! When consecutive timestamps straddle a local midnight, the daily reset is
//! dispatched before the later event, the way the midnight alarm would have
//! fired in between.

use std::fs;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use sl_core::host::SnapshotHost;
use sl_core::schedule::crossed_midnight;
use sl_core::{Dispatcher, EngineConfig, Outcome, RuleStore, TabSnapshot, Trigger, UsageStore};

#[derive(Debug, Deserialize)]
pub struct ReplayEvent {
    #[serde(default)]
    pub at: Option<DateTime<FixedOffset>>,
    pub trigger: Trigger,
    #[serde(default)]
    pub active_tab: Option<TabSnapshot>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub events: usize,
    pub resets: usize,
    pub blocks: usize,
}

pub fn parse_events(content: &str) -> Result<Vec<ReplayEvent>, String> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with("//"))
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| format!("Line {}: {}", idx + 1, e))
        })
        .collect()
}

pub fn replay_events<S>(
    store: &S,
    config: &EngineConfig,
    events: &[ReplayEvent],
    verbose: bool,
) -> Result<ReplayStats, String>
where
    S: RuleStore + UsageStore,
{
    let mut stats = ReplayStats::default();
    let mut last_at: Option<DateTime<FixedOffset>> = None;

    for event in events {
        if let (Some(previous), Some(at)) = (last_at, event.at) {
            if crossed_midnight(&previous, &at) {
                dispatch_one(store, config, None, &Trigger::DailyReset, &mut stats, verbose)?;
            }
        }
        if event.at.is_some() {
            last_at = event.at;
        }

        dispatch_one(
            store,
            config,
            event.active_tab.clone(),
            &event.trigger,
            &mut stats,
            verbose,
        )?;
        stats.events += 1;
    }

    Ok(stats)
}

fn dispatch_one<S>(
    store: &S,
    config: &EngineConfig,
    active_tab: Option<TabSnapshot>,
    trigger: &Trigger,
    stats: &mut ReplayStats,
    verbose: bool,
) -> Result<(), String>
where
    S: RuleStore + UsageStore,
{
    let host = SnapshotHost::new(active_tab);
    let outcome = Dispatcher::new(store, &host, config.clone())
        .dispatch(trigger)
        .map_err(|e| format!("Dispatch failed: {}", e))?;

    match &outcome {
        Outcome::Reset => stats.resets += 1,
        Outcome::Blocked { .. } => stats.blocks += 1,
        _ => {}
    }

    if verbose {
        println!("  {:?} -> {:?}", trigger, outcome);
    }
    for redirect in host.take_redirects() {
        println!("  redirect tab {} -> {}", redirect.tab_id, redirect.url);
    }
    Ok(())
}

pub fn run_replay<S>(store: &S, config: &EngineConfig, path: &str, verbose: bool) -> Result<(), String>
where
    S: RuleStore + UsageStore,
{
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    let events = parse_events(&content)?;

    let stats = replay_events(store, config, &events, verbose)?;

    println!("Replayed {} events from '{}'", stats.events, path);
    println!("  Resets:   {}", stats.resets);
    println!("  Blocks:   {}", stats.blocks);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_core::{BlockRule, MemoryStore};

    const LOG: &str = r#"
{"at":"2025-05-01T23:58:00+00:00","trigger":{"type":"tick"},"active_tab":{"id":1,"url":"https://example.com/"}}
{"at":"2025-05-01T23:59:00+00:00","trigger":{"type":"tick"},"active_tab":{"id":1,"url":"https://example.com/"}}
{"at":"2025-05-02T00:00:30+00:00","trigger":{"type":"tick"},"active_tab":{"id":1,"url":"https://www.example.com/"}}
{"at":"2025-05-02T00:01:00+00:00","trigger":{"type":"navigation_complete","tab_id":1,"url":"https://example.com/"}}
"#;

    #[test]
    fn test_parse_events() {
        let events = parse_events(LOG).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].trigger, Trigger::Tick);
        assert_eq!(events[0].active_tab.as_ref().unwrap().id, 1);
    }

    #[test]
    fn test_parse_error_names_line() {
        let err = parse_events("{\"trigger\":{\"type\":\"tick\"}}\nnot json").unwrap_err();
        assert!(err.starts_with("Line 2"));
    }

    #[test]
    fn test_replay_resets_at_midnight() {
        let store = MemoryStore::new();
        store.upsert_rule("example.com", BlockRule::new(2)).unwrap();
        let events = parse_events(LOG).unwrap();

        let stats = replay_events(&store, &EngineConfig::default(), &events, false).unwrap();

        // Two ticks hit the limit before midnight, the reset clears it,
        // one tick after midnight leaves 60s.
        assert_eq!(
            stats,
            ReplayStats {
                events: 4,
                resets: 1,
                blocks: 1,
            }
        );
        assert_eq!(store.seconds("example.com").unwrap(), 60);
    }
}
