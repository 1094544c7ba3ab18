//! JSON file store
//!
//! Mirrors the extension's two storage records as `blockedSites.json` and
//! `siteTimeTracking.json` in a data directory. Every change is written
//! through while the record's lock is held.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use sl_core::store::StoreResult;
use sl_core::types::{RULES_RECORD, USAGE_RECORD};
use sl_core::{BlockRule, RuleSet, RuleStore, UsageMap, UsageStore};

pub struct JsonFileStore {
    rules_path: PathBuf,
    usage_path: PathBuf,
    rules: Mutex<RuleSet>,
    usage: Mutex<UsageMap>,
}

impl JsonFileStore {
    /// Open or create a store in the given directory.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let rules_path = dir.join(format!("{RULES_RECORD}.json"));
        let usage_path = dir.join(format!("{USAGE_RECORD}.json"));
        let rules: RuleSet = read_record(&rules_path)?;
        let usage: UsageMap = read_record(&usage_path)?;
        debug!(
            "Opened store at {}: {} rules, {} counters",
            dir.display(),
            rules.len(),
            usage.len()
        );

        Ok(Self {
            rules_path,
            usage_path,
            rules: Mutex::new(rules),
            usage: Mutex::new(usage),
        })
    }
}

/// A missing file is an empty record.
fn read_record<T: DeserializeOwned + Default>(path: &Path) -> StoreResult<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Write via a temporary file so a crash never leaves half a record.
fn write_record<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Apply `change` to a copy of the record, persist the copy, then swap it in.
/// A failed write leaves both the file and the in-memory record untouched.
fn commit<T, R>(
    record: &Mutex<T>,
    path: &Path,
    change: impl FnOnce(&mut T) -> R,
) -> StoreResult<R>
where
    T: Clone + Serialize,
{
    let mut current = record.lock()?;
    let mut next = current.clone();
    let result = change(&mut next);
    write_record(path, &next)?;
    *current = next;
    Ok(result)
}

impl RuleStore for JsonFileStore {
    fn rules(&self) -> StoreResult<RuleSet> {
        Ok(self.rules.lock()?.clone())
    }

    fn upsert_rule(&self, key: &str, rule: BlockRule) -> StoreResult<()> {
        commit(&self.rules, &self.rules_path, |rules| {
            rules.insert(key.to_string(), rule);
        })
    }

    fn remove_rule(&self, key: &str) -> StoreResult<bool> {
        if !self.rules.lock()?.contains_key(key) {
            return Ok(false);
        }
        commit(&self.rules, &self.rules_path, |rules| rules.remove(key).is_some())
    }

    fn init_rules(&self) -> StoreResult<()> {
        commit(&self.rules, &self.rules_path, |rules| rules.clear())
    }
}

impl UsageStore for JsonFileStore {
    fn usage(&self) -> StoreResult<UsageMap> {
        Ok(self.usage.lock()?.clone())
    }

    fn add_seconds(&self, key: &str, seconds: u64) -> StoreResult<u64> {
        commit(&self.usage, &self.usage_path, |usage| {
            let entry = usage.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(seconds);
            *entry
        })
    }

    fn remove_usage(&self, key: &str) -> StoreResult<()> {
        if !self.usage.lock()?.contains_key(key) {
            return Ok(());
        }
        commit(&self.usage, &self.usage_path, |usage| {
            usage.remove(key);
        })
    }

    fn reset_usage(&self) -> StoreResult<()> {
        commit(&self.usage, &self.usage_path, |usage| usage.clear())
    }
}
