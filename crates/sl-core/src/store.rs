//! Storage traits and the in-memory store
//!
//! Rules and usage live in two separate records: rules are synced across
//! devices, usage stays local. Every operation below acts on one record as a
//! whole, so a counter increment is a single step rather than a read followed
//! by a write from the caller.

use std::sync::Mutex;

use log::debug;

use crate::error::StoreError;
use crate::types::{BlockRule, RuleSet, UsageMap};

pub type StoreResult<T> = Result<T, StoreError>;

/// Access to the synced rule record.
pub trait RuleStore {
    /// All configured rules.
    fn rules(&self) -> StoreResult<RuleSet>;

    /// Insert or replace one rule.
    fn upsert_rule(&self, key: &str, rule: BlockRule) -> StoreResult<()>;

    /// Remove one rule. Returns whether it existed.
    fn remove_rule(&self, key: &str) -> StoreResult<bool>;

    /// Replace the record with an empty rule set.
    fn init_rules(&self) -> StoreResult<()>;
}

/// Access to the local usage record.
pub trait UsageStore {
    /// The whole usage map.
    fn usage(&self) -> StoreResult<UsageMap>;

    /// Accumulated seconds for one rule key, zero when absent.
    fn seconds(&self, key: &str) -> StoreResult<u64> {
        Ok(self.usage()?.get(key).copied().unwrap_or(0))
    }

    /// Add `seconds` to a counter and return the new total.
    fn add_seconds(&self, key: &str, seconds: u64) -> StoreResult<u64>;

    /// Drop the counter of one rule key.
    fn remove_usage(&self, key: &str) -> StoreResult<()>;

    /// Replace the record with an empty usage map.
    fn reset_usage(&self) -> StoreResult<()>;
}

// =============================================================================
// Memory Store
// =============================================================================

/// Both records held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rules: Mutex<RuleSet>,
    usage: Mutex<UsageMap>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with existing records.
    pub fn with_records(rules: RuleSet, usage: UsageMap) -> Self {
        Self {
            rules: Mutex::new(rules),
            usage: Mutex::new(usage),
        }
    }

    /// Replace the rule record.
    pub fn replace_rules(&self, rules: RuleSet) -> StoreResult<()> {
        *self.rules.lock()? = rules;
        Ok(())
    }

    /// Replace the usage record.
    pub fn replace_usage(&self, usage: UsageMap) -> StoreResult<()> {
        *self.usage.lock()? = usage;
        Ok(())
    }
}

impl RuleStore for MemoryStore {
    fn rules(&self) -> StoreResult<RuleSet> {
        Ok(self.rules.lock()?.clone())
    }

    fn upsert_rule(&self, key: &str, rule: BlockRule) -> StoreResult<()> {
        self.rules.lock()?.insert(key.to_string(), rule);
        debug!("Rule {key} set to {} min", rule.limit_minutes);
        Ok(())
    }

    fn remove_rule(&self, key: &str) -> StoreResult<bool> {
        Ok(self.rules.lock()?.remove(key).is_some())
    }

    fn init_rules(&self) -> StoreResult<()> {
        self.rules.lock()?.clear();
        Ok(())
    }
}

impl UsageStore for MemoryStore {
    fn usage(&self) -> StoreResult<UsageMap> {
        Ok(self.usage.lock()?.clone())
    }

    fn seconds(&self, key: &str) -> StoreResult<u64> {
        Ok(self.usage.lock()?.get(key).copied().unwrap_or(0))
    }

    fn add_seconds(&self, key: &str, seconds: u64) -> StoreResult<u64> {
        let mut usage = self.usage.lock()?;
        let total = usage.entry(key.to_string()).or_insert(0);
        *total = total.saturating_add(seconds);
        Ok(*total)
    }

    fn remove_usage(&self, key: &str) -> StoreResult<()> {
        self.usage.lock()?.remove(key);
        Ok(())
    }

    fn reset_usage(&self) -> StoreResult<()> {
        self.usage.lock()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_usage_accounting() {
        let store = MemoryStore::new();

        // Initially zero
        assert_eq!(store.seconds("example.com").unwrap(), 0);

        assert_eq!(store.add_seconds("example.com", 60).unwrap(), 60);
        assert_eq!(store.add_seconds("example.com", 60).unwrap(), 120);
        assert_eq!(store.seconds("example.com").unwrap(), 120);

        store.remove_usage("example.com").unwrap();
        assert!(store.usage().unwrap().is_empty());
    }

    #[test]
    fn test_reset_keeps_rules() {
        let store = MemoryStore::new();
        store.upsert_rule("example.com", BlockRule::new(10)).unwrap();
        store.add_seconds("example.com", 300).unwrap();

        store.reset_usage().unwrap();
        assert!(store.usage().unwrap().is_empty());
        assert_eq!(store.rules().unwrap().len(), 1);
    }

    #[test]
    fn test_rule_crud() {
        let store = MemoryStore::new();
        store.upsert_rule("example.com", BlockRule::new(10)).unwrap();
        store.upsert_rule("example.com", BlockRule::new(20)).unwrap();
        assert_eq!(store.rules().unwrap()["example.com"].limit_minutes, 20);

        assert!(store.remove_rule("example.com").unwrap());
        assert!(!store.remove_rule("example.com").unwrap());

        store.upsert_rule("a.com", BlockRule::new(1)).unwrap();
        store.init_rules().unwrap();
        assert!(store.rules().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.add_seconds("example.com", 60).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.seconds("example.com").unwrap(), 8 * 100 * 60);
    }
}
