//! Trigger dispatcher
//!
//! Every browser event enters through [`Dispatcher::dispatch`]. Handlers run
//! to completion one at a time; the only shared state is the store, whose
//! operations are atomic per record.

use log::{debug, info};

use crate::block_page::BlockPage;
use crate::enforcer::{enforce, Enforcement};
use crate::error::{HostError, Result};
use crate::host::TabHost;
use crate::matcher::match_rule;
use crate::store::{RuleStore, UsageStore};
use crate::tracker::{track_tick, TickReport, TickSkip};
use crate::types::{EngineConfig, TabId, Trigger};
use crate::url::tab_hostname;

/// Why an event changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No active tab at tick time
    NoActiveTab,
    /// Missing URL or a browser-internal page
    NotWebPage,
    /// No rule governs the host
    Untracked,
    /// The matched rule was deleted before the limit check
    RuleRemoved,
}

impl From<TickSkip> for SkipReason {
    fn from(skip: TickSkip) -> Self {
        match skip {
            TickSkip::NoActiveTab => SkipReason::NoActiveTab,
            TickSkip::NotWebPage => SkipReason::NotWebPage,
            TickSkip::Untracked => SkipReason::Untracked,
        }
    }
}

/// What handling one trigger did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do
    Skipped(SkipReason),
    /// The tab's rule is still under its limit
    UnderLimit {
        tab_id: TabId,
        rule_key: String,
        seconds: u64,
        limit_seconds: u64,
    },
    /// The tab was redirected to the block page
    Blocked { tab_id: TabId, page: BlockPage },
    /// The block redirect failed and was dropped
    RedirectFailed {
        tab_id: TabId,
        page: BlockPage,
        error: HostError,
    },
    /// All usage counters were cleared
    Reset,
}

impl Outcome {
    fn from_enforcement(tab_id: TabId, rule_key: String, enforcement: Enforcement) -> Self {
        match enforcement {
            Enforcement::RuleRemoved => Outcome::Skipped(SkipReason::RuleRemoved),
            Enforcement::Allowed {
                seconds,
                limit_seconds,
            } => Outcome::UnderLimit {
                tab_id,
                rule_key,
                seconds,
                limit_seconds,
            },
            Enforcement::Blocked(page) => Outcome::Blocked { tab_id, page },
            Enforcement::RedirectFailed { page, error } => Outcome::RedirectFailed {
                tab_id,
                page,
                error,
            },
        }
    }

    /// Whether the tab was sent to the block page.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Outcome::Blocked { .. })
    }
}

/// Routes triggers to the tracker, the enforcer and the reset.
pub struct Dispatcher<'a, S: ?Sized, H: ?Sized> {
    store: &'a S,
    host: &'a H,
    config: EngineConfig,
}

impl<'a, S, H> Dispatcher<'a, S, H>
where
    S: RuleStore + UsageStore + ?Sized,
    H: TabHost + ?Sized,
{
    pub fn new(store: &'a S, host: &'a H, config: EngineConfig) -> Self {
        Self {
            store,
            host,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle one trigger.
    ///
    /// Storage failures end this event and are returned; everything else is
    /// reported through the [`Outcome`].
    pub fn dispatch(&self, trigger: &Trigger) -> Result<Outcome> {
        match trigger {
            Trigger::Tick => self.on_tick(),
            Trigger::DailyReset => self.on_daily_reset(),
            Trigger::NavigationComplete { tab_id, url } => self.on_navigation_complete(*tab_id, url),
        }
    }

    fn on_tick(&self) -> Result<Outcome> {
        let report = track_tick(self.store, self.host, &self.config)?;
        Ok(match report {
            TickReport::Skipped(skip) => Outcome::Skipped(skip.into()),
            TickReport::Charged {
                tab_id,
                rule_key,
                enforcement,
                ..
            } => Outcome::from_enforcement(tab_id, rule_key, enforcement),
        })
    }

    fn on_daily_reset(&self) -> Result<Outcome> {
        info!("Midnight reset of usage counters");
        self.store.reset_usage()?;
        Ok(Outcome::Reset)
    }

    /// Check a freshly loaded page right away instead of waiting for the
    /// next tick. Usage is not charged here.
    fn on_navigation_complete(&self, tab_id: TabId, url: &str) -> Result<Outcome> {
        let Some(host_name) = tab_hostname(url) else {
            return Ok(Outcome::Skipped(SkipReason::NotWebPage));
        };

        let rules = self.store.rules()?;
        let Some(rule_key) = match_rule(&host_name, &rules) else {
            return Ok(Outcome::Skipped(SkipReason::Untracked));
        };
        let rule_key = rule_key.to_string();

        debug!("Tab {tab_id} loaded {host_name}, matches rule {rule_key}");
        let enforcement = enforce(self.store, self.host, &self.config, tab_id, &rule_key)?;
        Ok(Outcome::from_enforcement(tab_id, rule_key, enforcement))
    }
}
