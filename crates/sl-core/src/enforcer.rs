//! Limit check and block page redirect

use log::{debug, error, info, warn};

use crate::block_page::BlockPage;
use crate::error::HostError;
use crate::host::TabHost;
use crate::store::{RuleStore, StoreResult, UsageStore};
use crate::types::{EngineConfig, TabId};

/// Result of checking one tab against one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enforcement {
    /// The rule was deleted in the meantime
    RuleRemoved,
    /// Still under the limit
    Allowed { seconds: u64, limit_seconds: u64 },
    /// The tab was sent to the block page
    Blocked(BlockPage),
    /// The redirect failed; the failure was logged and dropped
    RedirectFailed { page: BlockPage, error: HostError },
}

/// Compare the stored counter of `rule_key` with its limit and redirect
/// `tab_id` to the block page once the limit is reached.
///
/// Rules and usage are read fresh so a rule deleted or a counter reset since
/// the caller looked is honoured. Redirect failures never propagate; only
/// storage errors do.
pub fn enforce<S, H>(
    store: &S,
    host: &H,
    config: &EngineConfig,
    tab_id: TabId,
    rule_key: &str,
) -> StoreResult<Enforcement>
where
    S: RuleStore + UsageStore + ?Sized,
    H: TabHost + ?Sized,
{
    let rules = store.rules()?;
    let Some(rule) = rules.get(rule_key) else {
        debug!("Rule {rule_key} no longer exists, not blocking");
        return Ok(Enforcement::RuleRemoved);
    };

    let seconds = store.seconds(rule_key)?;
    let limit_seconds = rule.limit_seconds();

    debug!(
        "Checking {rule_key}: spent {seconds}s, limit {limit_seconds}s ({} min)",
        rule.limit_minutes
    );

    if seconds < limit_seconds {
        return Ok(Enforcement::Allowed {
            seconds,
            limit_seconds,
        });
    }

    let page = BlockPage::new(rule_key, seconds, rule.limit_minutes);
    let url = page.to_url(&config.block_page_url);

    match host.redirect(tab_id, &url) {
        Ok(()) => {
            info!("Blocking tab {tab_id}: {rule_key} over limit ({seconds}s >= {limit_seconds}s)");
            Ok(Enforcement::Blocked(page))
        }
        Err(e) => {
            log_redirect_failure(tab_id, rule_key, &e);
            Ok(Enforcement::RedirectFailed { page, error: e })
        }
    }
}

/// Log a failed block redirect at a level matching its cause.
pub fn log_redirect_failure(tab_id: TabId, rule_key: &str, error: &HostError) {
    if error.is_stale_tab() {
        warn!("Tried to block tab {tab_id} for {rule_key}, but the tab no longer exists");
    } else {
        error!("Failed to block tab {tab_id} for {rule_key}: {error}");
    }
}
