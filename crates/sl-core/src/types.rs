//! Core type definitions for sitelimit
//!
//! The two map types serialize to exactly the JSON shape the extension keeps
//! in browser storage (`blockedSites` and `siteTimeTracking`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// Storage Records
// =============================================================================

/// Storage key of the synced rule record.
pub const RULES_RECORD: &str = "blockedSites";

/// Storage key of the local usage record.
pub const USAGE_RECORD: &str = "siteTimeTracking";

/// A daily allowance for one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRule {
    /// Allowed minutes per day. Zero blocks the site outright.
    #[serde(rename = "limit")]
    pub limit_minutes: u32,
}

impl BlockRule {
    pub const fn new(limit_minutes: u32) -> Self {
        Self { limit_minutes }
    }

    /// The allowance in seconds.
    #[inline]
    pub const fn limit_seconds(&self) -> u64 {
        self.limit_minutes as u64 * 60
    }
}

/// Rule key (canonical hostname) to rule.
pub type RuleSet = BTreeMap<String, BlockRule>;

/// Rule key to accumulated seconds since the last daily reset.
pub type UsageMap = BTreeMap<String, u64>;

// =============================================================================
// Scheme Masks
// =============================================================================

bitflags::bitflags! {
    /// URL scheme mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SchemeMask: u8 {
        const HTTP = 1 << 0;
        const HTTPS = 1 << 1;
        const WS = 1 << 2;
        const WSS = 1 << 3;
        const FTP = 1 << 4;
        const FILE = 1 << 5;
        /// Browser-internal pages (chrome://, about:, extension pages)
        const INTERNAL = 1 << 6;
        /// Schemes whose pages count as browsing time
        const WEB = Self::HTTP.bits() | Self::HTTPS.bits();
    }
}

// =============================================================================
// Tabs
// =============================================================================

/// Browser tab identifier.
pub type TabId = i32;

/// The active tab as seen at the moment of a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub id: TabId,
    #[serde(default)]
    pub url: Option<String>,
}

impl TabSnapshot {
    pub fn new(id: TabId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: Some(url.into()),
        }
    }
}

// =============================================================================
// Triggers
// =============================================================================

/// Events the extension reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// The periodic one-minute alarm
    Tick,
    /// The midnight alarm
    DailyReset,
    /// A tab finished loading
    NavigationComplete { tab_id: TabId, url: String },
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Default block page resource, relative to the extension root.
pub const DEFAULT_BLOCK_PAGE: &str = "block_page.html";

/// Seconds charged per tick.
pub const DEFAULT_TICK_SECONDS: u64 = 60;

/// Settings shared by the tracker and the enforcer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Address of the block page, without query string
    pub block_page_url: String,
    /// Seconds attributed to the matched rule on every tick
    pub tick_seconds: u64,
}

impl EngineConfig {
    pub fn with_block_page(block_page_url: impl Into<String>) -> Self {
        Self {
            block_page_url: block_page_url.into(),
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_page_url: DEFAULT_BLOCK_PAGE.to_string(),
            tick_seconds: DEFAULT_TICK_SECONDS,
        }
    }
}
