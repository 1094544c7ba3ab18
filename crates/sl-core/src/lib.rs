//! sitelimit Core Library
//!
//! This crate provides the logic behind the sitelimit browser extension: it
//! tracks how long each configured site is used per day and decides when a
//! tab has to be sent to the block page.
//!
//! # Architecture
//!
//! Browser events arrive as named [`Trigger`]s and are routed through a single
//! [`Dispatcher`]. The dispatcher talks to the browser only through the
//! [`TabHost`] trait and to persistent state only through the [`RuleStore`] and
//! [`UsageStore`] traits, so the whole event surface runs without a browser.
//!
//! # Modules
//!
//! - `url`: Hostname normalization and small URL helpers
//! - `matcher`: Rule lookup with parent-domain matching
//! - `tracker`: Per-tick usage accounting
//! - `enforcer`: Limit check and block page redirect
//! - `schedule`: Alarm plan and local-midnight computation
//! - `dispatch`: Trigger dispatcher
//! - `store`: Storage traits and the in-memory store
//! - `config`: Rule management operations behind the popup
//! - `block_page`: Block page address and message
//! - `host`: Browser tab seam
//! - `types`: Shared type definitions

pub mod block_page;
pub mod config;
pub mod dispatch;
pub mod enforcer;
pub mod error;
pub mod host;
pub mod matcher;
pub mod schedule;
pub mod store;
pub mod tracker;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use block_page::{block_message, BlockPage};
pub use dispatch::{Dispatcher, Outcome, SkipReason};
pub use error::{ConfigError, Error, HostError, Result, StoreError};
pub use host::TabHost;
pub use matcher::{match_rule, RuleMatcher};
pub use store::{MemoryStore, RuleStore, UsageStore};
pub use types::{BlockRule, EngineConfig, RuleSet, TabId, TabSnapshot, Trigger, UsageMap};
pub use crate::url::{normalize_hostname, normalize_site_input, tab_hostname};
