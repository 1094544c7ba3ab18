//! WebAssembly bindings for sitelimit
//!
//! The extension's background script owns one [`SiteLimiter`]. It loads the
//! two storage records into it at startup, forwards alarms and tab updates,
//! and applies what comes back: a usage record to persist and, at most, one
//! tab to redirect. Popup and block page use the free functions.

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use sl_core::config::{self, RuleSummary};
use sl_core::enforcer::log_redirect_failure;
use sl_core::host::SnapshotHost;
use sl_core::schedule::{install_plan, next_local_midnight, trigger_for_alarm, InstallReason};
use sl_core::{
    block_message as core_block_message, match_rule, normalize_site_input, Dispatcher,
    EngineConfig, HostError, MemoryStore, Outcome, RuleSet, RuleStore, SkipReason, TabSnapshot,
    Trigger, UsageMap, UsageStore,
};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// =============================================================================
// JS <-> serde
// =============================================================================

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Read a JS value through JSON. `undefined` and `null` give the default.
fn from_js<T: DeserializeOwned + Default>(value: &JsValue) -> Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    let json: String = js_sys::JSON::stringify(value)?.into();
    serde_json::from_str(&json).map_err(to_js_error)
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value).map_err(to_js_error)?;
    js_sys::JSON::parse(&json)
}

fn set(target: &js_sys::Object, key: &str, value: &JsValue) {
    let _ = js_sys::Reflect::set(target, &key.into(), value);
}

fn skip_reason_name(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::NoActiveTab => "noActiveTab",
        SkipReason::NotWebPage => "notWebPage",
        SkipReason::Untracked => "untracked",
        SkipReason::RuleRemoved => "ruleRemoved",
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Event handler state for the background script.
#[wasm_bindgen]
pub struct SiteLimiter {
    store: MemoryStore,
    config: EngineConfig,
}

#[wasm_bindgen]
impl SiteLimiter {
    /// `block_page_url` is `chrome.runtime.getURL('block_page.html')`.
    #[wasm_bindgen(constructor)]
    pub fn new(block_page_url: &str) -> SiteLimiter {
        SiteLimiter {
            store: MemoryStore::new(),
            config: EngineConfig::with_block_page(block_page_url),
        }
    }

    /// Replace the rules with the `blockedSites` record.
    #[wasm_bindgen(js_name = loadRules)]
    pub fn load_rules(&self, rules: JsValue) -> Result<(), JsValue> {
        let rules: RuleSet = from_js(&rules)?;
        self.store.replace_rules(rules).map_err(to_js_error)
    }

    /// Replace the counters with the `siteTimeTracking` record.
    #[wasm_bindgen(js_name = loadUsage)]
    pub fn load_usage(&self, usage: JsValue) -> Result<(), JsValue> {
        let usage: UsageMap = from_js(&usage)?;
        self.store.replace_usage(usage).map_err(to_js_error)
    }

    pub fn rules(&self) -> Result<JsValue, JsValue> {
        to_js(&self.store.rules().map_err(to_js_error)?)
    }

    pub fn usage(&self) -> Result<JsValue, JsValue> {
        to_js(&self.store.usage().map_err(to_js_error)?)
    }

    /// Handle the one-minute alarm. `active_tab` is `{id, url}` or null.
    pub fn tick(&self, active_tab: JsValue) -> Result<JsValue, JsValue> {
        let tab: Option<TabSnapshot> = from_js(&active_tab)?;
        self.run(SnapshotHost::new(tab), &Trigger::Tick)
    }

    /// Handle the midnight alarm.
    #[wasm_bindgen(js_name = dailyReset)]
    pub fn daily_reset(&self) -> Result<JsValue, JsValue> {
        self.run(SnapshotHost::new(None), &Trigger::DailyReset)
    }

    /// Handle a tab whose page finished loading.
    #[wasm_bindgen(js_name = navigationComplete)]
    pub fn navigation_complete(&self, tab_id: i32, url: &str) -> Result<JsValue, JsValue> {
        let trigger = Trigger::NavigationComplete {
            tab_id,
            url: url.to_string(),
        };
        self.run(SnapshotHost::new(None), &trigger)
    }

    /// Route an alarm by name. Unknown alarms return `undefined`.
    #[wasm_bindgen(js_name = onAlarm)]
    pub fn on_alarm(&self, name: &str, active_tab: JsValue) -> Result<JsValue, JsValue> {
        let Some(trigger) = trigger_for_alarm(name) else {
            log::debug!("Ignoring unknown alarm {name}");
            return Ok(JsValue::UNDEFINED);
        };
        let tab: Option<TabSnapshot> = match trigger {
            Trigger::Tick => from_js(&active_tab)?,
            _ => None,
        };
        self.run(SnapshotHost::new(tab), &trigger)
    }

    /// Report a redirect the browser refused, e.g. because the tab closed.
    #[wasm_bindgen(js_name = redirectFailed)]
    pub fn redirect_failed(&self, tab_id: i32, rule_key: &str, message: &str) {
        log_redirect_failure(tab_id, rule_key, &HostError::from_message(tab_id, message));
    }

    fn run(&self, host: SnapshotHost, trigger: &Trigger) -> Result<JsValue, JsValue> {
        let usage_before = self.store.usage().map_err(to_js_error)?;
        let outcome = Dispatcher::new(&self.store, &host, self.config.clone())
            .dispatch(trigger)
            .map_err(to_js_error)?;
        let usage_after = self.store.usage().map_err(to_js_error)?;

        let result = js_sys::Object::new();
        match &outcome {
            Outcome::Skipped(reason) => {
                set(&result, "outcome", &"skipped".into());
                set(&result, "reason", &skip_reason_name(*reason).into());
            }
            Outcome::UnderLimit {
                rule_key, seconds, ..
            } => {
                set(&result, "outcome", &"underLimit".into());
                set(&result, "site", &JsValue::from_str(rule_key));
                set(&result, "seconds", &JsValue::from_f64(*seconds as f64));
            }
            Outcome::Blocked { page, .. } => {
                set(&result, "outcome", &"blocked".into());
                set(&result, "site", &JsValue::from_str(&page.site));
                set(&result, "seconds", &JsValue::from_f64(page.seconds as f64));
            }
            // Never produced here: the snapshot host has no closed tabs
            Outcome::RedirectFailed { page, error, .. } => {
                set(&result, "outcome", &"redirectFailed".into());
                set(&result, "site", &JsValue::from_str(&page.site));
                set(&result, "error", &JsValue::from_str(&error.to_string()));
            }
            Outcome::Reset => {
                set(&result, "outcome", &"reset".into());
            }
        }

        if let Some(redirect) = host.take_redirects().into_iter().next() {
            let target = js_sys::Object::new();
            set(&target, "tabId", &JsValue::from(redirect.tab_id));
            set(&target, "url", &JsValue::from_str(&redirect.url));
            set(&result, "redirect", &target);
        }

        let changed = usage_before != usage_after;
        set(&result, "usageChanged", &JsValue::from_bool(changed));
        if changed {
            set(&result, "usage", &to_js(&usage_after)?);
        }

        Ok(result.into())
    }
}

// =============================================================================
// Popup
// =============================================================================

/// Canonical site for the rule form, or `undefined` when invalid.
#[wasm_bindgen]
pub fn normalize_site(input: &str) -> Option<String> {
    normalize_site_input(input)
}

/// Rule key governing `host` in the given `blockedSites` record.
#[wasm_bindgen]
pub fn match_rule_js(host: &str, rules: JsValue) -> Result<Option<String>, JsValue> {
    let rules: RuleSet = from_js(&rules)?;
    Ok(match_rule(host, &rules).map(str::to_string))
}

/// Validate the form and return the updated `blockedSites` record.
/// Throws a message suitable for an alert on invalid input.
#[wasm_bindgen]
pub fn add_rule_js(rules: JsValue, raw_site: &str, raw_limit: &str) -> Result<JsValue, JsValue> {
    let store = MemoryStore::with_records(from_js(&rules)?, UsageMap::new());
    config::add_rule(&store, raw_site, raw_limit).map_err(to_js_error)?;
    to_js(&store.rules().map_err(to_js_error)?)
}

/// Remove a rule; returns `{rules, usage}` with both records updated.
#[wasm_bindgen]
pub fn remove_rule_js(rules: JsValue, usage: JsValue, key: &str) -> Result<JsValue, JsValue> {
    let store = MemoryStore::with_records(from_js(&rules)?, from_js(&usage)?);
    config::remove_rule(&store, &store, key).map_err(to_js_error)?;

    let result = js_sys::Object::new();
    set(&result, "rules", &to_js(&store.rules().map_err(to_js_error)?)?);
    set(&result, "usage", &to_js(&store.usage().map_err(to_js_error)?)?);
    Ok(result.into())
}

/// Sorted rows `{site, limitMinutes, usedMinutes}` for the rule list.
#[wasm_bindgen]
pub fn list_rules_js(rules: JsValue, usage: JsValue) -> Result<JsValue, JsValue> {
    let store = MemoryStore::with_records(from_js(&rules)?, from_js(&usage)?);
    let rows: Vec<RuleSummary> = config::list_rules(&store, &store).map_err(to_js_error)?;
    to_js(&rows)
}

// =============================================================================
// Block page and install
// =============================================================================

/// Message for the block page, given `location.search`.
#[wasm_bindgen]
pub fn block_message(search: &str) -> String {
    core_block_message(search)
}

/// Next local midnight in milliseconds since the epoch.
#[wasm_bindgen]
pub fn next_midnight_ms() -> f64 {
    next_local_midnight(&chrono::Local::now()).timestamp_millis() as f64
}

/// `{initRecords, alarms}` for `chrome.runtime.onInstalled`.
#[wasm_bindgen]
pub fn install_plan_js(reason: &str) -> Result<JsValue, JsValue> {
    let reason = reason.parse().unwrap_or(InstallReason::Update);
    to_js(&install_plan(reason, &chrono::Local::now()))
}
