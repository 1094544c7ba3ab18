//! Alarm plan and daily reset timing
//!
//! The browser's alarm service fires the triggers; this module decides what
//! alarms exist and when the midnight reset is due. Catching up on alarms
//! missed while the browser was closed is left to the alarm service.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone};
use serde::Serialize;
use thiserror::Error;

use crate::types::Trigger;

/// Alarm name of the daily usage reset.
pub const DAILY_RESET_ALARM: &str = "dailyReset";

/// Alarm name of the usage tick.
pub const TIMER_ALARM: &str = "timer";

/// Minutes between two daily resets.
pub const DAILY_PERIOD_MINUTES: u32 = 24 * 60;

/// Minutes between two ticks.
pub const TICK_PERIOD_MINUTES: u32 = 1;

// =============================================================================
// Midnight
// =============================================================================

/// Earliest valid local time on `naive`'s day at or after `naive`.
///
/// Midnight can fall in a DST gap in some zones; the first existing instant
/// after it is used instead.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = naive;
    loop {
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return dt;
        }
        candidate += Duration::minutes(30);
    }
}

/// The first local midnight strictly after `now`.
pub fn next_local_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let today = now.date_naive();
    let midnight = today.succ_opt().and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0));
    match midnight {
        Some(naive) => resolve_local(&now.timezone(), naive),
        // End of the representable calendar
        None => now.clone() + Duration::days(1),
    }
}

/// Whether a local midnight lies in `(previous, now]`.
pub fn crossed_midnight<Tz: TimeZone>(previous: &DateTime<Tz>, now: &DateTime<Tz>) -> bool {
    *now >= next_local_midnight(previous)
}

// =============================================================================
// Alarms
// =============================================================================

/// One alarm to register with the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSpec {
    pub name: &'static str,
    /// First firing, in milliseconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<i64>,
    pub period_in_minutes: u32,
}

/// Both alarms the extension relies on.
pub fn alarm_plan<Tz: TimeZone>(now: &DateTime<Tz>) -> Vec<AlarmSpec> {
    vec![
        AlarmSpec {
            name: DAILY_RESET_ALARM,
            when: Some(next_local_midnight(now).timestamp_millis()),
            period_in_minutes: DAILY_PERIOD_MINUTES,
        },
        AlarmSpec {
            name: TIMER_ALARM,
            when: None,
            period_in_minutes: TICK_PERIOD_MINUTES,
        },
    ]
}

/// Map an alarm name to the trigger it fires.
pub fn trigger_for_alarm(name: &str) -> Option<Trigger> {
    match name {
        DAILY_RESET_ALARM => Some(Trigger::DailyReset),
        TIMER_ALARM => Some(Trigger::Tick),
        _ => None,
    }
}

// =============================================================================
// Install
// =============================================================================

/// Why the extension's install handler ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    Install,
    Update,
    BrowserUpdate,
    SharedModuleUpdate,
}

/// A reason string the browser is not known to send.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown install reason: {0:?}")]
pub struct UnknownInstallReason(pub String);

impl FromStr for InstallReason {
    type Err = UnknownInstallReason;

    /// Parse the browser's reason string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(Self::Install),
            "update" => Ok(Self::Update),
            "chrome_update" | "browser_update" => Ok(Self::BrowserUpdate),
            "shared_module_update" => Ok(Self::SharedModuleUpdate),
            other => Err(UnknownInstallReason(other.to_string())),
        }
    }
}

/// Work for the install handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPlan {
    /// Write empty rule and usage records
    pub init_records: bool,
    /// Alarms to (re)create; creation is idempotent
    pub alarms: Vec<AlarmSpec>,
}

/// Records are only initialized on first install so updates keep user rules.
/// Alarms are ensured on every run.
pub fn install_plan<Tz: TimeZone>(reason: InstallReason, now: &DateTime<Tz>) -> InstallPlan {
    InstallPlan {
        init_records: reason == InstallReason::Install,
        alarms: alarm_plan(now),
    }
}
