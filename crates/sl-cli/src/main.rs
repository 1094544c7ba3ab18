//! sitelimit CLI
//!
//! Inspect and exercise the extension logic outside the browser: manage rules
//! in a JSON data directory, feed it ticks and page loads, replay event logs.

mod replay;
mod store;

#[cfg(feature = "e2e")]
mod e2e;

use clap::{Parser, Subcommand};

use sl_core::config::{add_rule, list_rules, remove_rule};
use sl_core::host::SnapshotHost;
use sl_core::schedule::{install_plan, InstallReason};
use sl_core::{
    block_message, match_rule, normalize_hostname, normalize_site_input, Dispatcher, EngineConfig,
    Outcome, RuleStore, TabSnapshot, Trigger,
};

use crate::store::JsonFileStore;

#[derive(Parser)]
#[command(name = "sl-cli")]
#[command(about = "sitelimit rule and usage tools")]
struct Cli {
    /// Directory holding blockedSites.json and siteTimeTracking.json
    #[arg(long, global = true, env = "SITELIMIT_DATA", default_value = "sitelimit-data")]
    data_dir: String,

    /// Block page address used in redirects
    #[arg(long, global = true, default_value = sl_core::types::DEFAULT_BLOCK_PAGE)]
    block_page: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical hostname of each input
    Normalize {
        inputs: Vec<String>,
    },

    /// Show which rule governs a URL or hostname
    Match {
        input: String,
    },

    /// Add or update a rule
    Add {
        site: String,
        /// Daily limit in minutes
        limit: String,
    },

    /// Remove a rule and its usage
    Remove {
        site: String,
    },

    /// List rules with today's usage
    List,

    /// Run ticks with the given URL in the active tab
    Tick {
        #[arg(short, long)]
        url: String,

        #[arg(short, long, default_value_t = 1)]
        tab_id: i32,

        /// Number of ticks to run
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },

    /// Report a completed page load
    Navigate {
        #[arg(short, long)]
        url: String,

        #[arg(short, long, default_value_t = 1)]
        tab_id: i32,
    },

    /// Run the midnight reset now
    Reset,

    /// Replay a JSON-lines event log
    Replay {
        input: String,

        /// Print every outcome
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the alarms and record initialization for an install reason
    Alarms {
        #[arg(short, long, default_value = "install")]
        reason: String,
    },

    /// Render the block page message for a query string
    BlockMessage {
        query: String,
    },

    /// Load the extension in Chrome and check its pages
    #[cfg(feature = "e2e")]
    E2e {
        #[arg(long, default_value = "http://localhost:9515")]
        chromedriver: String,

        #[arg(long, default_value = "extension")]
        extension: String,

        #[arg(long)]
        headless: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = EngineConfig::with_block_page(&cli.block_page);

    let result = match cli.command {
        Commands::Normalize { inputs } => cmd_normalize(&inputs),
        Commands::Match { input } => open(&cli.data_dir).and_then(|s| cmd_match(&s, &input)),
        Commands::Add { site, limit } => open(&cli.data_dir).and_then(|s| cmd_add(&s, &site, &limit)),
        Commands::Remove { site } => {
            open(&cli.data_dir).and_then(|s| cmd_remove(&s, &site).map(|_| ()))
        }
        Commands::List => open(&cli.data_dir).and_then(|s| cmd_list(&s)),
        Commands::Tick { url, tab_id, count } => {
            open(&cli.data_dir).and_then(|s| cmd_tick(&s, &config, &url, tab_id, count))
        }
        Commands::Navigate { url, tab_id } => {
            let trigger = Trigger::NavigationComplete { tab_id, url };
            open(&cli.data_dir).and_then(|s| cmd_dispatch(&s, &config, None, &trigger))
        }
        Commands::Reset => {
            open(&cli.data_dir).and_then(|s| cmd_dispatch(&s, &config, None, &Trigger::DailyReset))
        }
        Commands::Replay { input, verbose } => {
            open(&cli.data_dir).and_then(|s| replay::run_replay(&s, &config, &input, verbose))
        }
        Commands::Alarms { reason } => cmd_alarms(&reason),
        Commands::BlockMessage { query } => {
            println!("{}", block_message(&query));
            Ok(())
        }
        #[cfg(feature = "e2e")]
        Commands::E2e {
            chromedriver,
            extension,
            headless,
        } => e2e::run_e2e(e2e::E2eOptions {
            chromedriver_url: chromedriver,
            extension_path: extension,
            headless,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn open(data_dir: &str) -> Result<JsonFileStore, String> {
    JsonFileStore::open(data_dir).map_err(|e| format!("Failed to open '{}': {}", data_dir, e))
}

fn cmd_normalize(inputs: &[String]) -> Result<(), String> {
    if inputs.is_empty() {
        return Err("No inputs specified".to_string());
    }
    for input in inputs {
        match normalize_hostname(input) {
            Some(host) => println!("{input} -> {host}"),
            None => println!("{input} -> (invalid)"),
        }
    }
    Ok(())
}

fn cmd_match(store: &JsonFileStore, input: &str) -> Result<(), String> {
    let host = normalize_hostname(input).ok_or_else(|| format!("Invalid host: '{}'", input))?;
    let rules = store.rules().map_err(|e| e.to_string())?;
    match match_rule(&host, &rules) {
        Some(key) => println!("{host} -> {key} ({} min/day)", rules[key].limit_minutes),
        None => println!("{host} -> no rule"),
    }
    Ok(())
}

fn cmd_add(store: &JsonFileStore, site: &str, limit: &str) -> Result<(), String> {
    let key = add_rule(store, site, limit).map_err(|e| e.to_string())?;
    println!("Saved rule '{}'", key);
    Ok(())
}

/// Rule key for a site argument. Anything that does not normalize is taken
/// as a literal key so malformed entries can still be removed.
fn rule_key(site: &str) -> String {
    normalize_site_input(site).unwrap_or_else(|| site.trim().to_string())
}

fn cmd_remove(store: &JsonFileStore, site: &str) -> Result<bool, String> {
    let key = rule_key(site);
    let existed = remove_rule(store, store, &key).map_err(|e| e.to_string())?;
    if existed {
        println!("Removed rule '{}'", key);
    } else {
        println!("No rule '{}'; cleared its usage", key);
    }
    Ok(existed)
}

fn cmd_list(store: &JsonFileStore) -> Result<(), String> {
    let rows = list_rules(store, store).map_err(|e| e.to_string())?;
    if rows.is_empty() {
        println!("No rules configured");
        return Ok(());
    }
    for row in rows {
        println!("  {:<32} {:>4} / {:<4} min", row.site, row.used_minutes, row.limit_minutes);
    }
    Ok(())
}

fn cmd_tick(
    store: &JsonFileStore,
    config: &EngineConfig,
    url: &str,
    tab_id: i32,
    count: u32,
) -> Result<(), String> {
    for _ in 0..count {
        let tab = TabSnapshot::new(tab_id, url);
        cmd_dispatch(store, config, Some(tab), &Trigger::Tick)?;
    }
    Ok(())
}

fn cmd_dispatch(
    store: &JsonFileStore,
    config: &EngineConfig,
    active_tab: Option<TabSnapshot>,
    trigger: &Trigger,
) -> Result<(), String> {
    let host = SnapshotHost::new(active_tab);
    let outcome = Dispatcher::new(store, &host, config.clone())
        .dispatch(trigger)
        .map_err(|e| e.to_string())?;

    match outcome {
        Outcome::Skipped(reason) => println!("Skipped: {:?}", reason),
        Outcome::UnderLimit {
            rule_key,
            seconds,
            limit_seconds,
            ..
        } => println!("{rule_key}: {seconds}s of {limit_seconds}s used"),
        Outcome::Blocked { tab_id, page } => {
            println!("Blocked {} on tab {} ({}s, limit {} min)", page.site, tab_id, page.seconds, page.limit_minutes)
        }
        Outcome::RedirectFailed { tab_id, error, .. } => {
            println!("Redirect of tab {tab_id} failed: {error}")
        }
        Outcome::Reset => println!("Usage counters cleared"),
    }

    for redirect in host.take_redirects() {
        println!("  redirect tab {} -> {}", redirect.tab_id, redirect.url);
    }
    Ok(())
}

fn cmd_alarms(reason: &str) -> Result<(), String> {
    let reason = reason.parse::<InstallReason>().map_err(|e| e.to_string())?;
    let plan = install_plan(reason, &chrono::Local::now());
    let json = serde_json::to_string_pretty(&plan)
        .map_err(|e| format!("Failed to serialize plan: {}", e))?;
    println!("{json}");
    Ok(())
}
