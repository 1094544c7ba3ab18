//! Browser checks against the unpacked extension.
//!
//! Needs a running chromedriver and a wasm build in `extension/pkg`.

use std::path::Path;
use std::time::Duration;

use serde_json::{json, Value};
use thirtyfour::extensions::cdp::ChromeDevTools;
use thirtyfour::prelude::*;
use thirtyfour::ChromeCapabilities;

/// Site blocked with a zero allowance by the redirect check.
const BLOCKED_SITE: &str = "example.com";

pub struct E2eOptions {
    pub chromedriver_url: String,
    pub extension_path: String,
    pub headless: bool,
}

pub fn run_e2e(opts: E2eOptions) -> Result<(), String> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    runtime.block_on(run_checks(opts))
}

fn capabilities(extension: &Path, headless: bool) -> Result<ChromeCapabilities, String> {
    let mut args = vec![
        format!("--disable-extensions-except={}", extension.display()),
        format!("--load-extension={}", extension.display()),
        "--no-first-run".to_string(),
    ];
    if headless {
        args.push("--headless=new".to_string());
    }

    let mut caps = ChromeCapabilities::new();
    for arg in &args {
        caps.add_arg(arg)
            .map_err(|e| format!("Failed to set chrome arg {}: {}", arg, e))?;
    }
    Ok(caps)
}

async fn run_checks(opts: E2eOptions) -> Result<(), String> {
    let extension = std::fs::canonicalize(&opts.extension_path)
        .map_err(|e| format!("Extension not found at '{}': {}", opts.extension_path, e))?;

    let driver = WebDriver::new(&opts.chromedriver_url, capabilities(&extension, opts.headless)?)
        .await
        .map_err(|e| format!("Failed to connect to chromedriver: {}", e))?;

    // Give the service worker time to register
    tokio::time::sleep(Duration::from_secs(1)).await;
    let cdp = ChromeDevTools::new(driver.handle.clone());
    let Some(id) = extension_id(&cdp).await else {
        driver.quit().await.ok();
        return Err("Extension service worker not running".to_string());
    };
    let base = format!("chrome-extension://{id}");

    let results = [
        ("popup form", check_popup_form(&driver, &base).await),
        ("popup wasm", check_popup_wasm(&driver, &base).await),
        ("block page", check_block_page(&driver, &base).await),
        ("redirect", check_redirect(&driver, &base).await),
    ];
    driver.quit().await.ok();

    let failures: Vec<String> = results
        .into_iter()
        .filter_map(|(name, result)| result.err().map(|e| format!("{name}: {e}")))
        .collect();
    if failures.is_empty() {
        println!("E2E checks passed");
        Ok(())
    } else {
        Err(format!("E2E failed:\n- {}", failures.join("\n- ")))
    }
}

/// Id of the first extension with a running background target.
async fn extension_id(cdp: &ChromeDevTools) -> Option<String> {
    let targets = cdp.execute_cdp("Target.getTargets").await.ok()?;
    targets
        .get("targetInfos")?
        .as_array()?
        .iter()
        .filter(|info| {
            matches!(
                info.get("type").and_then(Value::as_str),
                Some("service_worker" | "background_page")
            )
        })
        .filter_map(|info| info.get("url").and_then(Value::as_str))
        .filter_map(|url| url.strip_prefix("chrome-extension://"))
        .filter_map(|rest| rest.split('/').next())
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

async fn open_page(driver: &WebDriver, url: &str) -> Result<(), String> {
    driver
        .goto(url)
        .await
        .map_err(|e| format!("Failed to open {}: {}", url, e))?;
    // Module scripts initialize wasm asynchronously
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}

async fn check_popup_form(driver: &WebDriver, base: &str) -> Result<(), String> {
    open_page(driver, &format!("{base}/popup.html")).await?;
    driver
        .find(By::Id("add-site-form"))
        .await
        .map(|_| ())
        .map_err(|e| format!("Rule form missing: {}", e))
}

async fn check_popup_wasm(driver: &WebDriver, base: &str) -> Result<(), String> {
    open_page(driver, &format!("{base}/popup.html")).await?;
    let normalized = driver
        .execute(
            "return window.sitelimit?.normalize_site?.('https://www.youtube.com/watch?v=1') ?? null;",
            Vec::<Value>::new(),
        )
        .await
        .map_err(|e| format!("normalize_site failed: {}", e))?;

    match normalized.json().as_str() {
        Some("youtube.com") => Ok(()),
        other => Err(format!("Expected 'youtube.com', got {:?}", other)),
    }
}

async fn check_block_page(driver: &WebDriver, base: &str) -> Result<(), String> {
    open_page(driver, &format!("{base}/block_page.html?site=example.com&time=600&limit=10")).await?;
    let message = driver
        .find(By::Id("time-spent-message"))
        .await
        .map_err(|e| format!("Message element missing: {}", e))?
        .text()
        .await
        .map_err(|e| format!("Failed to read message: {}", e))?;

    if message.contains("10 minutes") {
        Ok(())
    } else {
        Err(format!("Unexpected block message: {:?}", message))
    }
}

/// Store a zero-minute rule from an extension page, load the site and expect
/// the background worker to send the tab to the block page on page load.
async fn check_redirect(driver: &WebDriver, base: &str) -> Result<(), String> {
    open_page(driver, &format!("{base}/popup.html")).await?;
    let rules = json!({ BLOCKED_SITE: { "limit": 0 } });
    driver
        .execute(
            "return chrome.storage.sync.set({ blockedSites: arguments[0] }).then(() => true);",
            vec![rules],
        )
        .await
        .map_err(|e| format!("Failed to store rule: {}", e))?;
    // storage.onChanged reloads the rules in the worker
    tokio::time::sleep(Duration::from_millis(500)).await;

    open_page(driver, &format!("https://www.{BLOCKED_SITE}/")).await?;
    let expected = format!("{base}/block_page.html?site={BLOCKED_SITE}&time=0&limit=0");
    for _ in 0..10 {
        let current = driver
            .current_url()
            .await
            .map_err(|e| format!("Failed to read tab URL: {}", e))?;
        if current.as_str() == expected {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    Err(format!("Tab was not redirected to {}", expected))
}
