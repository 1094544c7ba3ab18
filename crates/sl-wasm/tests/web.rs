//! Browser-side checks, run with `wasm-pack test --headless --chrome`.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

use sl_wasm::{block_message, list_rules_js, match_rule_js, normalize_site, SiteLimiter};

wasm_bindgen_test_configure!(run_in_browser);

fn json(text: &str) -> JsValue {
    js_sys::JSON::parse(text).unwrap()
}

fn get(target: &JsValue, key: &str) -> JsValue {
    js_sys::Reflect::get(target, &key.into()).unwrap()
}

#[wasm_bindgen_test]
fn normalizes_form_input() {
    assert_eq!(normalize_site("https://www.youtube.com/watch").as_deref(), Some("youtube.com"));
    assert_eq!(normalize_site("localhost"), None);
}

#[wasm_bindgen_test]
fn matches_parent_rule() {
    let rules = json(r#"{"bilibili.com":{"limit":5}}"#);
    assert_eq!(
        match_rule_js("live.bilibili.com", rules).unwrap().as_deref(),
        Some("bilibili.com")
    );
}

#[wasm_bindgen_test]
fn tick_reports_redirect() {
    let limiter = SiteLimiter::new("chrome-extension://id/block_page.html");
    limiter.load_rules(json(r#"{"example.com":{"limit":1}}"#)).unwrap();

    let result = limiter
        .tick(json(r#"{"id":5,"url":"https://example.com/"}"#))
        .unwrap();

    assert_eq!(get(&result, "outcome").as_string().as_deref(), Some("blocked"));
    assert_eq!(get(&result, "usageChanged").as_bool(), Some(true));
    let redirect = get(&result, "redirect");
    assert_eq!(get(&redirect, "tabId").as_f64(), Some(5.0));
    assert_eq!(
        get(&redirect, "url").as_string().as_deref(),
        Some("chrome-extension://id/block_page.html?site=example.com&time=60&limit=1")
    );
}

#[wasm_bindgen_test]
fn tick_without_tab_is_skipped() {
    let limiter = SiteLimiter::new("block_page.html");
    let result = limiter.tick(JsValue::NULL).unwrap();
    assert_eq!(get(&result, "reason").as_string().as_deref(), Some("noActiveTab"));
    assert_eq!(get(&result, "usageChanged").as_bool(), Some(false));
}

#[wasm_bindgen_test]
fn lists_rules() {
    let rows = list_rules_js(
        json(r#"{"b.com":{"limit":5},"a.com":{"limit":1}}"#),
        json(r#"{"b.com":120}"#),
    )
    .unwrap();
    let rows = js_sys::Array::from(&rows);
    assert_eq!(rows.length(), 2);
    assert_eq!(get(&rows.get(0), "site").as_string().as_deref(), Some("a.com"));
    assert_eq!(get(&rows.get(1), "usedMinutes").as_f64(), Some(2.0));
}

#[wasm_bindgen_test]
fn renders_block_message() {
    assert!(block_message("?site=a.com&time=0&limit=0").contains("no daily allowance"));
}
