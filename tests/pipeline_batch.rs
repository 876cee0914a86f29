use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use scrapline_core::error::ScraplineError;
use scrapline_engine::Engine;
use scrapline_test_utils::{document, DriverAction, DriverCall, MockDriver, MockDriverFactory};

const PRICES: &str = "<table>\
    <tr><th>Item</th><th>Price</th></tr>\
    <tr><td>Tea</td><td>3</td></tr>\
    <tr><td>Cake</td><td>5</td></tr>\
</table>";

fn engine(mock: &MockDriver) -> Engine {
    Engine::new(Arc::new(MockDriverFactory::new(mock.clone())))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shop_pipeline_end_to_end() {
    let mock = MockDriver::new()
        .with_html("#prices", PRICES)
        .with_text("#status", "open")
        .with_eval("document.title", json!("Corner Shop"));

    let cfg = document(json!({"pipeline": {
        "vars": [
            {"name": "base", "value": "https://shop.test"},
            {"name": "visit", "random": "once", "random_length": 6}
        ],
        "steps": [
            {"goto": "{{ base }}/menu?ref={{ visit }}"},
            {"element": "#status", "mode": "text", "set-var": "status"},
            {"nop": "{{ eval('document.title') }}", "set-var": "title"},
            {"table": "#prices", "set-var": "prices"},
            {"element": "#prices", "set-var": "flat", "parse-mode": "table-flat"},
            {"loop": "[\"tea\", \"cake\"]", "steps": [
                {"nop": "order {{ item }}", "set-var": "orders"},
                {"click": "#add-{{ item }}"}
            ]},
            {"if": "status is closed", "nop": "skipped", "set-var": "never"},
            {"if": "status is open", "fill": "#note", "value": "thanks"}
        ]
    }}));

    let result = engine(&mock)
        .execute(&cfg, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.get("status"), Some(json!("open")));
    assert_eq!(result.get("title"), Some(json!("Corner Shop")));
    assert_eq!(
        result.get("prices"),
        Some(json!([
            {"Item": "Tea", "Price": "3"},
            {"Item": "Cake", "Price": "5"}
        ]))
    );
    assert_eq!(result.get("flat"), Some(json!({"Item": "Cake", "Price": "5"})));
    assert_eq!(result.get("orders"), Some(json!(["order tea", "order cake"])));
    assert!(!result.contains_key("never"));

    let calls = mock.calls();
    let DriverCall::Navigate(url) = &calls[0] else {
        panic!("first call should navigate, got {:?}", calls[0]);
    };
    let token = url.strip_prefix("https://shop.test/menu?ref=").unwrap();
    assert_eq!(token.len(), 6);
    assert!(calls.contains(&DriverCall::Click("#add-tea".into())));
    assert!(calls.contains(&DriverCall::Click("#add-cake".into())));
    assert!(calls.contains(&DriverCall::Fill {
        selector: "#note".into(),
        value: "thanks".into()
    }));
    assert_eq!(calls.last(), Some(&DriverCall::Close));
}

#[tokio::test]
async fn test_error_policies_keep_the_run_alive() {
    let mock = MockDriver::new().failing_on(DriverAction::Click);
    let cfg = document(json!({"pipeline": {"steps": [
        {"click": "#a", "on-error": "ignore"},
        {"click": "#b", "on-error": "print"},
        {"nop": "done", "set-var": "state"}
    ]}}));

    let result = engine(&mock)
        .execute(&cfg, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.get("state"), Some(json!("done")));
}

#[tokio::test]
async fn test_failed_guard_can_be_an_error() {
    let mock = MockDriver::new();
    let cfg = document(json!({"pipeline": {
        "vars": [{"name": "mode", "value": "dry"}],
        "steps": [{"if": "mode is live", "on-skip": "error", "nop": "x"}]
    }}));

    let err = engine(&mock)
        .execute(&cfg, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ScraplineError::ConditionFailed(_)));
    assert_eq!(mock.calls(), vec![DriverCall::Close]);
}

#[tokio::test]
async fn test_omit_drops_result_and_variable() {
    let mock = MockDriver::new();
    let cfg = document(json!({"pipeline": {"steps": [
        {"nop": "secret", "set-var": "token"},
        {"omit": "token"},
        {"nop": "[{{ token }}]", "set-var": "after"}
    ]}}));

    let result = engine(&mock)
        .execute(&cfg, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!result.contains_key("token"));
    assert_eq!(result.get("after"), Some(json!("[]")));
}
