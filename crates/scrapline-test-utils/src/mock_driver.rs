use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::Value;

use scrapline_core::config::BrowserLaunch;
use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::traits::{BrowserDriver, DriverFactory, Locator, Mouse};
use scrapline_core::types::*;

/// Driver capability a [`MockDriver`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverAction {
    Navigate,
    Click,
    Fill,
    SelectOption,
    InnerHtml,
    InputValue,
    TextContent,
    Screenshot,
    Evaluate,
    SetTimeout,
    Mouse,
    Close,
}

impl DriverAction {
    fn label(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::Fill => "fill",
            Self::SelectOption => "select_option",
            Self::InnerHtml => "inner_html",
            Self::InputValue => "input_value",
            Self::TextContent => "text_content",
            Self::Screenshot => "screenshot",
            Self::Evaluate => "evaluate",
            Self::SetTimeout => "set_timeout",
            Self::Mouse => "mouse",
            Self::Close => "close",
        }
    }
}

/// One recorded driver invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Navigate(String),
    Click(String),
    Fill { selector: String, value: String },
    SelectOption { selector: String, values: SelectValues },
    InnerHtml(String),
    InputValue(String),
    TextContent(String),
    Screenshot(String),
    Evaluate { selector: Option<String>, script: String },
    SetDefaultTimeout(f64),
    SetDefaultNavigationTimeout(f64),
    MouseClick { x: f64, y: f64 },
    MouseDblclick { x: f64, y: f64 },
    MouseMove { x: f64, y: f64 },
    MouseWheel { dx: f64, dy: f64 },
    MouseDown,
    MouseUp,
    Close,
}

#[derive(Default)]
struct MockState {
    calls: Vec<DriverCall>,
    html: HashMap<String, String>,
    text: HashMap<String, String>,
    values: HashMap<String, String>,
    evals: HashMap<String, Value>,
    screenshot: Vec<u8>,
    failing: HashSet<DriverAction>,
}

type Shared = Arc<Mutex<MockState>>;

fn record(state: &Shared, action: DriverAction, call: DriverCall) -> Result<()> {
    let mut s = state.lock().unwrap();
    s.calls.push(call);
    if s.failing.contains(&action) {
        return Err(ScraplineError::driver(action.label(), "mock failure"));
    }
    Ok(())
}

/// A scriptable, call-recording [`BrowserDriver`].
///
/// Clones share state, so a test can keep one clone and hand another to the
/// engine.
#[derive(Clone)]
pub struct MockDriver {
    state: Shared,
    mouse: MockMouse,
}

impl MockDriver {
    pub fn new() -> Self {
        let state: Shared = Arc::default();
        Self {
            mouse: MockMouse {
                state: Arc::clone(&state),
            },
            state,
        }
    }

    /// Inner HTML returned for `selector`.
    pub fn with_html(self, selector: &str, html: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .html
            .insert(selector.into(), html.into());
        self
    }

    /// Text content returned for `selector`.
    pub fn with_text(self, selector: &str, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .text
            .insert(selector.into(), text.into());
        self
    }

    /// Input value returned for `selector`.
    pub fn with_input_value(self, selector: &str, value: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .values
            .insert(selector.into(), value.into());
        self
    }

    /// Result of evaluating `script`, page- or element-scoped. Unknown
    /// scripts evaluate to `null`.
    pub fn with_eval(self, script: &str, result: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .evals
            .insert(script.into(), result);
        self
    }

    pub fn with_screenshot(self, bytes: &[u8]) -> Self {
        self.state.lock().unwrap().screenshot = bytes.to_vec();
        self
    }

    /// Make every call of `action` fail with a driver error.
    pub fn failing_on(self, action: DriverAction) -> Self {
        self.state.lock().unwrap().failing.insert(action);
        self
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Scripts passed to `evaluate`, in call order.
    pub fn evaluated_scripts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DriverCall::Evaluate { script, .. } => Some(script),
                _ => None,
            })
            .collect()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserDriver for MockDriver {
    fn navigate(
        &self,
        url: String,
        _opts: NavigateOptions,
    ) -> BoxFuture<'_, Result<Option<NavigationResponse>>> {
        Box::pin(async move {
            record(&self.state, DriverAction::Navigate, DriverCall::Navigate(url.clone()))?;
            Ok(Some(NavigationResponse {
                url,
                status: Some(200),
            }))
        })
    }

    fn locate(&self, selector: &str) -> Box<dyn Locator> {
        Box::new(MockLocator {
            selector: selector.to_string(),
            state: Arc::clone(&self.state),
        })
    }

    fn evaluate(&self, script: String, _opts: EvaluateOptions) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            record(
                &self.state,
                DriverAction::Evaluate,
                DriverCall::Evaluate {
                    selector: None,
                    script: script.clone(),
                },
            )?;
            Ok(lookup_eval(&self.state, &script))
        })
    }

    fn set_default_timeout(&self, ms: f64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            record(&self.state, DriverAction::SetTimeout, DriverCall::SetDefaultTimeout(ms))
        })
    }

    fn set_default_navigation_timeout(&self, ms: f64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            record(
                &self.state,
                DriverAction::SetTimeout,
                DriverCall::SetDefaultNavigationTimeout(ms),
            )
        })
    }

    fn mouse(&self) -> &dyn Mouse {
        &self.mouse
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { record(&self.state, DriverAction::Close, DriverCall::Close) })
    }
}

fn lookup_eval(state: &Shared, script: &str) -> Value {
    state
        .lock()
        .unwrap()
        .evals
        .get(script)
        .cloned()
        .unwrap_or(Value::Null)
}

struct MockLocator {
    selector: String,
    state: Shared,
}

impl MockLocator {
    fn read(
        &self,
        action: DriverAction,
        call: DriverCall,
        pick: fn(&MockState) -> &HashMap<String, String>,
    ) -> Result<String> {
        record(&self.state, action, call)?;
        let state = self.state.lock().unwrap();
        pick(&state).get(&self.selector).cloned().ok_or_else(|| {
            ScraplineError::driver(
                action.label(),
                format!("no element matches {:?}", self.selector),
            )
        })
    }
}

impl Locator for MockLocator {
    fn selector(&self) -> &str {
        &self.selector
    }

    fn click(&self, _opts: ClickOptions) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            record(&self.state, DriverAction::Click, DriverCall::Click(self.selector.clone()))
        })
    }

    fn fill(&self, value: String, _opts: FillOptions) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            record(
                &self.state,
                DriverAction::Fill,
                DriverCall::Fill {
                    selector: self.selector.clone(),
                    value,
                },
            )
        })
    }

    fn select_option(
        &self,
        values: SelectValues,
        _opts: SelectOptions,
    ) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            record(
                &self.state,
                DriverAction::SelectOption,
                DriverCall::SelectOption {
                    selector: self.selector.clone(),
                    values: values.clone(),
                },
            )?;
            let mut selected = values.values;
            selected.extend(values.labels);
            selected.extend(values.values_or_labels);
            selected.extend(values.indexes.iter().map(|i| i.to_string()));
            Ok(selected)
        })
    }

    fn inner_html(&self) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            self.read(
                DriverAction::InnerHtml,
                DriverCall::InnerHtml(self.selector.clone()),
                |s| &s.html,
            )
        })
    }

    fn input_value(&self) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            self.read(
                DriverAction::InputValue,
                DriverCall::InputValue(self.selector.clone()),
                |s| &s.values,
            )
        })
    }

    fn text_content(&self) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            self.read(
                DriverAction::TextContent,
                DriverCall::TextContent(self.selector.clone()),
                |s| &s.text,
            )
        })
    }

    fn screenshot(&self, _opts: ScreenshotOptions) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            record(
                &self.state,
                DriverAction::Screenshot,
                DriverCall::Screenshot(self.selector.clone()),
            )?;
            Ok(self.state.lock().unwrap().screenshot.clone())
        })
    }

    fn evaluate(&self, script: String, _opts: EvaluateOptions) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            record(
                &self.state,
                DriverAction::Evaluate,
                DriverCall::Evaluate {
                    selector: Some(self.selector.clone()),
                    script: script.clone(),
                },
            )?;
            Ok(lookup_eval(&self.state, &script))
        })
    }
}

#[derive(Clone, Default)]
struct MockMouse {
    state: Shared,
}

impl Mouse for MockMouse {
    fn click(&self, x: f64, y: f64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { record(&self.state, DriverAction::Mouse, DriverCall::MouseClick { x, y }) })
    }

    fn dblclick(&self, x: f64, y: f64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            record(&self.state, DriverAction::Mouse, DriverCall::MouseDblclick { x, y })
        })
    }

    fn move_to(&self, x: f64, y: f64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { record(&self.state, DriverAction::Mouse, DriverCall::MouseMove { x, y }) })
    }

    fn wheel(&self, dx: f64, dy: f64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            record(&self.state, DriverAction::Mouse, DriverCall::MouseWheel { dx, dy })
        })
    }

    fn down(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { record(&self.state, DriverAction::Mouse, DriverCall::MouseDown) })
    }

    fn up(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { record(&self.state, DriverAction::Mouse, DriverCall::MouseUp) })
    }
}

/// Hands out clones of one [`MockDriver`], or fails every launch.
pub struct MockDriverFactory {
    driver: Option<MockDriver>,
    error: String,
    launches: Mutex<Vec<BrowserLaunch>>,
}

impl MockDriverFactory {
    pub fn new(driver: MockDriver) -> Self {
        Self {
            driver: Some(driver),
            error: String::new(),
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            driver: None,
            error: message.to_string(),
            launches: Mutex::new(Vec::new()),
        }
    }

    /// Every launch request seen so far.
    pub fn launches(&self) -> Vec<BrowserLaunch> {
        self.launches.lock().unwrap().clone()
    }
}

impl DriverFactory for MockDriverFactory {
    fn launch(&self, launch: BrowserLaunch) -> BoxFuture<'_, Result<Arc<dyn BrowserDriver>>> {
        Box::pin(async move {
            self.launches.lock().unwrap().push(launch);
            match &self.driver {
                Some(driver) => Ok(Arc::new(driver.clone()) as Arc<dyn BrowserDriver>),
                None => Err(ScraplineError::driver("launch", &self.error)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_records_calls_and_scripted_reads() {
        let mock = MockDriver::new()
            .with_html("#t", "<tr></tr>")
            .with_eval("1+1", json!(2));
        let driver: Arc<dyn BrowserDriver> = Arc::new(mock.clone());

        assert_eq!(driver.locate("#t").inner_html().await.unwrap(), "<tr></tr>");
        assert!(driver.locate("#nope").text_content().await.is_err());
        assert_eq!(driver.evaluate("1+1".into(), Default::default()).await.unwrap(), json!(2));
        driver.mouse().wheel(0.0, 120.0).await.unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                DriverCall::InnerHtml("#t".into()),
                DriverCall::TextContent("#nope".into()),
                DriverCall::Evaluate {
                    selector: None,
                    script: "1+1".into()
                },
                DriverCall::MouseWheel { dx: 0.0, dy: 120.0 },
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_action() {
        let mock = MockDriver::new().failing_on(DriverAction::Click);
        let err = mock.locate("#a").click(Default::default()).await.unwrap_err();
        assert!(matches!(err, ScraplineError::Driver { ref action, .. } if action == "click"));
        assert_eq!(mock.calls(), vec![DriverCall::Click("#a".into())]);
    }
}
