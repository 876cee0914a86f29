use std::sync::Arc;

use futures::future::BoxFuture;

use crate::config::BrowserLaunch;
use crate::error::Result;
use crate::types::*;

/// The remote-controllable page a pipeline runs against.
///
/// Not safe for concurrent use: the engine drives one instance from a single
/// task at a time.
pub trait BrowserDriver: Send + Sync + 'static {
    /// Navigate the page to `url`.
    fn navigate(
        &self,
        url: String,
        opts: NavigateOptions,
    ) -> BoxFuture<'_, Result<Option<NavigationResponse>>>;

    /// Resolve a selector into a locator handle. Locating is lazy; failures
    /// surface when the locator is acted upon.
    fn locate(&self, selector: &str) -> Box<dyn Locator>;

    /// Evaluate a script in the page and return its JSON-serialisable result.
    fn evaluate(
        &self,
        script: String,
        opts: EvaluateOptions,
    ) -> BoxFuture<'_, Result<serde_json::Value>>;

    /// Default timeout for actions, in milliseconds.
    fn set_default_timeout(&self, ms: f64) -> BoxFuture<'_, Result<()>>;

    /// Default timeout for navigations, in milliseconds.
    fn set_default_navigation_timeout(&self, ms: f64) -> BoxFuture<'_, Result<()>>;

    /// Raw mouse control at page coordinates.
    fn mouse(&self) -> &dyn Mouse;

    /// Release the page and its browser.
    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// A handle on the elements matched by one selector.
pub trait Locator: Send + Sync {
    fn selector(&self) -> &str;

    fn click(&self, opts: ClickOptions) -> BoxFuture<'_, Result<()>>;

    fn fill(&self, value: String, opts: FillOptions) -> BoxFuture<'_, Result<()>>;

    /// Select options; returns the values that ended up selected.
    fn select_option(
        &self,
        values: SelectValues,
        opts: SelectOptions,
    ) -> BoxFuture<'_, Result<Vec<String>>>;

    fn inner_html(&self) -> BoxFuture<'_, Result<String>>;

    fn input_value(&self) -> BoxFuture<'_, Result<String>>;

    fn text_content(&self) -> BoxFuture<'_, Result<String>>;

    fn screenshot(&self, opts: ScreenshotOptions) -> BoxFuture<'_, Result<Vec<u8>>>;

    /// Evaluate a script with the matched element as its argument.
    fn evaluate(
        &self,
        script: String,
        opts: EvaluateOptions,
    ) -> BoxFuture<'_, Result<serde_json::Value>>;
}

/// Mouse capability of a page.
pub trait Mouse: Send + Sync {
    fn click(&self, x: f64, y: f64) -> BoxFuture<'_, Result<()>>;

    fn dblclick(&self, x: f64, y: f64) -> BoxFuture<'_, Result<()>>;

    fn move_to(&self, x: f64, y: f64) -> BoxFuture<'_, Result<()>>;

    /// Scroll by the given deltas.
    fn wheel(&self, delta_x: f64, delta_y: f64) -> BoxFuture<'_, Result<()>>;

    fn down(&self) -> BoxFuture<'_, Result<()>>;

    fn up(&self) -> BoxFuture<'_, Result<()>>;
}

/// Provisions a fresh driver for one pipeline execution or session.
pub trait DriverFactory: Send + Sync + 'static {
    fn launch(&self, launch: BrowserLaunch) -> BoxFuture<'_, Result<Arc<dyn BrowserDriver>>>;
}
