use std::sync::Arc;

use scrapline_core::error::Result;
use scrapline_core::traits::BrowserDriver;
use scrapline_core::types::ResultMap;

use crate::template;
use crate::vars::VariableStore;

/// Everything a step touches while it runs.
///
/// One context per batch execution or session; the driver inside is only
/// ever used from the task that owns the context.
pub struct StepContext {
    pub driver: Arc<dyn BrowserDriver>,
    pub vars: VariableStore,
    pub result: ResultMap,
}

impl StepContext {
    pub fn new(driver: Arc<dyn BrowserDriver>, vars: VariableStore) -> Self {
        Self {
            driver,
            vars,
            result: ResultMap::new(),
        }
    }

    /// Expand a template against this context's variables and page.
    pub fn render(&self, text: &str) -> Result<String> {
        template::evaluate(text, &self.vars, &self.driver)
    }

    pub fn render_all(&self, texts: &[String]) -> Result<Vec<String>> {
        template::evaluate_all(texts, &self.vars, &self.driver)
    }

    /// Hand back the accumulated result, leaving an empty one in its place.
    pub fn take_result(&mut self) -> ResultMap {
        std::mem::take(&mut self.result)
    }
}
