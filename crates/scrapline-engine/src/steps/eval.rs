use serde_json::Value;
use tracing::debug;

use scrapline_core::error::Result;
use scrapline_core::types::{EvaluateOptions, StepDecl};

use super::{load_params, optional_str, required_str, StepKind};
use crate::context::StepContext;

/// `eval`: run a script in the page, or against `locator` when one is given.
#[derive(Debug)]
pub struct EvalStep {
    script: String,
    locator: Option<String>,
    params: EvaluateOptions,
}

pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    Ok(StepKind::Eval(EvalStep {
        script: required_str(decl, "eval", "eval")?,
        locator: optional_str(decl, "locator", "eval")?,
        params: load_params(decl, "eval")?,
    }))
}

impl EvalStep {
    pub async fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        let script = ctx.render(&self.script)?;
        let locator = match &self.locator {
            Some(l) => ctx.render(l)?,
            None => String::new(),
        };

        let value = if locator.is_empty() {
            debug!("Evaluating script in page");
            ctx.driver.evaluate(script, self.params.clone()).await?
        } else {
            debug!(locator = %locator, "Evaluating script on element");
            ctx.driver
                .locate(&locator)
                .evaluate(script, self.params.clone())
                .await?
        };
        Ok(Some(value))
    }
}
