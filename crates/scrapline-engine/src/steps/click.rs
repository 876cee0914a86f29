use serde_json::Value;
use tracing::debug;

use scrapline_core::error::Result;
use scrapline_core::types::{ClickOptions, StepDecl};

use super::{load_params, required_str, StepKind};
use crate::context::StepContext;

#[derive(Debug)]
pub struct ClickStep {
    locator: String,
    params: ClickOptions,
}

pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    Ok(StepKind::Click(ClickStep {
        locator: required_str(decl, "click", "click")?,
        params: load_params(decl, "click")?,
    }))
}

impl ClickStep {
    pub async fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        let locator = ctx.render(&self.locator)?;
        debug!(locator = %locator, "Clicking element");
        ctx.driver.locate(&locator).click(self.params.clone()).await?;
        Ok(None)
    }
}
