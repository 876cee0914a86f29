use serde_json::Value;
use tracing::info;

use scrapline_core::error::Result;
use scrapline_core::types::{NavigateOptions, StepDecl};

use super::{load_params, required_str, StepKind};
use crate::context::StepContext;

/// `goto`: load a URL in the page.
#[derive(Debug)]
pub struct NavigateStep {
    url: String,
    params: NavigateOptions,
}

pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    Ok(StepKind::Navigate(NavigateStep {
        url: required_str(decl, "goto", "goto")?,
        params: load_params(decl, "goto")?,
    }))
}

impl NavigateStep {
    pub async fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        let url = ctx.render(&self.url)?;
        info!(url = %url, "Navigating");
        let response = ctx.driver.navigate(url, self.params.clone()).await?;
        Ok(match response {
            Some(resp) => Some(serde_json::to_value(resp)?),
            None => None,
        })
    }
}
