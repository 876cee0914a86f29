use serde_json::Value;
use tracing::debug;

use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::types::{FillOptions, StepDecl};

use super::{load_params, optional_str, required_str, StepKind};
use crate::context::StepContext;

/// Where the text typed into a field comes from.
#[derive(Debug)]
enum FillSource {
    /// A template.
    Value(String),
    /// A variable that must be defined when the step runs.
    Var(String),
}

#[derive(Debug)]
pub struct FillStep {
    locator: String,
    source: FillSource,
    params: FillOptions,
}

pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    let locator = required_str(decl, "fill", "fill")?;
    let source = match (optional_str(decl, "value", "fill")?, optional_str(decl, "var", "fill")?) {
        (Some(value), _) => FillSource::Value(value),
        (None, Some(var)) => FillSource::Var(var),
        (None, None) => {
            return Err(ScraplineError::step_build(
                "fill",
                "needs either `value` or `var`",
            ))
        }
    };
    Ok(StepKind::Fill(FillStep {
        locator,
        source,
        params: load_params(decl, "fill")?,
    }))
}

impl FillStep {
    pub async fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        let locator = ctx.render(&self.locator)?;
        let value = match &self.source {
            FillSource::Value(tmpl) => ctx.render(tmpl)?,
            FillSource::Var(name) => ctx.vars.get_or_fail(name)?,
        };
        debug!(locator = %locator, "Filling element");
        ctx.driver
            .locate(&locator)
            .fill(value, self.params.clone())
            .await?;
        Ok(None)
    }
}
