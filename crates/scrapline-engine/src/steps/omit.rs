use serde_json::Value;
use tracing::debug;

use scrapline_core::error::Result;
use scrapline_core::types::StepDecl;

use super::{required_str, StepKind};
use crate::context::StepContext;

/// `omit`: forget a variable and drop it from the result.
#[derive(Debug)]
pub struct OmitStep {
    name: String,
}

pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    Ok(StepKind::Omit(OmitStep {
        name: required_str(decl, "omit", "omit")?,
    }))
}

impl OmitStep {
    pub fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        let name = ctx.render(&self.name)?;
        let from_vars = ctx.vars.remove(&name);
        let from_result = ctx.result.remove(&name);
        debug!(name = %name, from_vars, from_result, "Omitted");
        Ok(None)
    }
}
