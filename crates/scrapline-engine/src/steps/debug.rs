use serde_json::Value;
use tracing::{info, warn};

use scrapline_core::error::Result;
use scrapline_core::types::StepDecl;

use super::{required_str, StepKind};
use crate::context::StepContext;

/// `debug`: render a template and log it.
#[derive(Debug)]
pub struct DebugStep {
    text: String,
}

pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    Ok(StepKind::Debug(DebugStep {
        text: required_str(decl, "debug", "debug")?,
    }))
}

impl DebugStep {
    /// A render failure is logged and yields no value.
    pub fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        match ctx.render(&self.text) {
            Ok(text) => {
                info!(text = %text, "debug");
                Ok(Some(Value::String(text)))
            }
            Err(e) => {
                warn!(template = %self.text, error = %e, "debug template failed");
                Ok(None)
            }
        }
    }
}
