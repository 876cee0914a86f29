use serde_json::Value;

use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::types::StepDecl;

use super::{optional_str, StepKind};
use crate::context::StepContext;

/// `nop`: render its text and return it. Also anchors bare `loop` declarations.
#[derive(Debug)]
pub struct NopStep {
    text: String,
}

pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    let text = match optional_str(decl, "nop", "nop")? {
        Some(text) => text,
        None => match decl.get("loop") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(ScraplineError::step_build("nop", "needs `nop` or `loop`")),
        },
    };
    Ok(StepKind::Nop(NopStep { text }))
}

impl NopStep {
    pub fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        ctx.render(&self.text).map(|t| Some(Value::String(t)))
    }
}
