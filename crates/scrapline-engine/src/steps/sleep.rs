use serde_json::Value;
use tracing::debug;

use scrapline_core::duration::parse_duration;
use scrapline_core::error::Result;
use scrapline_core::types::StepDecl;

use super::{required_str, StepKind};
use crate::context::StepContext;
use crate::template;

/// `sleep`: pause for a duration such as `"1.5s"` or `"250ms"`.
#[derive(Debug)]
pub struct SleepStep {
    duration: String,
}

pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    let duration = required_str(decl, "sleep", "sleep")?;
    if !template::has_markup(&duration) {
        parse_duration(&duration)?;
    }
    Ok(StepKind::Sleep(SleepStep { duration }))
}

impl SleepStep {
    pub async fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        let wait = parse_duration(&ctx.render(&self.duration)?)?;
        debug!(?wait, "Sleeping");
        tokio::time::sleep(wait).await;
        Ok(None)
    }
}
