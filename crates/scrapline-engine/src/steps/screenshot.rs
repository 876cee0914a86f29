use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use tracing::debug;

use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::types::{ScreenshotOptions, StepDecl};

use super::{load_params, required_str, StepKind};
use crate::context::StepContext;

/// `screenshot`: capture an element, returned base64-encoded.
#[derive(Debug)]
pub struct ScreenshotStep {
    locator: String,
    params: ScreenshotOptions,
}

pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    Ok(StepKind::Screenshot(ScreenshotStep {
        locator: required_str(decl, "screenshot", "screenshot")?,
        params: load_params(decl, "screenshot")?,
    }))
}

impl ScreenshotStep {
    pub async fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        let locator = ctx.render(&self.locator)?;
        if locator.trim().is_empty() {
            return Err(ScraplineError::StepExecution {
                step: "screenshot".into(),
                message: "locator rendered empty".into(),
            });
        }
        let bytes = ctx
            .driver
            .locate(&locator)
            .screenshot(self.params.clone())
            .await?;
        debug!(locator = %locator, bytes = bytes.len(), "Captured screenshot");
        Ok(Some(Value::String(STANDARD.encode(bytes))))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use scrapline_test_utils::{decl, DriverCall, MockDriver};
    use serde_json::json;

    use crate::context::StepContext;
    use crate::steps::StepRegistry;
    use crate::vars::VariableStore;

    #[tokio::test]
    async fn test_returns_base64() {
        let mock = MockDriver::new().with_screenshot(b"png!");
        let mut ctx = StepContext::new(Arc::new(mock.clone()), VariableStore::new());
        let step = StepRegistry::with_builtins()
            .build(decl(json!({"screenshot": "#chart"})))
            .unwrap();

        assert_eq!(step.execute(&mut ctx).await.unwrap(), Some(json!("cG5nIQ==")));
        assert_eq!(mock.calls(), vec![DriverCall::Screenshot("#chart".into())]);
    }

    #[tokio::test]
    async fn test_empty_locator_is_rejected() {
        let mock = MockDriver::new();
        let mut ctx = StepContext::new(Arc::new(mock.clone()), VariableStore::new());
        let step = StepRegistry::with_builtins()
            .build(decl(json!({"screenshot": "{{ missing }}"})))
            .unwrap();

        assert!(step.execute(&mut ctx).await.is_err());
        assert!(mock.calls().is_empty());
    }
}
