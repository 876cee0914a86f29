use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::types::StepDecl;

use super::StepKind;
use crate::context::StepContext;

/// Page defaults changed at run time, in milliseconds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageConfig {
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub nav_timeout: Option<f64>,
}

/// `config: {timeout, nav_timeout}`.
#[derive(Debug)]
pub struct PageConfigStep {
    config: PageConfig,
}

pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    let config = match decl.get("config") {
        Some(v @ Value::Object(_)) => serde_json::from_value(v.clone())
            .map_err(|e| ScraplineError::step_build("config", e))?,
        Some(other) => {
            return Err(ScraplineError::step_build(
                "config",
                format!("`config` must be an object, got: {other}"),
            ))
        }
        None => PageConfig::default(),
    };
    Ok(StepKind::PageConfig(PageConfigStep { config }))
}

impl PageConfigStep {
    pub async fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        if let Some(ms) = self.config.timeout {
            debug!(ms, "Setting default timeout");
            ctx.driver.set_default_timeout(ms).await?;
        }
        if let Some(ms) = self.config.nav_timeout {
            debug!(ms, "Setting default navigation timeout");
            ctx.driver.set_default_navigation_timeout(ms).await?;
        }
        Ok(None)
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
    async fn test_sets_both_timeouts() {
        let mock = MockDriver::new();
        let mut ctx = StepContext::new(Arc::new(mock.clone()), VariableStore::new());
        let step = StepRegistry::with_builtins()
            .build(decl(json!({"config": {"timeout": 100, "nav_timeout": 200}})))
            .unwrap();

        assert_eq!(step.execute(&mut ctx).await.unwrap(), None);
        assert_eq!(
            mock.calls(),
            vec![
                DriverCall::SetDefaultTimeout(100.0),
                DriverCall::SetDefaultNavigationTimeout(200.0),
            ]
        );
    }

    #[test]
    fn test_unknown_keys_fail_at_build() {
        let registry = StepRegistry::with_builtins();
        assert!(registry.build(decl(json!({"config": {"timeot": 1}}))).is_err());
        assert!(registry.build(decl(json!({"config": "fast"}))).is_err());
    }
}
