use serde_json::Value;
use tracing::debug;

use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::types::StepDecl;

use super::{optional_str, required_str, StepKind};
use crate::context::StepContext;
use crate::table;

/// What to read from the located element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    InnerHtml,
    InputValue,
    TextContent,
    /// Inner HTML parsed into row objects.
    Table,
    /// Inner HTML parsed into rows merged into one object.
    TableFlat,
}

impl ExtractMode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "html" | "inner-html" => Some(Self::InnerHtml),
            "value" | "input-value" => Some(Self::InputValue),
            "text" | "text-content" => Some(Self::TextContent),
            "table" => Some(Self::Table),
            "table-flat" => Some(Self::TableFlat),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ExtractStep {
    locator: String,
    mode: ExtractMode,
}

/// `element` with an optional `mode` (defaults to inner HTML).
pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    let locator = required_str(decl, "element", "element")?;
    let mode = match optional_str(decl, "mode", "element")? {
        None => ExtractMode::InnerHtml,
        Some(m) if m.is_empty() => ExtractMode::InnerHtml,
        Some(m) => ExtractMode::parse(&m).ok_or_else(|| {
            ScraplineError::step_build("element", format!("unknown mode {m:?}"))
        })?,
    };
    Ok(StepKind::Extract(ExtractStep { locator, mode }))
}

/// `table`: shorthand for `element` with `mode: table`.
pub(crate) fn build_table(decl: &StepDecl) -> Result<StepKind> {
    Ok(StepKind::Extract(ExtractStep {
        locator: required_str(decl, "table", "table")?,
        mode: ExtractMode::Table,
    }))
}

impl ExtractStep {
    pub fn mode(&self) -> ExtractMode {
        self.mode
    }

    pub async fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        let locator = ctx.render(&self.locator)?;
        debug!(locator = %locator, mode = ?self.mode, "Extracting element");
        let element = ctx.driver.locate(&locator);
        let value = match self.mode {
            ExtractMode::InnerHtml => Value::String(element.inner_html().await?),
            ExtractMode::InputValue => Value::String(element.input_value().await?),
            ExtractMode::TextContent => Value::String(element.text_content().await?),
            ExtractMode::Table => {
                let rows = table::parse_table(&element.inner_html().await?);
                Value::Array(rows.into_iter().map(Value::Object).collect())
            }
            ExtractMode::TableFlat => {
                let rows = table::parse_table(&element.inner_html().await?);
                Value::Object(table::flatten(rows))
            }
        };
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use scrapline_test_utils::{decl, DriverCall, MockDriver};
    use serde_json::{json, Value};

    use crate::context::StepContext;
    use crate::steps::{StepKind, StepRegistry};
    use crate::vars::VariableStore;

    use super::ExtractMode;

    async fn run(ctx: &mut StepContext, v: Value) -> Option<Value> {
        let step = StepRegistry::with_builtins().build(decl(v)).unwrap();
        step.execute(ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_modes() {
        let mock = MockDriver::new()
            .with_html("#t", "<tr><td>a</td><td>1</td></tr><tr><td>b</td><td>2</td></tr>")
            .with_text("#t", "a1b2")
            .with_input_value("#email", "me@example.com");
        let mut ctx = StepContext::new(Arc::new(mock.clone()), VariableStore::new());

        assert_eq!(
            run(&mut ctx, json!({"element": "#email", "mode": "value"})).await,
            Some(json!("me@example.com"))
        );
        assert_eq!(
            run(&mut ctx, json!({"element": "#t", "mode": "text-content"})).await,
            Some(json!("a1b2"))
        );
        assert_eq!(
            run(&mut ctx, json!({"element": "#t", "mode": "table"})).await,
            Some(json!([{"a": "1"}, {"b": "2"}]))
        );
        assert_eq!(
            run(&mut ctx, json!({"element": "#t", "mode": "table-flat"})).await,
            Some(json!({"a": "1", "b": "2"}))
        );
        assert_eq!(
            run(&mut ctx, json!({"table": "#t"})).await,
            Some(json!([{"a": "1"}, {"b": "2"}]))
        );
        assert!(mock.calls().contains(&DriverCall::InputValue("#email".into())));
    }

    #[test]
    fn test_mode_defaults_and_aliases() {
        let registry = StepRegistry::with_builtins();
        let mode = |v: Value| match registry.build(decl(v)).unwrap().kind() {
            StepKind::Extract(e) => e.mode(),
            other => panic!("expected extract, got {other:?}"),
        };
        assert_eq!(mode(json!({"element": "#a"})), ExtractMode::InnerHtml);
        assert_eq!(mode(json!({"element": "#a", "mode": "input-value"})), ExtractMode::InputValue);
        assert_eq!(mode(json!({"element": "#a", "mode": "text"})), ExtractMode::TextContent);
        assert!(registry.build(decl(json!({"element": "#a", "mode": "xml"}))).is_err());
    }
}
