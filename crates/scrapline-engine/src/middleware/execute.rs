use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, error};

use scrapline_core::error::{Result, ScraplineError};

use super::{Middleware, Next};
use crate::context::StepContext;
use crate::steps::{ParseMode, Step};
use crate::table;

/// Terminal middleware: runs the step and stores its value under `set-var`.
pub struct ExecuteMiddleware;

impl Middleware for ExecuteMiddleware {
    fn name(&self) -> &'static str {
        "execute"
    }

    fn is_terminal(&self) -> bool {
        true
    }

    fn handle<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a mut StepContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !next.is_end() {
                return Err(ScraplineError::ChainMisconfigured(
                    "middleware found after execute".into(),
                ));
            }

            let value = step.execute(ctx).await.map_err(|e| {
                error!(step = %step.config(), error = %e, "Step execution failed");
                e
            })?;

            let Some(key) = &step.policy().set_var else {
                return Ok(());
            };
            let key = ctx.render(key)?;
            let value = parse_output(
                value.unwrap_or(Value::Null),
                step.policy().parse_mode.unwrap_or_default(),
                step.kind_name(),
            )?;

            if let Some(text) = mirror_text(&value) {
                ctx.vars.set_once(&key, text);
            }
            debug!(key = %key, "Stored step output");
            ctx.result.store(key, value);
            Ok(())
        })
    }
}

/// Convert raw step output according to `parse-mode`.
fn parse_output(value: Value, mode: ParseMode, step: &str) -> Result<Value> {
    let failed = |message: String| ScraplineError::StepExecution {
        step: step.to_string(),
        message,
    };
    match (mode, value) {
        (ParseMode::Text, v) => Ok(v),
        (ParseMode::Table, Value::String(html)) => Ok(Value::Array(
            table::parse_table(&html)
                .into_iter()
                .map(Value::Object)
                .collect(),
        )),
        (ParseMode::TableFlat, Value::String(html)) => {
            Ok(Value::Object(table::flatten(table::parse_table(&html))))
        }
        (ParseMode::TableFlat, Value::Array(rows)) => {
            let rows = rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(obj) => Ok(obj),
                    other => Err(failed(format!("table-flat expects row objects, got: {other}"))),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Object(table::flatten(rows)))
        }
        (ParseMode::Json, Value::String(s)) => serde_json::from_str(&s)
            .map_err(|e| failed(format!("output is not valid JSON: {e}"))),
        (ParseMode::Table, v @ Value::Array(_))
        | (ParseMode::TableFlat, v @ Value::Object(_))
        | (ParseMode::Json, v) => Ok(v),
        (mode, other) => Err(failed(format!("cannot apply {mode:?} to {other}"))),
    }
}

/// The string a stored value is visible as in the variable store.
fn mirror_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_modes() {
        let html = json!("<tr><th>A</th></tr><tr><td>1</td></tr>");
        assert_eq!(parse_output(html.clone(), ParseMode::Text, "t").unwrap(), html);
        assert_eq!(
            parse_output(html.clone(), ParseMode::Table, "t").unwrap(),
            json!([{"A": "1"}])
        );
        assert_eq!(
            parse_output(html, ParseMode::TableFlat, "t").unwrap(),
            json!({"A": "1"})
        );
        assert_eq!(
            parse_output(json!(r#"{"n": [1, 2]}"#), ParseMode::Json, "t").unwrap(),
            json!({"n": [1, 2]})
        );
        assert!(parse_output(json!("{oops"), ParseMode::Json, "t").is_err());
        assert!(parse_output(json!(3), ParseMode::Table, "t").is_err());
    }

    #[test]
    fn test_mirror_text() {
        assert_eq!(mirror_text(&json!("x")).as_deref(), Some("x"));
        assert_eq!(mirror_text(&json!({"a": 1})).as_deref(), Some(r#"{"a":1}"#));
        assert!(mirror_text(&Value::Null).is_none());
    }
}
