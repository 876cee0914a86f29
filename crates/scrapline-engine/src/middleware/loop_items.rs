use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use scrapline_core::error::{Result, ScraplineError};

use super::{Middleware, Next};
use crate::context::StepContext;
use crate::steps::Step;

/// Variable bound to the current loop item.
pub const ITEM_VAR: &str = "item";

/// Largest iteration count a numeric `loop` may ask for.
pub const MAX_LOOP_COUNT: u64 = 100_000;

/// Expands `loop` into repeated runs of the step's nested body.
///
/// Each nested step goes through the whole chain again, so guards and error
/// policies apply per iteration. The anchor step itself is not executed.
pub struct LoopMiddleware;

impl Middleware for LoopMiddleware {
    fn name(&self) -> &'static str {
        "loop"
    }

    fn handle<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a mut StepContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(expr) = &step.policy().loop_expr else {
                return next.run(step, ctx).await;
            };

            let items = loop_items(&ctx.render(expr)?)?;
            debug!(count = items.len(), body = step.nested().len(), "Entering loop");

            let chain = next.chain();
            for item in items {
                ctx.vars.set_once(ITEM_VAR, item);
                for nested in step.nested() {
                    chain.handle(nested, ctx).await?;
                }
            }
            Ok(())
        })
    }
}

/// Turn a rendered loop expression into item strings.
///
/// An integer `n` yields `"0"` to `"n-1"`; anything else must be a JSON array
/// of strings, numbers or booleans.
pub fn loop_items(rendered: &str) -> Result<Vec<String>> {
    let text = rendered.trim();
    let invalid = |message: String| ScraplineError::StepExecution {
        step: "loop".into(),
        message,
    };

    if let Ok(n) = text.parse::<f64>() {
        if !n.is_finite() || n.fract() != 0.0 || n < 0.0 {
            return Err(invalid(format!(
                "loop count must be a non-negative integer, got {text:?}"
            )));
        }
        if n > MAX_LOOP_COUNT as f64 {
            return Err(invalid(format!(
                "loop count {text} exceeds the limit of {MAX_LOOP_COUNT}"
            )));
        }
        return Ok((0..n as u64).map(|i| i.to_string()).collect());
    }

    let items: Vec<Value> = serde_json::from_str(text).map_err(|e| {
        invalid(format!(
            "loop value is neither an integer nor a JSON array ({e}): {text:?}"
        ))
    })?;
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(number_text(&n)),
            other => Err(invalid(format!("unsupported loop item: {other}"))),
        })
        .collect()
}

fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
