use std::borrow::Cow;

use futures::future::BoxFuture;
use tracing::debug;

use scrapline_core::error::{Result, ScraplineError};

use super::{Middleware, Next};
use crate::context::StepContext;
use crate::query::Query;
use crate::steps::{Guard, Step};

/// Runs the rest of the chain only when the step's `if` holds.
pub struct GuardMiddleware;

impl Middleware for GuardMiddleware {
    fn name(&self) -> &'static str {
        "guard"
    }

    fn handle<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a mut StepContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(guard) = &step.policy().guard else {
                return next.run(step, ctx).await;
            };

            let query: Cow<'_, Query> = match guard {
                Guard::Static(q) => Cow::Borrowed(q),
                Guard::Templated(text) => Cow::Owned(Query::parse(&ctx.render(text)?)?),
            };

            if query.evaluate(&ctx.vars.snapshot())? {
                debug!(step = step.kind_name(), condition = %query, "Condition passed");
                next.run(step, ctx).await
            } else {
                Err(ScraplineError::ConditionFailed(query.to_string()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use scrapline_core::error::ScraplineError;
    use scrapline_test_utils::{decl, MockDriver};
    use serde_json::json;

    use crate::context::StepContext;
    use crate::middleware::{ExecuteMiddleware, GuardMiddleware, MiddlewareChain};
    use crate::steps::StepRegistry;
    use crate::vars::VariableStore;

    fn chain() -> MiddlewareChain {
        MiddlewareChain::new(vec![Arc::new(GuardMiddleware), Arc::new(ExecuteMiddleware)]).unwrap()
    }

    async fn run_with(a: &str, guard: &str) -> (Result<(), ScraplineError>, StepContext) {
        let step = StepRegistry::with_builtins()
            .build(decl(json!({"nop": "ran", "if": guard, "set-var": "out"})))
            .unwrap();
        let mut vars = VariableStore::new();
        vars.set_once("a", a);
        let mut ctx = StepContext::new(Arc::new(MockDriver::new()), vars);
        let outcome = chain().handle(&step, &mut ctx).await;
        (outcome, ctx)
    }

    #[tokio::test]
    async fn test_true_condition_reaches_terminal() {
        let (outcome, ctx) = run_with("1", r#"a is "1""#).await;
        outcome.unwrap();
        assert_eq!(ctx.result.get("out"), Some(json!("ran")));
    }

    #[tokio::test]
    async fn test_false_condition_stops_before_terminal() {
        let (outcome, ctx) = run_with("2", r#"a is "1""#).await;
        assert!(matches!(outcome, Err(ScraplineError::ConditionFailed(_))));
        assert!(ctx.result.is_empty());
    }

    #[tokio::test]
    async fn test_templated_condition() {
        let (outcome, ctx) = run_with("yes", r#"{{ a }} is "yes""#).await;
        outcome.unwrap();
        assert!(ctx.result.contains_key("out"));
    }
}
