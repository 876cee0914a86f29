use futures::future::BoxFuture;
use tracing::{debug, error};

use scrapline_core::error::Result;

use super::{Middleware, Next};
use crate::context::StepContext;
use crate::steps::{ErrorPolicy, SkipPolicy, Step};

/// Applies the step's `on-error` policy to whatever the rest of the chain
/// returns. A failed guard is a skip unless the step sets `on-skip: error`.
pub struct ErrorPolicyMiddleware;

impl Middleware for ErrorPolicyMiddleware {
    fn name(&self) -> &'static str {
        "error-policy"
    }

    fn handle<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a mut StepContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let err = match next.run(step, ctx).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            let policy = step.policy();
            if err.is_condition_failed() && policy.on_skip == SkipPolicy::Skip {
                debug!(step = step.kind_name(), reason = %err, "Step skipped");
                return Ok(());
            }

            match policy.on_error {
                None => Err(err),
                Some(ErrorPolicy::Ignore) => {
                    debug!(step = step.kind_name(), error = %err, "Error ignored");
                    Ok(())
                }
                Some(ErrorPolicy::Print) => {
                    error!(step = %step.config(), error = %err, "Step failed, continuing");
                    Ok(())
                }
                Some(ErrorPolicy::Panic) => {
                    panic!("step {} failed under on-error: panic: {err}", step.config())
                }
            }
        })
    }
}
