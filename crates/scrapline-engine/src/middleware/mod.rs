//! Decorators wrapped around every step execution.
//!
//! The chain is an ordered list walked by index: each middleware receives a
//! [`Next`] handle and decides whether, and how often, to continue. Exactly
//! one terminal middleware runs the step itself and it has to sit at the end.

pub mod error_policy;
pub mod execute;
pub mod guard;
pub mod loop_items;

use std::sync::Arc;

use futures::future::BoxFuture;

use scrapline_core::error::{Result, ScraplineError};

use crate::context::StepContext;
use crate::steps::Step;

pub use error_policy::ErrorPolicyMiddleware;
pub use execute::ExecuteMiddleware;
pub use guard::GuardMiddleware;
pub use loop_items::LoopMiddleware;

/// One layer of the chain.
pub trait Middleware: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// The terminal middleware runs the step and must be last.
    fn is_terminal(&self) -> bool {
        false
    }

    fn handle<'a>(
        &'a self,
        step: &'a Step,
        ctx: &'a mut StepContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Continuation into the rest of the chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a MiddlewareChain,
    index: usize,
}

impl<'a> Next<'a> {
    /// True when nothing follows the current middleware.
    pub fn is_end(&self) -> bool {
        self.index >= self.chain.middlewares.len()
    }

    /// The whole chain, for re-entering it from the top.
    pub fn chain(&self) -> &'a MiddlewareChain {
        self.chain
    }

    pub fn run<'b>(self, step: &'b Step, ctx: &'b mut StepContext) -> BoxFuture<'b, Result<()>>
    where
        'a: 'b,
    {
        self.chain.run_from(self.index, step, ctx)
    }
}

/// The ordered middleware list, fixed once built.
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Build a chain, rejecting any order that does not end in exactly one
    /// terminal middleware.
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Result<Self> {
        let terminals: Vec<usize> = middlewares
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_terminal())
            .map(|(i, _)| i)
            .collect();

        match terminals.as_slice() {
            [] => Err(ScraplineError::ChainMisconfigured(
                "no terminal middleware".into(),
            )),
            [i] if *i + 1 == middlewares.len() => Ok(Self { middlewares }),
            [i] => Err(ScraplineError::ChainMisconfigured(format!(
                "{} must be last, found {} after it",
                middlewares[*i].name(),
                middlewares[*i + 1..]
                    .iter()
                    .map(|m| m.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
            _ => Err(ScraplineError::ChainMisconfigured(format!(
                "{} terminal middlewares, expected exactly one",
                terminals.len()
            ))),
        }
    }

    /// Error policy, guard, loop, execute.
    pub fn standard() -> Self {
        Self {
            middlewares: vec![
                Arc::new(ErrorPolicyMiddleware),
                Arc::new(GuardMiddleware),
                Arc::new(LoopMiddleware),
                Arc::new(ExecuteMiddleware),
            ],
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Drive one step through the whole chain.
    pub fn handle<'a>(&'a self, step: &'a Step, ctx: &'a mut StepContext) -> BoxFuture<'a, Result<()>> {
        self.run_from(0, step, ctx)
    }

    fn run_from<'a>(
        &'a self,
        index: usize,
        step: &'a Step,
        ctx: &'a mut StepContext,
    ) -> BoxFuture<'a, Result<()>> {
        match self.middlewares.get(index) {
            Some(middleware) => middleware.handle(
                step,
                ctx,
                Next {
                    chain: self,
                    index: index + 1,
                },
            ),
            None => Box::pin(async move {
                Err(ScraplineError::ChainMisconfigured(format!(
                    "chain ended at position {index} without running the step"
                )))
            }),
        }
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::standard()
    }
}
