use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use scrapline_core::config::ExecutionConfig;
use scrapline_core::duration::parse_duration;
use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::traits::{BrowserDriver, DriverFactory};
use scrapline_core::types::{ResultMap, StepDecl};

use crate::context::StepContext;
use crate::middleware::MiddlewareChain;
use crate::steps::{Step, StepRegistry};
use crate::vars::VariableStore;

/// Tunables for an [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Capacity of the result channel returned by [`Engine::stream`].
    pub stream_buffer: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { stream_buffer: 16 }
    }
}

/// A document turned into runnable parts, before any browser is involved.
pub struct Preflight {
    pub vars: VariableStore,
    pub steps: Vec<Step>,
    pub keep_running: Option<Duration>,
}

impl std::fmt::Debug for Preflight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preflight")
            .field("vars", &self.vars.names())
            .field("steps", &self.steps.len())
            .field("keep_running", &self.keep_running)
            .finish()
    }
}

/// Runs pipeline documents against drivers obtained from a factory.
///
/// Cheap to clone; registry and chain are shared.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<StepRegistry>,
    chain: Arc<MiddlewareChain>,
    factory: Arc<dyn DriverFactory>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(factory: Arc<dyn DriverFactory>) -> Self {
        Self {
            registry: Arc::new(StepRegistry::with_builtins()),
            chain: Arc::new(MiddlewareChain::standard()),
            factory,
            options: EngineOptions::default(),
        }
    }

    pub fn with_registry(mut self, registry: StepRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_chain(mut self, chain: MiddlewareChain) -> Self {
        self.chain = Arc::new(chain);
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Validate a document for batch execution: it has steps, its variables
    /// initialise, `keep_running` parses and every step builds.
    pub fn preflight(&self, config: &ExecutionConfig) -> Result<Preflight> {
        let pipeline = &config.pipeline;
        if pipeline.steps.is_empty() {
            return Err(ScraplineError::EmptyPipeline);
        }

        let vars = VariableStore::from_variables(&pipeline.variables()?);
        let keep_running = match pipeline.keep_running.as_deref() {
            None | Some("") => None,
            Some(s) => Some(parse_duration(s)?),
        };
        let steps = self.registry.build_all(&pipeline.steps)?;

        debug!(steps = steps.len(), vars = vars.len(), "Preflight passed");
        Ok(Preflight {
            vars,
            steps,
            keep_running,
        })
    }

    /// Run a whole document once and return its result.
    ///
    /// All or nothing: the first unhandled step error aborts the run and the
    /// partial result is dropped. The driver is closed either way.
    pub async fn execute(
        &self,
        config: &ExecutionConfig,
        cancel: &CancellationToken,
    ) -> Result<ResultMap> {
        let plan = self.preflight(config)?;

        info!(browser = %config.pipeline.browser, "Launching browser");
        let driver = self.factory.launch(config.pipeline.launch_spec()).await?;

        let outcome = AssertUnwindSafe(self.run_plan(plan, Arc::clone(&driver), cancel))
            .catch_unwind()
            .await;
        close_driver(driver.as_ref()).await;
        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Like [`Engine::execute`] but against a caller-owned driver, which is
    /// left open.
    pub async fn execute_with_driver(
        &self,
        config: &ExecutionConfig,
        driver: Arc<dyn BrowserDriver>,
        cancel: &CancellationToken,
    ) -> Result<ResultMap> {
        let plan = self.preflight(config)?;
        self.run_plan(plan, driver, cancel).await
    }

    async fn run_plan(
        &self,
        plan: Preflight,
        driver: Arc<dyn BrowserDriver>,
        cancel: &CancellationToken,
    ) -> Result<ResultMap> {
        let mut ctx = StepContext::new(driver, plan.vars);

        for (index, step) in plan.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(index, "Pipeline cancelled");
                return Err(ScraplineError::Cancelled);
            }
            if let Err(e) = self.chain.handle(step, &mut ctx).await {
                error!(index, step = step.kind_name(), error = %e, "Pipeline aborted");
                return Err(e);
            }
        }

        if let Some(wait) = plan.keep_running {
            info!(?wait, "Keeping page open");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => debug!("Keep-running cut short by cancellation"),
            }
        }

        info!(keys = ctx.result.len(), "Pipeline finished");
        Ok(ctx.take_result())
    }

    /// Start a streaming execution.
    ///
    /// Variables are initialised and the browser launched up front; then a
    /// worker receives step batches from `inbound` and sends one result per
    /// batch, in order. A batch that fails to build yields an empty result,
    /// one that fails while running stops at the failing step and yields what
    /// it produced so far. Neither ends the stream. The worker stops when
    /// `inbound` closes, the result receiver is dropped or `cancel` fires,
    /// and closes the driver on its way out.
    ///
    /// The document's own `steps` are not run; send them as the first batch.
    pub async fn stream(
        &self,
        config: &ExecutionConfig,
        mut inbound: mpsc::Receiver<Vec<StepDecl>>,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<ResultMap>> {
        let vars = VariableStore::from_variables(&config.pipeline.variables()?);
        if !config.pipeline.steps.is_empty() {
            warn!(
                steps = config.pipeline.steps.len(),
                "Document steps are ignored in streaming mode"
            );
        }

        info!(browser = %config.pipeline.browser, "Launching browser for stream");
        let driver = self.factory.launch(config.pipeline.launch_spec()).await?;

        let (tx, rx) = mpsc::channel(self.options.stream_buffer.max(1));
        let registry = Arc::clone(&self.registry);
        let chain = Arc::clone(&self.chain);

        tokio::spawn(async move {
            let mut ctx = StepContext::new(driver, vars);
            loop {
                let batch = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Stream cancelled");
                        break;
                    }
                    batch = inbound.recv() => match batch {
                        Some(batch) => batch,
                        None => {
                            debug!("Stream input closed");
                            break;
                        }
                    },
                };

                let run = AssertUnwindSafe(run_batch(&registry, &chain, &mut ctx, batch));
                let Ok(result) = run.catch_unwind().await else {
                    error!("Stream worker panicked, stopping");
                    break;
                };
                if tx.send(result).await.is_err() {
                    debug!("Stream output dropped");
                    break;
                }
            }

            close_driver(ctx.driver.as_ref()).await;
            info!("Stream worker stopped");
        });

        Ok(rx)
    }
}

async fn close_driver(driver: &dyn BrowserDriver) {
    if let Err(e) = driver.close().await {
        warn!(error = %e, "Failed to close browser");
    }
}

async fn run_batch(
    registry: &StepRegistry,
    chain: &MiddlewareChain,
    ctx: &mut StepContext,
    batch: Vec<StepDecl>,
) -> ResultMap {
    let steps = match registry.build_all(&batch) {
        Ok(steps) => steps,
        Err(e) => {
            warn!(error = %e, "Skipping batch that failed to build");
            return ResultMap::new();
        }
    };

    for (index, step) in steps.iter().enumerate() {
        if let Err(e) = chain.handle(step, ctx).await {
            error!(index, step = step.kind_name(), error = %e, "Batch aborted");
            break;
        }
    }
    ctx.take_result()
}
