use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::future::BoxFuture;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scrapline_core::config::{BrowserLaunch, ExecutionConfig};
use scrapline_core::error::{Result as CoreResult, ScraplineError};
use scrapline_core::traits::{BrowserDriver, DriverFactory};
use scrapline_engine::{Engine, Step};

#[derive(Parser)]
#[command(name = "scrapline", version, about = "Declarative browser pipelines")]
struct Cli {
    /// Path to the pipeline document (TOML or JSON)
    #[arg(short, long, env = "SCRAPLINE_CONFIG", default_value = "pipeline.toml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "scrapline=info,warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every step and print the execution plan
    Validate,
    /// Print the parsed document as JSON
    Config,
}

/// Stand-in factory for commands that never touch a page.
struct NoBrowser;

impl DriverFactory for NoBrowser {
    fn launch(&self, launch: BrowserLaunch) -> BoxFuture<'_, CoreResult<Arc<dyn BrowserDriver>>> {
        Box::pin(async move {
            Err(ScraplineError::driver(
                "launch",
                format!("no {} backend is linked into this binary", launch.browser),
            ))
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    let config = ExecutionConfig::load(&cli.config)?;
    info!(path = %cli.config.display(), "Loaded pipeline document");

    match cli.command.unwrap_or(Commands::Validate) {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Validate => {
            let engine = Engine::new(Arc::new(NoBrowser));
            let plan = engine.preflight(&config)?;
            println!(
                "browser: {}  vars: {}  keep_running: {}",
                config.pipeline.browser,
                plan.vars.len(),
                plan.keep_running
                    .map(|d| format!("{d:?}"))
                    .unwrap_or_else(|| "-".into()),
            );
            print_plan(&plan.steps, 0);
            info!(steps = plan.steps.len(), "Pipeline is valid");
        }
    }

    Ok(())
}

fn print_plan(steps: &[Step], depth: usize) {
    for (i, step) in steps.iter().enumerate() {
        let policy = step.policy();
        let mut flags = Vec::new();
        if policy.guard.is_some() {
            flags.push("if".to_string());
        }
        if let Some(expr) = &policy.loop_expr {
            flags.push(format!("loop={expr}"));
        }
        if let Some(name) = &policy.set_var {
            flags.push(format!("set-var={name}"));
        }
        if let Some(on_error) = policy.on_error {
            flags.push(format!("on-error={on_error:?}").to_lowercase());
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", flags.join(", "))
        };
        println!("{:indent$}{}. {}{}", "", i + 1, step.kind_name(), flags, indent = depth * 2);
        print_plan(step.nested(), depth + 1);
    }
}
