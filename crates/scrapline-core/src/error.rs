use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraplineError {
    // Build errors
    #[error("Failed to build step {step}: {message}")]
    StepBuild { step: String, message: String },

    #[error("No step kind handles declaration: {0}")]
    UnknownStep(String),

    #[error("Invalid query: {0}")]
    Query(String),

    #[error("Invalid variable {name}: {message}")]
    Variable { name: String, message: String },

    #[error("Pipeline has no steps, preflight check failed")]
    EmptyPipeline,

    #[error("Middleware chain misconfigured: {0}")]
    ChainMisconfigured(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Runtime errors
    #[error("Browser driver failed during {action}: {message}")]
    Driver { action: String, message: String },

    #[error("Failed to parse template {template:?}: {message}")]
    TemplateParse { template: String, message: String },

    #[error("Failed to render template {template:?}: {message}")]
    TemplateRender { template: String, message: String },

    #[error("Query evaluation failed: {0}")]
    QueryEval(String),

    #[error("Use of undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Step {step} failed: {message}")]
    StepExecution { step: String, message: String },

    // Guard outcome
    #[error("Condition failed: {0}")]
    ConditionFailed(String),

    // Session errors
    #[error("Session failed to start: {0}")]
    SessionStart(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Timed out after {timeout_ms}ms waiting for a result from session {session}")]
    ResultTimeout { session: String, timeout_ms: u64 },

    #[error("Execution cancelled")]
    Cancelled,

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScraplineError {
    /// Shorthand for a failed driver capability.
    pub fn driver(action: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Driver {
            action: action.into(),
            message: message.to_string(),
        }
    }

    /// Shorthand for a build-time rejection of a declaration.
    pub fn step_build(step: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::StepBuild {
            step: step.into(),
            message: message.to_string(),
        }
    }

    /// True when a guard short-circuited the step rather than a real failure.
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, Self::ConditionFailed(_))
    }

    /// True for errors raised while turning a document into steps.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::StepBuild { .. }
                | Self::UnknownStep(_)
                | Self::Query(_)
                | Self::Variable { .. }
                | Self::EmptyPipeline
                | Self::ChainMisconfigured(_)
                | Self::Config(_)
                | Self::ConfigNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScraplineError>;
