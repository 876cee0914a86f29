pub mod config;
pub mod duration;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{ExecutionConfig, Pipeline, Variable, VariableKind};
pub use error::{Result, ScraplineError};
pub use traits::{BrowserDriver, DriverFactory, Locator, Mouse};
pub use types::*;
