//! Pipeline execution for scrapline.
//!
//! Turns pipeline documents into built steps and drives them through a
//! middleware chain against a [`scrapline_core::BrowserDriver`], either once
//! ([`Engine::execute`]) or as a long-lived stream wrapped in a [`Session`].

pub mod context;
pub mod engine;
pub mod middleware;
pub mod query;
pub mod session;
pub mod steps;
pub mod table;
pub mod template;
pub mod vars;

pub use context::StepContext;
pub use engine::{Engine, EngineOptions, Preflight};
pub use middleware::{Middleware, MiddlewareChain, Next};
pub use query::{Operator, Query};
pub use session::{Session, SessionManager, SessionOptions};
pub use steps::{Step, StepKind, StepRegistry};
pub use vars::{VarValue, VariableStore};
