//! Test doubles and fixtures shared by the scrapline crates.

mod fixtures;
mod mock_driver;

pub use fixtures::{decl, document, document_from_toml, write_document};
pub use mock_driver::{DriverAction, DriverCall, MockDriver, MockDriverFactory};
