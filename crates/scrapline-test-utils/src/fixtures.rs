use std::path::PathBuf;

use scrapline_core::config::ExecutionConfig;
use scrapline_core::types::StepDecl;
use tempfile::TempDir;

/// Parse a pipeline document from JSON, panicking on malformed input.
pub fn document(value: serde_json::Value) -> ExecutionConfig {
    ExecutionConfig::from_json_value(value).expect("fixture document should parse")
}

pub fn document_from_toml(text: &str) -> ExecutionConfig {
    toml::from_str(text).expect("fixture TOML should parse")
}

/// A single step declaration from a JSON object.
pub fn decl(value: serde_json::Value) -> StepDecl {
    StepDecl::try_from(value).expect("fixture step should be an object")
}

/// Write `contents` to `file_name` inside a fresh temp dir.
///
/// Keep the returned `TempDir` alive for as long as the file is needed.
pub fn write_document(file_name: &str, contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(file_name);
    std::fs::write(&path, contents).expect("write fixture");
    (dir, path)
}
