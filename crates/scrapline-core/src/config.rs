use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScraplineError};
use crate::types::StepDecl;

/// Characters used for random variables that do not name their own charset.
pub const DEFAULT_RANDOM_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length used for random variables that do not name their own length.
pub const DEFAULT_RANDOM_LENGTH: usize = 8;

/// Top-level pipeline document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub pipeline: Pipeline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub browser: BrowserKind,
    /// Launch parameters passed through to the driver factory untouched.
    #[serde(default)]
    pub browser_params: serde_json::Value,
    /// Page creation options passed through to the driver factory untouched.
    #[serde(default)]
    pub browser_page_options: serde_json::Value,
    /// Keep the page alive this long after the last step (Go duration string).
    #[serde(default)]
    pub keep_running: Option<String>,
    #[serde(default)]
    pub vars: Vec<VariableDecl>,
    #[serde(default)]
    pub steps: Vec<StepDecl>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl std::fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        };
        f.write_str(s)
    }
}

/// What a [`crate::traits::DriverFactory`] needs to start a browser.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserLaunch {
    pub browser: BrowserKind,
    pub params: serde_json::Value,
    pub page_options: serde_json::Value,
}

impl Pipeline {
    pub fn launch_spec(&self) -> BrowserLaunch {
        BrowserLaunch {
            browser: self.browser,
            params: self.browser_params.clone(),
            page_options: self.browser_page_options.clone(),
        }
    }

    /// Convert every variable declaration, failing on the first invalid one.
    pub fn variables(&self) -> Result<Vec<Variable>> {
        self.vars.iter().cloned().map(Variable::try_from).collect()
    }
}

/// A variable as written in the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    /// `"once"` or `"always"`.
    #[serde(default)]
    pub random: Option<String>,
    #[serde(default)]
    pub random_chars: Option<String>,
    #[serde(default)]
    pub random_length: Option<usize>,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub postfix: String,
}

/// Parameters of a random payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomSpec {
    pub charset: String,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableKind {
    Static(String),
    /// Materialised once when the store is initialised.
    RandomOnce(RandomSpec),
    /// Materialised afresh on every read.
    RandomAlways(RandomSpec),
}

/// A validated variable definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
    pub prefix: String,
    pub suffix: String,
}

impl TryFrom<VariableDecl> for Variable {
    type Error = ScraplineError;

    fn try_from(decl: VariableDecl) -> Result<Self> {
        let invalid = |message: &str| ScraplineError::Variable {
            name: decl.name.clone(),
            message: message.to_string(),
        };
        if decl.name.is_empty() {
            return Err(invalid("variable name must not be empty"));
        }

        let random = || -> Result<RandomSpec> {
            let charset = decl
                .random_chars
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_RANDOM_CHARS.to_string());
            let length = decl.random_length.unwrap_or(DEFAULT_RANDOM_LENGTH);
            Ok(RandomSpec { charset, length })
        };

        let kind = match decl.random.as_deref() {
            Some("once") => VariableKind::RandomOnce(random()?),
            Some("always") => VariableKind::RandomAlways(random()?),
            Some(other) => {
                return Err(invalid(&format!(
                    "unknown random mode {other:?}, expected \"once\" or \"always\""
                )))
            }
            None => match decl.value.as_deref() {
                Some(v) if !v.is_empty() => VariableKind::Static(v.to_string()),
                _ => return Err(invalid("needs either `random` or a non-empty `value`")),
            },
        };

        Ok(Variable {
            name: decl.name.clone(),
            kind,
            prefix: decl.prefix.clone(),
            suffix: decl.postfix.clone(),
        })
    }
}

impl ExecutionConfig {
    /// Load a document from disk, with env var expansion.
    ///
    /// `.toml` files are parsed as TOML, everything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ScraplineError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            toml::from_str(&expanded).map_err(|e| ScraplineError::Config(e.to_string()))
        } else {
            Self::from_json_str(&expanded)
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| ScraplineError::Config(e.to_string()))
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ScraplineError::Config(e.to_string()))
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_SCRAPLINE_VAR", "hello");
        let result = expand_env_vars("url = \"${TEST_SCRAPLINE_VAR}\"");
        assert_eq!(result, "url = \"hello\"");
        std::env::remove_var("TEST_SCRAPLINE_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_SCRAPLINE_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_SCRAPLINE_VAR}\"");
    }

    #[test]
    fn test_pipeline_defaults_from_minimal_json() {
        let cfg = ExecutionConfig::from_json_str(r#"{"pipeline": {"steps": [{"goto": "https://example.com"}]}}"#)
            .unwrap();
        assert_eq!(cfg.pipeline.browser, BrowserKind::Chromium);
        assert!(cfg.pipeline.vars.is_empty());
        assert!(cfg.pipeline.keep_running.is_none());
        assert_eq!(cfg.pipeline.steps.len(), 1);
        assert_eq!(cfg.pipeline.steps[0].get_str("goto"), Some("https://example.com"));
    }

    #[test]
    fn test_unknown_browser_is_config_error() {
        let err = ExecutionConfig::from_json_str(r#"{"pipeline": {"browser": "lynx"}}"#).unwrap_err();
        assert!(matches!(err, ScraplineError::Config(_)));
    }

    #[test]
    fn test_variable_kinds() {
        let fixed = Variable::try_from(VariableDecl {
            name: "user".into(),
            value: Some("bob".into()),
            prefix: "@".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(fixed.kind, VariableKind::Static("bob".into()));
        assert_eq!(fixed.prefix, "@");

        let once = Variable::try_from(VariableDecl {
            name: "token".into(),
            random: Some("once".into()),
            random_chars: Some("ab".into()),
            random_length: Some(4),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            once.kind,
            VariableKind::RandomOnce(RandomSpec {
                charset: "ab".into(),
                length: 4
            })
        );

        let always = Variable::try_from(VariableDecl {
            name: "nonce".into(),
            random: Some("always".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            always.kind,
            VariableKind::RandomAlways(RandomSpec {
                charset: DEFAULT_RANDOM_CHARS.into(),
                length: DEFAULT_RANDOM_LENGTH
            })
        );
    }

    #[test]
    fn test_variable_without_value_or_random_fails() {
        let err = Variable::try_from(VariableDecl {
            name: "empty".into(),
            value: Some(String::new()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ScraplineError::Variable { ref name, .. } if name == "empty"));

        let err = Variable::try_from(VariableDecl {
            name: "odd".into(),
            random: Some("sometimes".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("sometimes"));
    }

    #[test]
    fn test_toml_document() {
        let toml_str = r##"
[pipeline]
browser = "firefox"
keep_running = "2s"

[[pipeline.vars]]
name = "user"
value = "alice"

[[pipeline.steps]]
goto = "https://example.com/login"

[[pipeline.steps]]
fill = "#user"
value = "{{ user }}"
"##;
        let cfg: ExecutionConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.pipeline.browser, BrowserKind::Firefox);
        assert_eq!(cfg.pipeline.keep_running.as_deref(), Some("2s"));
        assert_eq!(cfg.pipeline.variables().unwrap().len(), 1);
        assert_eq!(cfg.pipeline.steps[1].get_str("fill"), Some("#user"));
    }
}
