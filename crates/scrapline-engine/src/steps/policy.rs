use serde_json::Value;

use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::types::StepDecl;

use crate::query::Query;
use crate::template;

/// What the error-policy layer does with a failure of this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Swallow silently.
    Ignore,
    /// Log and continue.
    Print,
    /// Abort the whole execution by panicking.
    Panic,
}

/// What a failed guard means for this step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SkipPolicy {
    /// The step is skipped and execution continues.
    #[default]
    Skip,
    /// The failed guard is handled like any other step error.
    Error,
}

/// How `set-var` output is converted before it is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    #[default]
    Text,
    Table,
    TableFlat,
    Json,
}

/// A step's `if` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    /// No template markup: parsed once at build time.
    Static(Query),
    /// Expanded and parsed before every evaluation.
    Templated(String),
}

/// The cross-cutting keys of a declaration, validated at build time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepPolicy {
    pub guard: Option<Guard>,
    pub loop_expr: Option<String>,
    pub on_error: Option<ErrorPolicy>,
    pub on_skip: SkipPolicy,
    pub set_var: Option<String>,
    pub parse_mode: Option<ParseMode>,
}

impl StepPolicy {
    pub fn from_decl(decl: &StepDecl, step: &str) -> Result<Self> {
        let text = |key: &str| -> Result<Option<String>> {
            match decl.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(other) => Err(ScraplineError::step_build(
                    step,
                    format!("`{key}` must be a string, got: {other}"),
                )),
            }
        };

        let guard = match text("if")? {
            None => None,
            Some(expr) if template::has_markup(&expr) => Some(Guard::Templated(expr)),
            Some(expr) => Some(Guard::Static(Query::parse(&expr)?)),
        };

        let loop_expr = match decl.get("loop") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) if n.as_u64().is_some() => Some(n.to_string()),
            Some(other) => {
                return Err(ScraplineError::step_build(
                    step,
                    format!("`loop` must be a string or a non-negative integer, got: {other}"),
                ))
            }
        };

        let on_error = match text("on-error")?.as_deref() {
            None => None,
            Some("ignore") => Some(ErrorPolicy::Ignore),
            Some("print") => Some(ErrorPolicy::Print),
            Some("panic") => Some(ErrorPolicy::Panic),
            Some(other) => {
                return Err(ScraplineError::step_build(
                    step,
                    format!("unknown on-error policy {other:?}, expected ignore, print or panic"),
                ))
            }
        };

        let on_skip = match text("on-skip")?.as_deref() {
            None | Some("skip") => SkipPolicy::Skip,
            Some("error") => SkipPolicy::Error,
            Some(other) => {
                return Err(ScraplineError::step_build(
                    step,
                    format!("unknown on-skip policy {other:?}, expected skip or error"),
                ))
            }
        };

        let parse_mode = match text("parse-mode")?.as_deref() {
            None => None,
            Some("text") => Some(ParseMode::Text),
            Some("table") => Some(ParseMode::Table),
            Some("table-flat") => Some(ParseMode::TableFlat),
            Some("json") => Some(ParseMode::Json),
            Some(other) => {
                return Err(ScraplineError::step_build(
                    step,
                    format!("unknown parse-mode {other:?}"),
                ))
            }
        };

        let set_var = text("set-var")?;
        if set_var.as_deref() == Some("") {
            return Err(ScraplineError::step_build(step, "`set-var` must not be empty"));
        }

        Ok(Self {
            guard,
            loop_expr,
            on_error,
            on_skip,
            set_var,
            parse_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy(v: serde_json::Value) -> Result<StepPolicy> {
        StepPolicy::from_decl(&StepDecl::try_from(v).unwrap(), "test")
    }

    #[test]
    fn test_defaults() {
        let p = policy(json!({"nop": "x"})).unwrap();
        assert_eq!(p, StepPolicy::default());
    }

    #[test]
    fn test_all_keys() {
        let p = policy(json!({
            "nop": "x",
            "if": "status is ok",
            "loop": 4,
            "on-error": "print",
            "on-skip": "error",
            "set-var": "out",
            "parse-mode": "table-flat"
        }))
        .unwrap();
        assert!(matches!(p.guard, Some(Guard::Static(ref q)) if q.field == "status"));
        assert_eq!(p.loop_expr.as_deref(), Some("4"));
        assert_eq!(p.on_error, Some(ErrorPolicy::Print));
        assert_eq!(p.on_skip, SkipPolicy::Error);
        assert_eq!(p.set_var.as_deref(), Some("out"));
        assert_eq!(p.parse_mode, Some(ParseMode::TableFlat));
    }

    #[test]
    fn test_templated_guard_is_deferred() {
        let p = policy(json!({"nop": "x", "if": "{{ field }} is ok"})).unwrap();
        assert!(matches!(p.guard, Some(Guard::Templated(_))));
    }

    #[test]
    fn test_invalid_values_are_build_errors() {
        assert!(matches!(
            policy(json!({"nop": "x", "if": "a equals b"})),
            Err(ScraplineError::Query(_))
        ));
        assert!(policy(json!({"nop": "x", "on-error": "retry"})).is_err());
        assert!(policy(json!({"nop": "x", "parse-mode": "xml"})).is_err());
        assert!(policy(json!({"nop": "x", "loop": -1})).is_err());
        assert!(policy(json!({"nop": "x", "set-var": 3})).is_err());
    }
}
