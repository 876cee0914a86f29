//! Template expansion for step fields.
//!
//! Templates are minijinja text. Variables come from the live variable store,
//! so random-always variables render a fresh value at every use. A single
//! function, `eval(script)`, runs a script in the page and inlines its result.
//!
//! `{{.name}}` is accepted as a spelling of `{{ name }}`.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, LazyLock};

use minijinja::value::{Object, ObjectRepr, Value};
use minijinja::{Environment, Error as TemplateError, ErrorKind, State};
use regex::Regex;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::traits::BrowserDriver;
use scrapline_core::types::EvaluateOptions;

use crate::vars::{Generator, VarValue, VariableStore};

/// Name of the injected page-evaluation function.
pub const EVAL_BINDING: &str = "eval";

static LEADING_DOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\{\{-?\s*)\.([A-Za-z_])").unwrap());

/// True when `text` contains template syntax and needs rendering.
pub fn has_markup(text: &str) -> bool {
    text.contains("{{") || text.contains("{%") || text.contains("{#")
}

/// Expand a template against the variable store and the page.
pub fn evaluate(text: &str, vars: &VariableStore, driver: &Arc<dyn BrowserDriver>) -> Result<String> {
    if !has_markup(text) {
        return Ok(text.to_string());
    }
    let source = LEADING_DOT_RE.replace_all(text, "$1$2");

    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    let tmpl = env
        .template_from_str(&source)
        .map_err(|e| ScraplineError::TemplateParse {
            template: text.to_string(),
            message: describe(&e),
        })?;

    let mut context: BTreeMap<String, Value> = vars
        .live_snapshot()
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                VarValue::Fixed(s) => Value::from(s),
                VarValue::Generator(generator) => Value::from_object(GeneratedValue(generator)),
            };
            (name, value)
        })
        .collect();

    if context.contains_key(EVAL_BINDING) {
        warn!(
            name = EVAL_BINDING,
            "Variable shadows a template function, renaming it with a leading underscore"
        );
        unshadow(&mut context, EVAL_BINDING);
    }
    context.insert(EVAL_BINDING.to_string(), eval_function(Arc::clone(driver)));

    let rendered = tmpl
        .render(Value::from_iter(context))
        .map_err(|e| ScraplineError::TemplateRender {
            template: text.to_string(),
            message: describe(&e),
        })?;
    debug!(template = %text, rendered = %rendered, "Rendered template");
    Ok(rendered)
}

/// Expand every template in order, failing on the first error.
pub fn evaluate_all(
    texts: &[String],
    vars: &VariableStore,
    driver: &Arc<dyn BrowserDriver>,
) -> Result<Vec<String>> {
    texts.iter().map(|t| evaluate(t, vars, driver)).collect()
}

/// Move a user variable out of the way of a binding named `key`.
///
/// The existing value moves to `_key`; if that is taken too, the occupant of
/// `_key` moves to `__key` first, and so on.
pub fn unshadow<V>(data: &mut BTreeMap<String, V>, key: &str) {
    if let Some(existing) = data.remove(key) {
        let renamed = format!("_{key}");
        unshadow(data, &renamed);
        data.insert(renamed, existing);
    }
}

fn describe(err: &TemplateError) -> String {
    match err.detail() {
        Some(detail) => format!("{}: {detail}", err.kind()),
        None => err.to_string(),
    }
}

fn eval_function(driver: Arc<dyn BrowserDriver>) -> Value {
    Value::from_function(move |script: String| -> std::result::Result<Value, TemplateError> {
        let outcome = block_on(driver.evaluate(script.clone(), EvaluateOptions::default()))
            .map_err(|msg| TemplateError::new(ErrorKind::InvalidOperation, msg))?;
        match outcome {
            Ok(json) => Ok(Value::from_serialize(&json)),
            Err(e) => Err(TemplateError::new(
                ErrorKind::InvalidOperation,
                format!("eval({script:?}) failed: {e}"),
            )),
        }
    })
}

/// Drive a driver future to completion from synchronous template code.
///
/// Needs a multi-threaded runtime when called from inside tokio; outside of
/// any runtime a throwaway one is built.
fn block_on<F: Future>(fut: F) -> std::result::Result<F::Output, String> {
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => {
                Err("eval() requires a multi-threaded tokio runtime".to_string())
            }
            _ => Ok(tokio::task::block_in_place(|| handle.block_on(fut))),
        },
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map(|rt| rt.block_on(fut))
            .map_err(|e| e.to_string()),
    }
}

/// A random-always variable seen from a template: every render or call
/// produces a fresh value.
struct GeneratedValue(Generator);

impl std::fmt::Debug for GeneratedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GeneratedValue")
    }
}

impl Object for GeneratedValue {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn render(self: &Arc<Self>, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    where
        Self: Sized + 'static,
    {
        f.write_str(&(self.0)())
    }

    fn call(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        _args: &[Value],
    ) -> std::result::Result<Value, TemplateError> {
        Ok(Value::from((self.0)()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapline_test_utils::MockDriver;
    use serde_json::json;

    fn driver() -> Arc<dyn BrowserDriver> {
        Arc::new(MockDriver::new())
    }

    fn store(pairs: &[(&str, &str)]) -> VariableStore {
        let mut vars = VariableStore::new();
        for (k, v) in pairs {
            vars.set_once(k, *v);
        }
        vars
    }

    #[test]
    fn test_plain_text_passes_through() {
        let out = evaluate("#login > button", &VariableStore::new(), &driver()).unwrap();
        assert_eq!(out, "#login > button");
    }

    #[test]
    fn test_variable_lookup_both_spellings() {
        let vars = store(&[("user", "alice"), ("item", "3")]);
        let d = driver();
        assert_eq!(evaluate("hi {{ user }}", &vars, &d).unwrap(), "hi alice");
        assert_eq!(evaluate("row-{{.item}}", &vars, &d).unwrap(), "row-3");
        assert_eq!(evaluate("{{- .user -}}!", &vars, &d).unwrap(), "alice!");
    }

    #[test]
    fn test_random_always_renders_fresh_each_use() {
        let mut vars = VariableStore::new();
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        vars.set_getter(
            "n",
            Arc::new(move || {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                    .to_string()
            }),
        );
        let out = evaluate("{{ n }}-{{ n }}", &vars, &driver()).unwrap();
        assert_eq!(out, "0-1");
    }

    #[test]
    fn test_parse_and_render_errors_are_distinct() {
        let vars = VariableStore::new();
        let d = driver();
        let err = evaluate("{{ user ", &vars, &d).unwrap_err();
        assert!(
            matches!(err, ScraplineError::TemplateParse { ref template, .. } if template == "{{ user ")
        );

        let err = evaluate("{{ 1 + [] }}", &vars, &d).unwrap_err();
        assert!(matches!(err, ScraplineError::TemplateRender { .. }));
    }

    #[test]
    fn test_unshadow_is_recursive() {
        let mut data: BTreeMap<String, i32> = BTreeMap::new();
        data.insert("eval".into(), 1);
        data.insert("_eval".into(), 2);
        unshadow(&mut data, "eval");
        assert!(!data.contains_key("eval"));
        assert_eq!(data["_eval"], 1);
        assert_eq!(data["__eval"], 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_eval_calls_the_page() {
        let mock = MockDriver::new().with_eval("document.title", json!("Dashboard"));
        let d: Arc<dyn BrowserDriver> = Arc::new(mock.clone());
        let out = evaluate(r#"title={{ eval("document.title") }}"#, &VariableStore::new(), &d).unwrap();
        assert_eq!(out, "title=Dashboard");
        assert_eq!(mock.evaluated_scripts(), vec!["document.title".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_user_eval_variable_is_renamed_not_lost() {
        let mock = MockDriver::new().with_eval("1 + 1", json!(2));
        let d: Arc<dyn BrowserDriver> = Arc::new(mock);
        let vars = store(&[("eval", "mine")]);
        let out = evaluate(r#"{{ _eval }}/{{ eval("1 + 1") }}"#, &vars, &d).unwrap();
        assert_eq!(out, "mine/2");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_eval_on_current_thread_runtime_is_render_error() {
        let d = driver();
        let err = evaluate(r#"{{ eval("x") }}"#, &VariableStore::new(), &d).unwrap_err();
        assert!(matches!(err, ScraplineError::TemplateRender { .. }));
    }
}
