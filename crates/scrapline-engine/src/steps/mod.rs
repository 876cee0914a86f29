//! Step kinds and the registry that builds them from declarations.
//!
//! A declaration is claimed by the first registered kind whose key is
//! present. Builders validate eagerly so a malformed declaration fails
//! while the pipeline is being built, never half-way through a run.

pub mod click;
pub mod debug;
pub mod eval;
pub mod extract;
pub mod fill;
pub mod mouse;
pub mod navigate;
pub mod nop;
pub mod omit;
pub mod page_config;
pub mod policy;
pub mod screenshot;
pub mod select;
pub mod sleep;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::types::StepDecl;

use crate::context::StepContext;

pub use policy::{ErrorPolicy, Guard, ParseMode, SkipPolicy, StepPolicy};

/// A built step: the typed action plus the cross-cutting policy read by the
/// middleware chain.
#[derive(Debug)]
pub struct Step {
    kind: StepKind,
    policy: StepPolicy,
    nested: Vec<Step>,
    decl: StepDecl,
}

impl Step {
    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// The declaration this step was built from.
    pub fn config(&self) -> &StepDecl {
        &self.decl
    }

    pub fn policy(&self) -> &StepPolicy {
        &self.policy
    }

    /// Loop body, built once together with the step.
    pub fn nested(&self) -> &[Step] {
        &self.nested
    }

    /// Run the step's own action. Returns the value `set-var` would store.
    pub fn execute<'a>(&'a self, ctx: &'a mut StepContext) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(self.kind.execute(ctx))
    }
}

/// The closed set of actions a step can perform.
#[derive(Debug)]
pub enum StepKind {
    Navigate(navigate::NavigateStep),
    Click(click::ClickStep),
    Fill(fill::FillStep),
    Select(select::SelectStep),
    Extract(extract::ExtractStep),
    Screenshot(screenshot::ScreenshotStep),
    Eval(eval::EvalStep),
    Sleep(sleep::SleepStep),
    Mouse(mouse::MouseStep),
    Omit(omit::OmitStep),
    PageConfig(page_config::PageConfigStep),
    Debug(debug::DebugStep),
    Nop(nop::NopStep),
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Navigate(_) => "goto",
            StepKind::Click(_) => "click",
            StepKind::Fill(_) => "fill",
            StepKind::Select(_) => "select",
            StepKind::Extract(_) => "element",
            StepKind::Screenshot(_) => "screenshot",
            StepKind::Eval(_) => "eval",
            StepKind::Sleep(_) => "sleep",
            StepKind::Mouse(_) => "mouse",
            StepKind::Omit(_) => "omit",
            StepKind::PageConfig(_) => "config",
            StepKind::Debug(_) => "debug",
            StepKind::Nop(_) => "nop",
        }
    }

    async fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        match self {
            StepKind::Navigate(s) => s.execute(ctx).await,
            StepKind::Click(s) => s.execute(ctx).await,
            StepKind::Fill(s) => s.execute(ctx).await,
            StepKind::Select(s) => s.execute(ctx).await,
            StepKind::Extract(s) => s.execute(ctx).await,
            StepKind::Screenshot(s) => s.execute(ctx).await,
            StepKind::Eval(s) => s.execute(ctx).await,
            StepKind::Sleep(s) => s.execute(ctx).await,
            StepKind::Mouse(s) => s.execute(ctx).await,
            StepKind::Omit(s) => s.execute(ctx),
            StepKind::PageConfig(s) => s.execute(ctx).await,
            StepKind::Debug(s) => s.execute(ctx),
            StepKind::Nop(s) => s.execute(ctx),
        }
    }
}

/// Turns one declaration into a [`StepKind`].
pub type BuildFn = fn(&StepDecl) -> Result<StepKind>;

struct StepEntry {
    kind: &'static str,
    keys: &'static [&'static str],
    build: BuildFn,
}

/// Ordered list of step kinds. Registration order is match order.
pub struct StepRegistry {
    entries: Vec<StepEntry>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a kind claiming declarations that carry any of `keys`.
    pub fn register(&mut self, kind: &'static str, keys: &'static [&'static str], build: BuildFn) {
        self.entries.push(StepEntry { kind, keys, build });
    }

    /// Names of the registered kinds, in match order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.kind).collect()
    }

    /// Build one declaration, including its loop body.
    pub fn build(&self, decl: StepDecl) -> Result<Step> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.keys.iter().any(|k| decl.contains(k)))
            .ok_or_else(|| ScraplineError::UnknownStep(decl.to_string()))?;

        let kind = (entry.build)(&decl)?;
        let policy = StepPolicy::from_decl(&decl, entry.kind)?;

        let nested = match (&policy.loop_expr, decl.get("steps")) {
            (Some(_), Some(Value::Array(items))) => {
                let decls = items
                    .iter()
                    .cloned()
                    .map(StepDecl::try_from)
                    .collect::<Result<Vec<_>>>()
                    .map_err(|e| ScraplineError::step_build(entry.kind, e))?;
                self.build_all(&decls)?
            }
            (Some(_), Some(other)) => {
                return Err(ScraplineError::step_build(
                    entry.kind,
                    format!("`steps` must be a list of declarations, got: {other}"),
                ))
            }
            (Some(_), None) => {
                return Err(ScraplineError::step_build(
                    entry.kind,
                    "`loop` requires a `steps` list",
                ))
            }
            (None, Some(_)) => {
                warn!(step = entry.kind, "`steps` without `loop` is ignored");
                Vec::new()
            }
            (None, None) => Vec::new(),
        };

        debug!(step = entry.kind, nested = nested.len(), "Built step");
        Ok(Step {
            kind,
            policy,
            nested,
            decl,
        })
    }

    /// Build declarations in order, stopping at the first failure.
    pub fn build_all(&self, decls: &[StepDecl]) -> Result<Vec<Step>> {
        decls.iter().cloned().map(|d| self.build(d)).collect()
    }

    /// Create a registry with all built-in step kinds registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("goto", &["goto"], navigate::build);
        registry.register("click", &["click"], click::build);
        registry.register("fill", &["fill"], fill::build);
        registry.register("select", &["select"], select::build);
        registry.register("element", &["element"], extract::build);
        registry.register("table", &["table"], extract::build_table);
        registry.register("screenshot", &["screenshot"], screenshot::build);
        registry.register("eval", &["eval"], eval::build);
        registry.register("sleep", &["sleep"], sleep::build);
        registry.register("mouse", &["mouse"], mouse::build);
        registry.register("omit", &["omit"], omit::build);
        registry.register("config", &["config"], page_config::build);
        registry.register("debug", &["debug"], debug::build);
        // Anchor for loops that carry no action of their own.
        registry.register("nop", &["nop", "loop"], nop::build);
        registry
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ── Builder helpers ─────────────────────────────────────────────

/// A key that must hold a string.
pub(crate) fn required_str(decl: &StepDecl, key: &str, step: &str) -> Result<String> {
    match decl.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ScraplineError::step_build(
            step,
            format!("`{key}` must be a string, got: {other}"),
        )),
        None => Err(ScraplineError::step_build(step, format!("missing `{key}`"))),
    }
}

/// A key that, when present, must hold a string.
pub(crate) fn optional_str(decl: &StepDecl, key: &str, step: &str) -> Result<Option<String>> {
    match decl.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_str(decl, key, step).map(Some),
    }
}

/// Decode the declaration's `params` object into driver options.
pub(crate) fn load_params<T: DeserializeOwned + Default>(decl: &StepDecl, step: &str) -> Result<T> {
    match decl.get("params") {
        None | Some(Value::Null) => Ok(T::default()),
        Some(params) => serde_json::from_value(params.clone())
            .map_err(|e| ScraplineError::step_build(step, format!("invalid `params`: {e}"))),
    }
}

/// Collect `key` and its plural `keys`, each a scalar or a list of scalars.
pub(crate) fn single_or_multi(decl: &StepDecl, key: &str, step: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for k in [key.to_string(), format!("{key}s")] {
        match decl.get(&k) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for item in items {
                    out.push(scalar_text(item).ok_or_else(|| {
                        ScraplineError::step_build(step, format!("`{k}` items must be scalars, got: {item}"))
                    })?);
                }
            }
            Some(v) => out.push(scalar_text(v).ok_or_else(|| {
                ScraplineError::step_build(step, format!("`{k}` must be a scalar or list, got: {v}"))
            })?),
        }
    }
    Ok(out)
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decl(v: Value) -> StepDecl {
        StepDecl::try_from(v).unwrap()
    }

    #[test]
    fn test_builtins_match_in_registration_order() {
        let registry = StepRegistry::with_builtins();
        assert_eq!(
            registry.kinds(),
            vec![
                "goto", "click", "fill", "select", "element", "table", "screenshot", "eval",
                "sleep", "mouse", "omit", "config", "debug", "nop"
            ]
        );

        // `click` is registered before `debug`, so it wins.
        let step = registry
            .build(decl(json!({"debug": "x", "click": "#a"})))
            .unwrap();
        assert_eq!(step.kind_name(), "click");
    }

    #[test]
    fn test_unknown_declaration() {
        let registry = StepRegistry::with_builtins();
        let err = registry.build(decl(json!({"teleport": "mars"}))).unwrap_err();
        assert!(matches!(err, ScraplineError::UnknownStep(ref s) if s.contains("teleport")));
    }

    #[test]
    fn test_mistyped_key_fails_at_build() {
        let registry = StepRegistry::with_builtins();
        let err = registry.build(decl(json!({"click": 42}))).unwrap_err();
        assert!(matches!(err, ScraplineError::StepBuild { ref step, .. } if step == "click"));
    }

    #[test]
    fn test_loop_builds_nested_steps() {
        let registry = StepRegistry::with_builtins();
        let step = registry
            .build(decl(json!({
                "loop": "3",
                "steps": [{"debug": "{{.item}}"}, {"click": "#row-{{ item }}"}]
            })))
            .unwrap();
        assert_eq!(step.kind_name(), "nop");
        assert_eq!(step.policy().loop_expr.as_deref(), Some("3"));
        let nested: Vec<_> = step.nested().iter().map(Step::kind_name).collect();
        assert_eq!(nested, vec!["debug", "click"]);
    }

    #[test]
    fn test_loop_without_steps_or_with_bad_nested() {
        let registry = StepRegistry::with_builtins();
        assert!(registry.build(decl(json!({"loop": "2"}))).is_err());
        let err = registry
            .build(decl(json!({"loop": "2", "steps": [{"click": false}]})))
            .unwrap_err();
        assert!(err.is_build_error());
    }

    #[test]
    fn test_build_all_stops_at_first_error() {
        let registry = StepRegistry::with_builtins();
        let decls = vec![
            decl(json!({"goto": "https://example.com"})),
            decl(json!({"nothing": true})),
        ];
        assert!(matches!(
            registry.build_all(&decls),
            Err(ScraplineError::UnknownStep(_))
        ));
    }

    #[test]
    fn test_single_or_multi() {
        let d = decl(json!({"select": "#s", "value": "a", "values": ["b", 3]}));
        assert_eq!(single_or_multi(&d, "value", "select").unwrap(), vec!["a", "b", "3"]);
        let d = decl(json!({"select": "#s", "values": [{"x": 1}]}));
        assert!(single_or_multi(&d, "value", "select").is_err());
    }

    #[test]
    fn test_load_params_rejects_unknown_fields() {
        let d = decl(json!({"click": "#a", "params": {"timeout": 500.0}}));
        let opts: scrapline_core::types::ClickOptions = load_params(&d, "click").unwrap();
        assert_eq!(opts.timeout, Some(500.0));

        let d = decl(json!({"click": "#a", "params": {"tiemout": 500}}));
        assert!(load_params::<scrapline_core::types::ClickOptions>(&d, "click").is_err());
    }
}
