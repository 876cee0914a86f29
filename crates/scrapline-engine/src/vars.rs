use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, info};

use scrapline_core::config::{RandomSpec, Variable, VariableDecl, VariableKind};
use scrapline_core::error::{Result, ScraplineError};

/// Zero-argument producer of a fresh variable value.
pub type Generator = Arc<dyn Fn() -> String + Send + Sync>;

/// A variable cell: either a settled string or a generator re-run on every read.
#[derive(Clone)]
pub enum VarValue {
    Fixed(String),
    Generator(Generator),
}

impl VarValue {
    pub fn resolve(&self) -> String {
        match self {
            VarValue::Fixed(s) => s.clone(),
            VarValue::Generator(get) => get(),
        }
    }
}

impl std::fmt::Debug for VarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarValue::Fixed(s) => f.debug_tuple("Fixed").field(s).finish(),
            VarValue::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

/// Named values read by templates and guards.
///
/// Owned by exactly one engine execution or session.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    values: HashMap<String, VarValue>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialise a store from validated definitions, in document order.
    pub fn from_variables(vars: &[Variable]) -> Self {
        let mut store = Self::new();
        for var in vars {
            store.define(var);
        }
        info!(count = store.len(), "Variables initialized");
        store
    }

    /// Validate and initialise from raw declarations; fails on the first bad one.
    pub fn from_decls(decls: &[VariableDecl]) -> Result<Self> {
        let vars = decls
            .iter()
            .cloned()
            .map(Variable::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_variables(&vars))
    }

    fn define(&mut self, var: &Variable) {
        let prefix = var.prefix.clone();
        let suffix = var.suffix.clone();
        match &var.kind {
            VariableKind::Static(value) => {
                self.set_once(&var.name, format!("{prefix}{value}{suffix}"));
                debug!(name = %var.name, "Set static variable");
            }
            VariableKind::RandomOnce(spec) => {
                let value = format!("{prefix}{}{suffix}", random_string(spec));
                self.set_once(&var.name, value);
                debug!(name = %var.name, "Set random-once variable");
            }
            VariableKind::RandomAlways(spec) => {
                let spec = spec.clone();
                self.set_getter(
                    &var.name,
                    Arc::new(move || format!("{prefix}{}{suffix}", random_string(&spec))),
                );
                debug!(name = %var.name, "Set random-always variable");
            }
        }
    }

    pub fn set_once(&mut self, name: &str, value: impl Into<String>) {
        self.values
            .insert(name.to_string(), VarValue::Fixed(value.into()));
    }

    pub fn set_getter(&mut self, name: &str, generator: Generator) {
        self.values
            .insert(name.to_string(), VarValue::Generator(generator));
    }

    /// Resolve a variable; `None` when it is not defined.
    pub fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).map(VarValue::resolve)
    }

    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Resolve a variable that must exist.
    pub fn get_or_fail(&self, name: &str) -> Result<String> {
        self.get(name)
            .ok_or_else(|| ScraplineError::UndefinedVariable(name.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.values.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Every variable fully resolved. Generators run once per call, so two
    /// snapshots may legitimately disagree on random-always variables.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.resolve()))
            .collect()
    }

    /// Every variable with generators left unresolved, for template engines
    /// that can call them lazily.
    pub fn live_snapshot(&self) -> HashMap<String, VarValue> {
        self.values.clone()
    }
}

/// Draw `spec.length` characters uniformly from `spec.charset`.
pub fn random_string(spec: &RandomSpec) -> String {
    let chars: Vec<char> = spec.charset.chars().collect();
    let mut rng = rand::thread_rng();
    (0..spec.length)
        .filter_map(|_| chars.choose(&mut rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str) -> VariableDecl {
        VariableDecl {
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_static_with_prefix_and_suffix() {
        let store = VariableStore::from_decls(&[VariableDecl {
            value: Some("bob".into()),
            prefix: "<".into(),
            postfix: ">".into(),
            ..decl("user")
        }])
        .unwrap();
        assert_eq!(store.get("user").as_deref(), Some("<bob>"));
    }

    #[test]
    fn test_random_once_is_stable() {
        let store = VariableStore::from_decls(&[VariableDecl {
            random: Some("once".into()),
            random_chars: Some("abcdef".into()),
            random_length: Some(12),
            ..decl("token")
        }])
        .unwrap();
        let first = store.snapshot();
        let second = store.snapshot();
        assert_eq!(first["token"], second["token"]);
        assert_eq!(first["token"].len(), 12);
    }

    #[test]
    fn test_random_always_changes_between_snapshots() {
        let store = VariableStore::from_decls(&[VariableDecl {
            random: Some("always".into()),
            random_chars: Some("ab".into()),
            random_length: Some(16),
            prefix: "id-".into(),
            ..decl("nonce")
        }])
        .unwrap();
        let values: Vec<String> = (0..20).map(|_| store.snapshot()["nonce"].clone()).collect();
        assert!(values.iter().all(|v| v.starts_with("id-") && v.len() == 19));
        assert!(
            values.iter().any(|v| v != &values[0]),
            "20 random-always reads were identical"
        );
    }

    #[test]
    fn test_invalid_declaration_aborts_initialization() {
        let result = VariableStore::from_decls(&[
            VariableDecl {
                value: Some("ok".into()),
                ..decl("fine")
            },
            decl("broken"),
        ]);
        assert!(matches!(result, Err(ScraplineError::Variable { ref name, .. }) if name == "broken"));
    }

    #[test]
    fn test_get_or_fail_names_the_variable() {
        let store = VariableStore::new();
        assert!(store.get("missing").is_none());
        assert_eq!(store.get_or("missing", "fallback"), "fallback");
        let err = store.get_or_fail("missing").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_live_snapshot_keeps_generators() {
        let mut store = VariableStore::new();
        store.set_once("a", "1");
        store.set_getter("b", Arc::new(|| "fresh".to_string()));
        let live = store.live_snapshot();
        assert!(matches!(live["a"], VarValue::Fixed(ref s) if s == "1"));
        assert!(matches!(live["b"], VarValue::Generator(_)));
        assert_eq!(live["b"].resolve(), "fresh");
    }

    #[test]
    fn test_remove() {
        let mut store = VariableStore::new();
        store.set_once("a", "1");
        assert!(store.remove("a"));
        assert!(!store.contains("a"));
        assert!(!store.remove("a"));
    }
}
