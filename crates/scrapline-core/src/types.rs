use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique session identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A free-form step declaration: the key/value bag a document carries for one step.
///
/// Which step kind claims it is decided by the keys that are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepDecl(pub Map<String, Value>);

impl StepDecl {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Builder-style insert, handy for constructing declarations in code.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl From<Map<String, Value>> for StepDecl {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for StepDecl {
    type Error = crate::error::ScraplineError;

    fn try_from(value: Value) -> crate::error::Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(crate::error::ScraplineError::Config(format!(
                "step declaration must be an object, got: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for StepDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

/// One slot of a [`ResultMap`].
///
/// `Single` doubles as the first-write marker: a second write to the same key
/// turns it into `Many`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSlot {
    Single(Value),
    Many(Vec<Value>),
}

impl ResultSlot {
    pub fn to_value(&self) -> Value {
        match self {
            ResultSlot::Single(v) => v.clone(),
            ResultSlot::Many(items) => Value::Array(items.clone()),
        }
    }
}

/// The structured output of a pipeline execution, keyed by `set-var` name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultMap {
    entries: BTreeMap<String, ResultSlot>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value with accumulation semantics.
    ///
    /// The first write stores the value as is, the second converts the slot to
    /// a two-element list, later writes append.
    pub fn store(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.remove(&key) {
            None => {
                self.entries.insert(key, ResultSlot::Single(value));
            }
            Some(ResultSlot::Single(first)) => {
                self.entries.insert(key, ResultSlot::Many(vec![first, value]));
            }
            Some(ResultSlot::Many(mut items)) => {
                items.push(value);
                self.entries.insert(key, ResultSlot::Many(items));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(ResultSlot::to_value)
    }

    pub fn slot(&self, key: &str) -> Option<&ResultSlot> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, slot)| (k.clone(), slot.to_value()))
                .collect(),
        )
    }
}

impl Serialize for ResultMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, slot) in &self.entries {
            match slot {
                ResultSlot::Single(v) => map.serialize_entry(key, v)?,
                ResultSlot::Many(items) => map.serialize_entry(key, items)?,
            }
        }
        map.end()
    }
}

// ── Driver option types ─────────────────────────────────────────
//
// Decoded from a declaration's `params` object at build time.

/// When a navigation is considered finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    NetworkIdle,
    Commit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NavigateOptions {
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub wait_until: Option<WaitUntil>,
    #[serde(default)]
    pub referer: Option<String>,
}

/// Outcome of a navigation, when the driver reports one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationResponse {
    pub url: String,
    #[serde(default)]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickOptions {
    #[serde(default)]
    pub button: Option<MouseButton>,
    #[serde(default)]
    pub click_count: Option<u32>,
    #[serde(default)]
    pub delay: Option<f64>,
    #[serde(default)]
    pub force: Option<bool>,
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub timeout: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FillOptions {
    #[serde(default)]
    pub force: Option<bool>,
    #[serde(default)]
    pub no_wait_after: Option<bool>,
    #[serde(default)]
    pub timeout: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectOptions {
    #[serde(default)]
    pub force: Option<bool>,
    #[serde(default)]
    pub no_wait_after: Option<bool>,
    #[serde(default)]
    pub timeout: Option<f64>,
}

/// Which `<option>`s to select. Every list may be populated at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectValues {
    pub values: Vec<String>,
    pub labels: Vec<String>,
    pub values_or_labels: Vec<String>,
    pub indexes: Vec<usize>,
}

impl SelectValues {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
            && self.labels.is_empty()
            && self.values_or_labels.is_empty()
            && self.indexes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreenshotOptions {
    #[serde(default)]
    pub format: Option<ImageFormat>,
    #[serde(default)]
    pub quality: Option<u8>,
    #[serde(default)]
    pub omit_background: Option<bool>,
    #[serde(default)]
    pub timeout: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluateOptions {
    #[serde(default)]
    pub arg: Option<Value>,
    #[serde(default)]
    pub timeout: Option<f64>,
}
