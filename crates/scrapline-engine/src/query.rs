use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use scrapline_core::error::{Result, ScraplineError};

/// Splits a query into tokens while keeping quoted values intact.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]*)"|\S+"#).unwrap());

/// Comparison operators understood by the guard language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Exact string equality.
    Is,
    /// `value` compiled as a regex and tested against the field.
    Match,
    /// Substring test.
    Contains,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "is" => Some(Self::Is),
            "match" => Some(Self::Match),
            "contains" => Some(Self::Contains),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::Match => "match",
            Self::Contains => "contains",
        }
    }
}

/// A parsed `<field> <operator> <value>` expression.
///
/// `op` is kept as text so a hand-built query with an unknown operator is
/// still representable; [`Query::evaluate`] rejects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub field: String,
    pub op: String,
    pub value: String,
}

impl Query {
    /// Parse a guard expression.
    ///
    /// Everything after the operator is the value; quoted tokens keep their
    /// inner whitespace and lose the quotes.
    pub fn parse(query: &str) -> Result<Self> {
        let tokens: Vec<&str> = TOKEN_RE.find_iter(query).map(|m| m.as_str()).collect();
        if tokens.len() < 3 {
            return Err(ScraplineError::Query(format!(
                "expected `<field> <operator> <value>`, got {query:?}"
            )));
        }

        let field = tokens[0].trim_matches('"').to_string();
        let op = tokens[1];
        if Operator::parse(op).is_none() {
            return Err(ScraplineError::Query(format!(
                "unsupported operator {op:?} in {query:?}"
            )));
        }
        let value = tokens[2..].join(" ").trim_matches('"').to_string();

        debug!(field = %field, op, value = %value, "Parsed query");
        Ok(Self {
            field,
            op: op.to_string(),
            value,
        })
    }

    /// Evaluate against a resolved variable snapshot.
    ///
    /// A field missing from the snapshot is compared as its own literal text.
    pub fn evaluate(&self, data: &HashMap<String, String>) -> Result<bool> {
        let actual = match data.get(&self.field) {
            Some(v) => v.as_str(),
            None => {
                debug!(field = %self.field, "Field not found, comparing literal text");
                self.field.as_str()
            }
        };

        let op = Operator::parse(&self.op)
            .ok_or_else(|| ScraplineError::QueryEval(format!("unknown operator {:?}", self.op)))?;

        let outcome = match op {
            Operator::Is => actual == self.value,
            Operator::Contains => actual.contains(&self.value),
            Operator::Match => {
                let re = Regex::new(&self.value).map_err(|e| {
                    ScraplineError::QueryEval(format!("invalid regex {:?}: {e}", self.value))
                })?;
                re.is_match(actual)
            }
        };

        debug!(field = %self.field, op = op.as_str(), outcome, "Evaluated query");
        Ok(outcome)
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {:?}", self.field, self.op, self.value)
    }
}
