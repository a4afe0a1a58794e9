//! Model definitions: endpoint, identity, defaults and validation rules.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};

use crate::data::error::FieldErrors;
use crate::data::path;

/// A per-field validation rule.
#[derive(Clone)]
pub enum Rule {
    /// Present, non-null, and not an empty string or list.
    Required,
    /// String form of the value matches the expression.
    Pattern(Regex),
    /// At least `n` characters (strings) or items (lists).
    MinLength(usize),
    /// Arbitrary check with its own message.
    Predicate {
        check: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
        message: String,
    },
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => write!(f, "Required"),
            Rule::Pattern(re) => write!(f, "Pattern({})", re.as_str()),
            Rule::MinLength(n) => write!(f, "MinLength({})", n),
            Rule::Predicate { message, .. } => write!(f, "Predicate({})", message),
        }
    }
}

impl Rule {
    pub fn pattern(expression: &str) -> Result<Self, regex::Error> {
        Ok(Rule::Pattern(Regex::new(expression)?))
    }

    pub fn predicate<F>(message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Rule::Predicate {
            check: Arc::new(check),
            message: message.into(),
        }
    }

    /// Error message for `field`, or `None` when the rule passes.
    ///
    /// Only `Required` complains about a missing value; the other rules
    /// skip absent fields.
    fn check(&self, field: &str, value: Option<&Value>) -> Option<String> {
        let present = value.filter(|v| !is_blank(v));
        match (self, present) {
            (Rule::Required, None) => Some(format!("{} is required", field)),
            (Rule::Required, Some(_)) => None,
            (_, None) => None,
            (Rule::Pattern(re), Some(v)) => {
                (!re.is_match(&path::display(v))).then(|| format!("{} is invalid", field))
            }
            (Rule::MinLength(min), Some(v)) => {
                let len = match v {
                    Value::String(s) => s.chars().count(),
                    Value::Array(items) => items.len(),
                    other => path::display(other).chars().count(),
                };
                (len < *min).then(|| format!("{} must be at least {} characters", field, min))
            }
            (Rule::Predicate { check, message }, Some(v)) => (!check(v)).then(|| message.clone()),
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Declared shape of a model type ("model class").
#[derive(Debug, Clone)]
pub struct ModelDef {
    name: String,
    endpoint: String,
    id_attribute: String,
    defaults: Map<String, Value>,
    rules: Vec<(String, Rule)>,
    bookkeeping: Vec<String>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            id_attribute: "id".to_string(),
            defaults: Map::new(),
            rules: Vec::new(),
            bookkeeping: vec!["updated_at".to_string()],
        }
    }

    pub fn id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = attribute.into();
        self
    }

    pub fn default_value(mut self, attribute: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(attribute.into(), value);
        self
    }

    pub fn rule(mut self, field: impl Into<String>, rule: Rule) -> Self {
        self.rules.push((field.into(), rule));
        self
    }

    /// Fields always sent alongside the diff on update (timestamps etc.).
    pub fn bookkeeping<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bookkeeping = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn identity_attribute(&self) -> &str {
        &self.id_attribute
    }

    pub fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }

    pub fn bookkeeping_fields(&self) -> &[String] {
        &self.bookkeeping
    }

    pub fn has_rules(&self) -> bool {
        !self.rules.is_empty()
    }

    /// `endpoint` for collections/creates, `endpoint/<id>` for members.
    pub fn build_url(&self, id: Option<&Value>) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match id {
            Some(id) => format!("{}/{}", base, identity_key(id)),
            None => base.to_string(),
        }
    }

    /// Run every rule against `attributes`.
    pub fn validate(&self, attributes: &Map<String, Value>) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for (field, rule) in &self.rules {
            if let Some(message) = rule.check(field, path::get_in(attributes, field)) {
                errors.entry(field.clone()).or_default().push(message);
            }
        }
        errors
    }
}

/// String form of an identity, so `5` and `"5"` address the same record.
pub fn identity_key(id: &Value) -> String {
    path::display(id)
}
