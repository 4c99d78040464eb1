//! Boolean filter queries evaluated against JSON document sources.
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Field at the dotted path equals `value`.
    Term { field: String, value: Value },
}

impl Filter {
    fn matches(&self, source: &Value) -> bool {
        match self {
            Filter::Term { field, value } => lookup(source, field) == Some(value),
        }
    }
}

/// Conjunction of filters. An empty query matches every document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountQuery {
    pub filters: Vec<Filter>,
}

impl CountQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Term {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn matches(&self, source: &Value) -> bool {
        self.filters.iter().all(|filter| filter.matches(source))
    }
}

fn lookup<'a>(source: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(source, |current, segment| current.get(segment))
}
