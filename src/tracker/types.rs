use serde::Deserialize;
use serde_json::{Map, Value};

/// An issue with only the requested fields populated.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub key: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Issue {
    /// Numeric value of a field. Absent, null and non-numeric values are `None`.
    pub fn number_field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }
}

/// One page of search results plus the server-side match count.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum SprintState {
    Future,
    Active,
    Closed,
    Other(String),
}

impl From<String> for SprintState {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "future" => SprintState::Future,
            "active" | "open" => SprintState::Active,
            "closed" => SprintState::Closed,
            _ => SprintState::Other(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sprint {
    pub id: u64,
    pub name: String,
    pub state: SprintState,
}

impl Sprint {
    pub fn is_closed(&self) -> bool {
        self.state == SprintState::Closed
    }
}
