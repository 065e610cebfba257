//! State schema, per-field reducers, merging and introspection.
//!
//! Thread state is an ad hoc mapping of field names to JSON values. What
//! keeps it predictable is the [`StateSchema`]: each field's merge behavior
//! ([`Reducer::Replace`] or [`Reducer::Append`]) is declared once when the
//! graph is built and never inferred at runtime. When a node returns a
//! partial update, [`merge`] applies the registered reducer per key and
//! carries every unspecified key over unchanged.
//!
//! [`introspect`] is the reflection surface for external tooling: it
//! enumerates fields with human-readable type names, editability and
//! descriptions, with no prior schema knowledge, so a UI can render and edit
//! any graph's state.
//!
//! # Examples
//!
//! ```rust
//! use agentgraph_core::state::{merge, Reducer, StateSchema};
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! let schema = StateSchema::new().with_reducer("messages", Reducer::Append);
//!
//! let mut old = HashMap::new();
//! old.insert("messages".to_string(), json!([{"role": "human", "content": "hi"}]));
//! old.insert("draft".to_string(), json!("v1"));
//!
//! let mut update = HashMap::new();
//! update.insert("messages".to_string(), json!([{"role": "ai", "content": "hello"}]));
//! update.insert("draft".to_string(), json!("v2"));
//!
//! let merged = merge(&old, update, &schema);
//! assert_eq!(merged["messages"].as_array().unwrap().len(), 2);
//! assert_eq!(merged["draft"], json!("v2"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Thread state: field name to JSON value.
pub type State = HashMap<String, Value>;

/// Merge strategy applied when a partial update writes a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    /// The update overwrites the old value
    #[default]
    Replace,
    /// The update is concatenated onto the old list, arrival order
    /// preserved, no deduplication
    Append,
}

/// Per-field reducer registry, fixed at graph compile time.
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    reducers: HashMap<String, Reducer>,
}

impl StateSchema {
    /// Create a schema where every field defaults to [`Reducer::Replace`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reducer for a field.
    pub fn with_reducer(mut self, field: impl Into<String>, reducer: Reducer) -> Self {
        self.reducers.insert(field.into(), reducer);
        self
    }

    /// The reducer registered for `field`, defaulting to `Replace`.
    pub fn reducer_for(&self, field: &str) -> Reducer {
        self.reducers.get(field).copied().unwrap_or_default()
    }
}

/// Merge a partial update into `old`, applying each field's reducer.
///
/// Keys absent from `partial` are carried over unchanged. For `Append`
/// fields, a missing or non-array old value is treated as an empty list and
/// a non-array update value is appended as a single element.
pub fn merge(old: &State, partial: State, schema: &StateSchema) -> State {
    let mut merged = old.clone();
    for (key, value) in partial {
        match schema.reducer_for(&key) {
            Reducer::Replace => {
                merged.insert(key, value);
            }
            Reducer::Append => {
                let mut items = match merged.remove(&key) {
                    Some(Value::Array(existing)) => existing,
                    _ => Vec::new(),
                };
                match value {
                    Value::Array(new_items) => items.extend(new_items),
                    single => items.push(single),
                }
                merged.insert(key, Value::Array(items));
            }
        }
    }
    merged
}

/// Reflection summary of one state field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Human-readable type name, e.g. `"str"`, `"list[Message]"`, `"dict"`
    #[serde(rename = "type")]
    pub type_name: String,

    /// Whether external tooling may edit this field
    pub editable: bool,

    /// Human-readable description of the field's purpose
    pub description: String,

    /// Current value, as stored
    pub value: Value,

    /// Element count, for list fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    /// Top-level keys, for mapping fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,

    /// Character length, for string fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

/// Enumerate all state fields with type, editability and description.
///
/// Works without prior schema knowledge by inspecting the runtime value
/// shapes; message lists are detected structurally.
pub fn introspect(state: &State) -> HashMap<String, FieldInfo> {
    state
        .iter()
        .map(|(key, value)| {
            let mut info = FieldInfo {
                type_name: type_name(value),
                editable: true,
                description: describe_field(key),
                value: value.clone(),
                count: None,
                keys: None,
                length: None,
            };
            match value {
                Value::Array(items) => info.count = Some(items.len()),
                Value::Object(map) => info.keys = Some(map.keys().cloned().collect()),
                Value::String(s) => info.length = Some(s.chars().count()),
                _ => {}
            }
            (key.clone(), info)
        })
        .collect()
}

/// Human-readable type name for a JSON value.
fn type_name(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(n) if n.is_f64() => "float".to_string(),
        Value::Number(_) => "int".to_string(),
        Value::String(_) => "str".to_string(),
        Value::Object(_) => "dict".to_string(),
        Value::Array(items) => match items.first() {
            None => "list".to_string(),
            Some(first) if looks_like_message(first) => "list[Message]".to_string(),
            Some(first) => format!("list[{}]", type_name(first)),
        },
    }
}

/// A serialized message is an object with at least `role` and `content`.
fn looks_like_message(value: &Value) -> bool {
    value
        .as_object()
        .map(|o| o.contains_key("role") && o.contains_key("content"))
        .unwrap_or(false)
}

/// Curated descriptions for well-known fields; generic fallback otherwise.
fn describe_field(key: &str) -> String {
    match key {
        "messages" => {
            "The conversation history including all messages (human, AI, tool calls, tool results)"
                .to_string()
        }
        "agent_system_prompt" => {
            "The system prompt that guides the AI agent's behavior".to_string()
        }
        "tool_execution_message" => "Message shown when tools are executing".to_string(),
        "temperature" => {
            "Controls randomness in AI responses (0.0 = deterministic, 1.0 = creative)".to_string()
        }
        "max_iterations" => {
            "Maximum number of graph execution steps before stopping".to_string()
        }
        other => format!("State field: {other}"),
    }
}
