use serde_json::Value;

/// Renders arbitrary values into the strings that end up in reports.
/// Collaborator boundary: the engine never formats foreign values itself.
pub trait Serializer: Send + Sync {
    fn serialize(&self, value: &Value) -> String;
}

/// Default rendering: primitives bare, compound values as compact JSON,
/// anything that refuses to serialize as the literal fallback token.
#[derive(Debug, Default)]
pub struct BasicSerializer;

pub const UNSERIALIZABLE: &str = "Unserializable Object";

impl Serializer for BasicSerializer {
    fn serialize(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_else(|_| UNSERIALIZABLE.to_string()),
        }
    }
}
