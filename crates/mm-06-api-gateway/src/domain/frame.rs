//! Server to client push frame: a JSON object holding only populated keys.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushFrame {
    fields: Map<String, Value>,
}

impl PushFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        self.fields
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn merge(&mut self, other: PushFrame) {
        self.fields.extend(other.fields);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_inserted_keys_are_sent() {
        let mut frame = PushFrame::new();
        assert!(frame.is_empty());
        frame.insert("pong", &true).unwrap();

        let mut other = PushFrame::new();
        other.insert("vBytesPerSecond", &1250.5).unwrap();
        frame.merge(other);

        let text = frame.to_text().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 2);
        assert_eq!(value["pong"], true);
    }
}
