//! Loosely-typed view over a decoded metadata document
//!
//! The execution engine's metadata schema is additive and inconsistently
//! typed (numbers arrive as strings, booleans as "true", fields appear and
//! disappear between engine versions). All "may be absent or the wrong type"
//! handling is concentrated here: every accessor returns a safe default
//! instead of failing.

use serde_json::{Map, Value};

static NULL: Value = Value::Null;

/// Borrowed, never-failing accessor over a JSON value
#[derive(Debug, Clone, Copy)]
pub struct DocView<'a> {
    value: &'a Value,
}

impl<'a> DocView<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// The underlying JSON value
    pub fn raw(&self) -> &'a Value {
        self.value
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn is_object(&self) -> bool {
        self.value.is_object()
    }

    /// Child value by key; a null view when absent or when `self` is not an object
    pub fn get(&self, key: &str) -> DocView<'a> {
        DocView::new(self.value.get(key).unwrap_or(&NULL))
    }

    /// Scalar rendered as a string; empty when absent or structured
    pub fn as_string(&self) -> String {
        match self.value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        }
    }

    /// Scalar as a string, `None` when absent, structured, or empty
    pub fn as_opt_string(&self) -> Option<String> {
        let s = self.as_string();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }

    /// Integer, coercing numeric strings and truncating floats
    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
            }
            _ => None,
        }
    }

    /// Float, coercing numeric strings
    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Boolean, accepting "true"/"false" strings
    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn str(&self, key: &str) -> String {
        self.get(key).as_string()
    }

    pub fn opt_str(&self, key: &str) -> Option<String> {
        self.get(key).as_opt_string()
    }

    pub fn i64_or(&self, key: &str, default: i64) -> i64 {
        self.get(key).as_i64().unwrap_or(default)
    }

    pub fn f64_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).as_f64().unwrap_or(default)
    }

    /// Array elements; empty when absent or not an array
    pub fn items(&self) -> impl Iterator<Item = DocView<'a>> + 'a {
        let value: &'a Value = self.value;
        value
            .as_array()
            .map(|a| a.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(DocView::new)
    }

    /// Object entries; empty when absent or not an object
    pub fn entries(&self) -> impl Iterator<Item = (&'a str, DocView<'a>)> + 'a {
        let value: &'a Value = self.value;
        value
            .as_object()
            .into_iter()
            .flat_map(|m: &'a Map<String, Value>| m.iter())
            .map(|(k, v)| (k.as_str(), DocView::new(v)))
    }

    /// Object of scalars flattened into string pairs, skipping structured values
    pub fn string_map(&self) -> Vec<(String, String)> {
        self.entries()
            .filter(|(_, v)| !v.raw().is_object() && !v.raw().is_array())
            .map(|(k, v)| (k.to_string(), v.as_string()))
            .collect()
    }

    /// Owned copy of the value, `Value::Null` when absent
    pub fn to_value(&self) -> Value {
        self.value.clone()
    }
}

/// Human-readable JSON type name for error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_keys_default() {
        let value = json!({"a": 1});
        let doc = DocView::new(&value);

        assert_eq!(doc.str("missing"), "");
        assert_eq!(doc.i64_or("missing", -1), -1);
        assert_eq!(doc.f64_or("missing", 2.5), 2.5);
        assert!(doc.get("missing").get("deeper").is_null());
    }

    #[test]
    fn test_numeric_coercion() {
        let value = json!({"rc": "137", "float": 3.9, "text": "abc", "padded": " 42 "});
        let doc = DocView::new(&value);

        assert_eq!(doc.get("rc").as_i64(), Some(137));
        assert_eq!(doc.get("float").as_i64(), Some(3));
        assert_eq!(doc.get("text").as_i64(), None);
        assert_eq!(doc.get("padded").as_i64(), Some(42));
        assert_eq!(doc.get("rc").as_f64(), Some(137.0));
    }

    #[test]
    fn test_scalars_as_strings() {
        let value = json!({"n": 4, "b": true, "o": {"x": 1}});
        let doc = DocView::new(&value);

        assert_eq!(doc.str("n"), "4");
        assert_eq!(doc.str("b"), "true");
        assert_eq!(doc.str("o"), "");
        assert_eq!(doc.opt_str("o"), None);
    }

    #[test]
    fn test_bool_strings() {
        let value = json!({"hit": "TRUE", "miss": "false", "junk": "maybe"});
        let doc = DocView::new(&value);

        assert_eq!(doc.get("hit").as_bool(), Some(true));
        assert_eq!(doc.get("miss").as_bool(), Some(false));
        assert_eq!(doc.get("junk").as_bool(), None);
    }

    #[test]
    fn test_items_and_entries_on_wrong_types() {
        let value = json!({"list": "not a list", "map": [1, 2]});
        let doc = DocView::new(&value);

        assert_eq!(doc.get("list").items().count(), 0);
        assert_eq!(doc.get("map").entries().count(), 0);
        assert_eq!(doc.get("map").items().count(), 2);
    }

    #[test]
    fn test_string_map_skips_structured() {
        let value = json!({"labels": {"team": "genomics", "nested": {"a": 1}, "n": 2}});
        let mut pairs = DocView::new(&value).get("labels").string_map();
        pairs.sort();

        assert_eq!(
            pairs,
            vec![
                ("n".to_string(), "2".to_string()),
                ("team".to_string(), "genomics".to_string())
            ]
        );
    }

    #[test]
    fn test_json_type_name() {
        assert_eq!(json_type_name(&json!([1])), "array");
        assert_eq!(json_type_name(&json!("s")), "string");
        assert_eq!(json_type_name(&json!({})), "object");
    }
}
