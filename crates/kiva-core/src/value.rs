use serde_json::{Map, Value};

/// A stored document: a string-keyed mapping of JSON-like values.
pub type Document = Map<String, Value>;

/// Read a possibly-nested field by dot-separated path. An intermediate
/// segment that is not an object makes the whole lookup absent (`None`),
/// matching the index/encryption engines' "treat as absent" edge case.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;
    for seg in segments {
        current = current.as_object()?.get(seg)?;
    }
    Some(current)
}

/// Write a possibly-nested field by dot-separated path, creating
/// intermediate objects as needed.
pub fn set_path(doc: &mut Document, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let first = segments.next().unwrap_or(path);
    if segments.peek().is_none() {
        doc.insert(first.to_string(), value);
        return;
    }
    let entry = doc
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    let mut current = entry.as_object_mut().unwrap();
    let mut seg = segments.next().unwrap();
    loop {
        match segments.peek() {
            None => {
                current.insert(seg.to_string(), value);
                return;
            }
            Some(_) => {
                let next = current
                    .entry(seg.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !next.is_object() {
                    *next = Value::Object(Map::new());
                }
                current = next.as_object_mut().unwrap();
                seg = segments.next().unwrap();
            }
        }
    }
}

/// Serialize a JSON-array-encoded composite key from an ordered list of
/// field paths extracted from a document. Missing fields serialize as null.
pub fn composite_key(doc: &Document, fields: &[String]) -> String {
    let values: Vec<Value> = fields
        .iter()
        .map(|f| get_path(doc, f).cloned().unwrap_or(Value::Null))
        .collect();
    serde_json::to_string(&Value::Array(values)).expect("json arrays always serialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Document {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn get_path_top_level() {
        let doc = obj(json!({"name": "Alice"}));
        assert_eq!(get_path(&doc, "name"), Some(&json!("Alice")));
    }

    #[test]
    fn get_path_nested() {
        let doc = obj(json!({"a": {"b": {"c": 1}}}));
        assert_eq!(get_path(&doc, "a.b.c"), Some(&json!(1)));
    }

    #[test]
    fn get_path_missing_intermediate_is_absent() {
        let doc = obj(json!({"a": 1}));
        assert_eq!(get_path(&doc, "a.b.c"), None);
    }

    #[test]
    fn set_path_creates_intermediate_objects() {
        let mut doc = obj(json!({}));
        set_path(&mut doc, "a.b.c", json!(42));
        assert_eq!(get_path(&doc, "a.b.c"), Some(&json!(42)));
    }

    #[test]
    fn composite_key_missing_field_is_null() {
        let doc = obj(json!({"color": "blue"}));
        let key = composite_key(&doc, &["color".to_string(), "size".to_string()]);
        assert_eq!(key, "[\"blue\",null]");
    }
}
