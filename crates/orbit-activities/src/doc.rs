//! Untyped CMS documents and the coercion helpers applied at the boundary.
//!
//! The CMS is schemaless on the wire: relations arrive either as string ids
//! or populated objects depending on query depth, and counters arrive as
//! whatever JSON number the storage layer last wrote. Everything outside
//! `cms` works with typed records; these helpers are how the records get
//! built.

use serde_json::{Map, Value};

/// A raw CMS document.
pub type Doc = Map<String, Value>;

/// The document's `id`, empty when absent.
pub fn doc_id(doc: &Doc) -> String {
    get_string(doc, "id")
}

/// A string field, `None` when absent or not a string.
pub fn get_str<'a>(doc: &'a Doc, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

/// A string field, empty string when absent.
pub fn get_string(doc: &Doc, field: &str) -> String {
    get_str(doc, field).unwrap_or_default().to_string()
}

/// A boolean field, `false` when absent.
pub fn get_bool(doc: &Doc, field: &str) -> bool {
    doc.get(field).and_then(Value::as_bool).unwrap_or(false)
}

/// Numeric coercion: counters arrive as integer or floating-point
/// representations; absent or non-numeric fields read as zero.
pub fn get_int_value(doc: &Doc, field: &str) -> i64 {
    match doc.get(field) {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                n.as_f64().map(|f| f as i64).unwrap_or(0)
            }
        }
        _ => 0,
    }
}

/// A nested object field.
pub fn get_doc<'a>(doc: &'a Doc, field: &str) -> Option<&'a Doc> {
    doc.get(field).and_then(Value::as_object)
}

/// An array field, empty when absent.
pub fn get_array<'a>(doc: &'a Doc, field: &str) -> &'a [Value] {
    doc.get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Relation resolution: a relation field may be a string id or a populated
/// object carrying its own `id`. Returns the id either way, empty string
/// when absent or malformed.
pub fn extract_relation_id(doc: &Doc, field: &str) -> String {
    match doc.get(field) {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Object(obj)) => obj
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// The populated form of a relation, when depth made the CMS expand it.
pub fn relation_doc<'a>(doc: &'a Doc, field: &str) -> Option<&'a Doc> {
    match doc.get(field) {
        Some(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Doc {
        value.as_object().expect("object").clone()
    }

    #[test]
    fn relation_id_from_string_form() {
        let d = doc(json!({"cluster": "cl-1"}));
        assert_eq!(extract_relation_id(&d, "cluster"), "cl-1");
    }

    #[test]
    fn relation_id_from_populated_form() {
        let d = doc(json!({"cluster": {"id": "cl-2", "name": "prod"}}));
        assert_eq!(extract_relation_id(&d, "cluster"), "cl-2");
    }

    #[test]
    fn relation_id_absent_or_malformed_is_empty() {
        let d = doc(json!({"cluster": 42, "other": null}));
        assert_eq!(extract_relation_id(&d, "cluster"), "");
        assert_eq!(extract_relation_id(&d, "other"), "");
        assert_eq!(extract_relation_id(&d, "missing"), "");

        let no_id = doc(json!({"cluster": {"name": "prod"}}));
        assert_eq!(extract_relation_id(&no_id, "cluster"), "");
    }

    #[test]
    fn int_value_accepts_integer_and_float() {
        let d = doc(json!({"a": 7, "b": 7.0, "c": 7.9, "d": "7", "e": null}));
        assert_eq!(get_int_value(&d, "a"), 7);
        assert_eq!(get_int_value(&d, "b"), 7);
        assert_eq!(get_int_value(&d, "c"), 7);
        assert_eq!(get_int_value(&d, "d"), 0);
        assert_eq!(get_int_value(&d, "e"), 0);
        assert_eq!(get_int_value(&d, "missing"), 0);
    }

    #[test]
    fn string_and_bool_defaults() {
        let d = doc(json!({"name": "events", "flag": true}));
        assert_eq!(get_string(&d, "name"), "events");
        assert_eq!(get_string(&d, "missing"), "");
        assert!(get_bool(&d, "flag"));
        assert!(!get_bool(&d, "missing"));
    }

    #[test]
    fn relation_doc_only_for_populated_form() {
        let populated = doc(json!({"cluster": {"id": "cl-2"}}));
        assert!(relation_doc(&populated, "cluster").is_some());

        let string_form = doc(json!({"cluster": "cl-1"}));
        assert!(relation_doc(&string_form, "cluster").is_none());
    }
}
