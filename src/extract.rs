use serde_json::Value;

// The upstream API has shipped several response shapes over time. Extractors
// are tried in order; the first non-empty match wins. Adding a new shape is
// one more entry in the list.
type Extractor = fn(&Value) -> Option<&str>;

const EXTRACTORS: &[Extractor] = &[
    |v| v.get("token").and_then(Value::as_str),
    |v| v.pointer("/choices/0/text").and_then(Value::as_str),
    |v| v.pointer("/choices/0/message/content").and_then(Value::as_str),
    |v| v.pointer("/output/text").and_then(Value::as_str),
    |v| v.get("text").and_then(Value::as_str),
];

pub fn extract_text(value: &Value) -> Option<String> {
    EXTRACTORS
        .iter()
        .filter_map(|extract| extract(value))
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recognizes_all_shapes() {
        assert_eq!(
            extract_text(&json!({"token": "a"})).as_deref(),
            Some("a")
        );
        assert_eq!(
            extract_text(&json!({"choices": [{"text": "b"}]})).as_deref(),
            Some("b")
        );
        assert_eq!(
            extract_text(&json!({"choices": [{"message": {"content": "c"}}]})).as_deref(),
            Some("c")
        );
        assert_eq!(
            extract_text(&json!({"output": {"text": "d"}})).as_deref(),
            Some("d")
        );
        assert_eq!(extract_text(&json!({"text": "e"})).as_deref(), Some("e"));
    }

    #[test]
    fn empty_match_falls_through_to_next_shape() {
        let value = json!({"choices": [{"text": ""}], "output": {"text": "kept"}});
        assert_eq!(extract_text(&value).as_deref(), Some("kept"));
    }

    #[test]
    fn unrecognized_shape_yields_none() {
        assert!(extract_text(&json!({"usage": {"tokens": 3}})).is_none());
        assert!(extract_text(&json!(null)).is_none());
    }
}
