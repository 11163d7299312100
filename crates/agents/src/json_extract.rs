//! Best-effort JSON extraction from free-form LLM replies.
//!
//! Models are asked to answer "as JSON" but routinely wrap the payload in
//! prose or a markdown fence. Rather than require `json_mode` support from
//! every provider, each sub-agent that needs structured output scans for
//! the first opening brace/bracket and the last matching close, ported
//! verbatim from the reference implementation's `_parse_plan`.

/// Extract the substring spanning the first `{` and the last `}`, then
/// parse it as JSON. Returns `None` on missing delimiters or invalid JSON.
pub fn extract_object(content: &str) -> Option<serde_json::Value> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

/// Extract the substring spanning the first `[` and the last `]`, then
/// parse it as a JSON array.
pub fn extract_array(content: &str) -> Option<Vec<serde_json::Value>> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    if end < start {
        return None;
    }
    match serde_json::from_str(&content[start..=end]) {
        Ok(serde_json::Value::Array(items)) => Some(items),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_wrapped_in_prose() {
        let content = "Sure, here you go:\n```json\n{\"a\": 1}\n```\nHope that helps!";
        assert_eq!(extract_object(content).unwrap(), serde_json::json!({"a": 1}));
    }

    #[test]
    fn returns_none_for_malformed_json() {
        assert!(extract_object("{not json}").is_none());
    }

    #[test]
    fn returns_none_when_no_braces_present() {
        assert!(extract_object("no json here").is_none());
    }

    #[test]
    fn extracts_array_of_strings() {
        let content = "Suggestions:\n[\"a\", \"b\", \"c\"]";
        let arr = extract_array(content).unwrap();
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn array_extraction_rejects_non_array_json() {
        assert!(extract_array("{\"a\": 1}").is_none());
    }
}
