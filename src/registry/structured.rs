//! Best-effort recovery of a JSON object from free-form model output.

use crate::registry::prompt::fallback_template;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

pub trait ExtractionStrategy {
    fn name(&self) -> &'static str;
    fn extract(&self, text: &str) -> Option<Value>;
}

/// A ```json fenced block.
pub struct FencedJson;

/// The first `{` from which a complete JSON object parses; trailing prose is ignored.
pub struct InlineObject;

/// Always succeeds: the fixed template with `full_text` set to the raw answer.
pub struct TemplateFallback;

fn fenced_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)```").expect("static regex"))
}

fn parse_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

impl ExtractionStrategy for FencedJson {
    fn name(&self) -> &'static str {
        "fenced-json"
    }

    fn extract(&self, text: &str) -> Option<Value> {
        fenced_re()
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| parse_object(m.as_str()))
    }
}

impl ExtractionStrategy for InlineObject {
    fn name(&self) -> &'static str {
        "inline-object"
    }

    fn extract(&self, text: &str) -> Option<Value> {
        text.match_indices('{').find_map(|(start, _)| {
            let mut values =
                serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
            match values.next() {
                Some(Ok(value)) if value.is_object() => Some(value),
                _ => None,
            }
        })
    }
}

impl ExtractionStrategy for TemplateFallback {
    fn name(&self) -> &'static str {
        "template-fallback"
    }

    fn extract(&self, text: &str) -> Option<Value> {
        Some(fallback_template(text))
    }
}

pub fn strategies() -> [&'static dyn ExtractionStrategy; 3] {
    [&FencedJson, &InlineObject, &TemplateFallback]
}

/// First strategy that yields an object wins.
pub fn extract_structured(text: &str) -> Value {
    for strategy in strategies() {
        if let Some(value) = strategy.extract(text) {
            tracing::debug!(strategy = strategy.name(), "structured data extracted");
            return value;
        }
    }
    fallback_template(text)
}

#[cfg(test)]
mod tests {
    use super::{ExtractionStrategy, FencedJson, InlineObject, extract_structured};
    use serde_json::json;

    #[test]
    fn fenced_block_is_preferred() {
        let text = "Voici le résultat {\"ignored\": true}\n```json\n{\"declarant\": \"A\"}\n```\n";
        assert_eq!(extract_structured(text), json!({"declarant": "A"}));
    }

    #[test]
    fn inline_object_is_used_when_no_fence() {
        let text = "Résultat : {\"declarant\": \"B\", \"liabilities\": []} fin.";
        assert_eq!(
            extract_structured(text),
            json!({"declarant": "B", "liabilities": []})
        );
    }

    #[test]
    fn broken_fence_falls_through_to_inline() {
        let text = "```json\n{not json}\n```";
        assert!(FencedJson.extract(text).is_none());
        assert!(InlineObject.extract(text).is_none());
        assert_eq!(extract_structured(text)["full_text"], text);
    }

    #[test]
    fn braces_in_prose_do_not_hide_a_later_object() {
        let text = "Sections {biens, dettes} analysées. {\"declarant\": \"A\"} Merci.";
        assert_eq!(InlineObject.extract(text), Some(json!({"declarant": "A"})));
        assert_eq!(extract_structured(text), json!({"declarant": "A"}));
    }

    #[test]
    fn nested_objects_are_returned_whole() {
        let text = "Résultat {\"declarant\": \"C\", \"positions\": [{\"title\": \"Ministre\"}]}";
        assert_eq!(
            InlineObject.extract(text),
            Some(json!({"declarant": "C", "positions": [{"title": "Ministre"}]}))
        );
    }

    #[test]
    fn plain_text_yields_template_with_raw_text() {
        let text = "Le document ne contient aucune donnée financière lisible.";
        let value = extract_structured(text);
        assert!(value.is_object());
        assert_eq!(value["full_text"], text);
    }

    #[test]
    fn fenced_arrays_are_rejected_but_inner_objects_are_found() {
        assert!(InlineObject.extract("[{\"a\":1}]").is_some_and(|v| v == json!({"a": 1})));
        assert!(FencedJson.extract("```json\n[1,2]\n```").is_none());
    }
}
