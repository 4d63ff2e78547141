//! Model-name extraction from package description blobs.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// A bullet line: `-` or `*`, then an identifier, optionally in backticks.
static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*[-*][ \t]*`?([A-Za-z0-9][A-Za-z0-9_./-]*)`?").expect("static regex")
});

/// Preferred languages for localized text maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePrefs {
    /// Tried first.
    pub primary: String,
    /// Tried when the primary language is absent or empty.
    pub fallback: String,
}

impl Default for LanguagePrefs {
    fn default() -> Self {
        Self {
            primary: "zh-cn".to_string(),
            fallback: "en-us".to_string(),
        }
    }
}

impl LanguagePrefs {
    /// Prefs with explicit languages.
    pub fn new(primary: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
        }
    }
}

/// Model identifiers listed in a description blob, in first-appearance order
/// without duplicates.
///
/// The blob is normally a JSON object keyed by language tag. Text that is not
/// JSON is used as-is.
pub fn extract_model_names(blob: &str, prefs: &LanguagePrefs) -> Vec<String> {
    let Some(text) = select_text(blob, prefs) else {
        return Vec::new();
    };

    let mut names: Vec<String> = Vec::new();
    for caps in BULLET_RE.captures_iter(&text) {
        let Some(name) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn select_text(blob: &str, prefs: &LanguagePrefs) -> Option<String> {
    if blob.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(blob) {
        Ok(Value::Object(map)) => {
            let pick = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            };
            pick(&prefs.primary)
                .or_else(|| pick(&prefs.fallback))
                .or_else(|| {
                    map.values()
                        .filter_map(Value::as_str)
                        .find(|s| !s.is_empty())
                })
                .map(str::to_string)
        }
        Ok(Value::String(text)) => Some(text),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Description is not JSON, using raw text");
            Some(blob.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(blob: &str) -> Vec<String> {
        extract_model_names(blob, &LanguagePrefs::default())
    }

    #[test]
    fn bullets_with_and_without_backticks() {
        let blob = r#"{"zh-cn":"支持模型:\n- deepseek-ai/DeepSeek-V3\n* `Qwen/Qwen2.5-72B-Instruct`\n  - THUDM/glm-4-9b-chat"}"#;
        assert_eq!(
            names(blob),
            vec![
                "deepseek-ai/DeepSeek-V3",
                "Qwen/Qwen2.5-72B-Instruct",
                "THUDM/glm-4-9b-chat"
            ]
        );
    }

    #[test]
    fn primary_then_fallback_then_first_value() {
        let both = r#"{"en-us":"- english-model","zh-cn":"- chinese-model"}"#;
        assert_eq!(names(both), vec!["chinese-model"]);

        let english_only = r#"{"zh-cn":"","en-us":"- english-model"}"#;
        assert_eq!(names(english_only), vec!["english-model"]);

        let other = r#"{"ja-jp":"- other-model"}"#;
        assert_eq!(names(other), vec!["other-model"]);
    }

    #[test]
    fn custom_language_preference() {
        let blob = r#"{"en-us":"- english-model","zh-cn":"- chinese-model"}"#;
        let prefs = LanguagePrefs::new("en-us", "zh-cn");
        assert_eq!(extract_model_names(blob, &prefs), vec!["english-model"]);
    }

    #[test]
    fn non_json_blob_is_treated_as_text() {
        assert_eq!(names("- plain-model\n- other"), vec!["plain-model", "other"]);
    }

    #[test]
    fn duplicates_suppressed_order_kept() {
        let blob = r#"{"zh-cn":"- b\n- a\n- b\n- c\n- a"}"#;
        assert_eq!(names(blob), vec!["b", "a", "c"]);
    }

    #[test]
    fn prose_and_rules_yield_nothing() {
        assert!(names("---\nno bullets here, just a-hyphenated sentence").is_empty());
        assert!(names("").is_empty());
        assert!(names("[1, 2]").is_empty());
    }
}
