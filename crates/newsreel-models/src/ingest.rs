//! Conversion of loosely-typed script and scene payloads.
//!
//! Language models and older task records hand us scenes as bare strings,
//! lists, or objects with either comma-separated or listed keywords. Every
//! such shape is converted here, once, into [`Scene`]s; nothing downstream
//! inspects the raw representation.
//!
//! [`normalize_scenes`] is a fixed point on its own output, so stored scenes
//! read back unchanged. List numbering is only removed from raw model output
//! in [`parse_scene_lines`].

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::error::{ModelError, ModelResult};
use crate::scene::{Scene, SceneRole};

/// Keywords used when a scene carries neither keywords nor a prompt.
pub const DEFAULT_KEYWORDS: &[&str] = &["technology abstract", "news background"];

/// Shortest line accepted as a visual description.
const MIN_SCENE_LINE_LEN: usize = 10;

static LEADING_NUMBERING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+[.)\-\s]+").unwrap());

/// Remove list numbering such as `"1. "` or `"2) "` from the front of a line.
pub fn strip_numbering(text: &str) -> String {
    LEADING_NUMBERING.replace(text, "").trim().to_string()
}

/// Convert any accepted scene payload into dense, role-tagged scenes.
pub fn normalize_scenes(raw: Value) -> Vec<Scene> {
    let drafts: Vec<SceneDraft> = match raw {
        Value::Object(mut map) if map.contains_key("scenes") => {
            return normalize_scenes(map.remove("scenes").unwrap_or(Value::Null));
        }
        Value::Array(items) => items.iter().filter_map(SceneDraft::from_value).collect(),
        other => SceneDraft::from_value(&other).into_iter().collect(),
    };

    let count = drafts.len();
    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| draft.into_scene(index, count))
        .collect()
}

/// Extract the narration script from a string, object or list payload.
pub fn normalize_script(raw: &Value) -> ModelResult<String> {
    let script = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Object(map) => {
            let inner = ["script", "text", "narration"]
                .iter()
                .find_map(|key| map.get(*key))
                .ok_or(ModelError::EmptyScript)?;
            return normalize_script(inner);
        }
        Value::Array(items) => items
            .iter()
            .filter_map(|item| normalize_script(item).ok())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => String::new(),
        other => {
            return Err(ModelError::UnsupportedShape {
                field: "script",
                found: type_name(other).to_string(),
            })
        }
    };

    if script.is_empty() {
        Err(ModelError::EmptyScript)
    } else {
        Ok(script)
    }
}

/// Split free-form model output into at most `limit` visual descriptions.
///
/// Short lines and conversational preambles ("Here are...") are dropped.
pub fn parse_scene_lines(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.len() > MIN_SCENE_LINE_LEN)
        .filter(|line| !line.to_lowercase().starts_with("here"))
        .map(strip_numbering)
        .filter(|line| !line.is_empty())
        .take(limit)
        .collect()
}

struct SceneDraft {
    keywords: Vec<String>,
    image_prompt: Option<String>,
}

impl SceneDraft {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => {
                let keyword = s.trim().to_string();
                (!keyword.is_empty()).then(|| Self {
                    keywords: vec![keyword],
                    image_prompt: None,
                })
            }
            Value::Object(map) => {
                let keywords = map
                    .get("stock_keywords")
                    .or_else(|| map.get("keywords"))
                    .map(keyword_list)
                    .unwrap_or_default();
                let image_prompt = map
                    .get("image_prompt")
                    .or_else(|| map.get("visual_intent"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|p| !p.is_empty() && *p != "fallback")
                    .map(str::to_string);
                Some(Self {
                    keywords,
                    image_prompt,
                })
            }
            _ => None,
        }
    }

    fn into_scene(self, index: usize, count: usize) -> Scene {
        let keywords = if !self.keywords.is_empty() {
            self.keywords
        } else if let Some(prompt) = &self.image_prompt {
            vec![prompt.clone()]
        } else {
            DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
        };

        Scene {
            index,
            keywords,
            image_prompt: self.image_prompt,
            role: SceneRole::for_position(index, count),
        }
    }
}

fn keyword_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
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
    fn test_bare_string_is_one_keyword() {
        let scenes = normalize_scenes(json!("rocket launch"));
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].keywords, vec!["rocket launch"]);
        assert_eq!(scenes[0].role, SceneRole::Hook);
    }

    #[test]
    fn test_mixed_list() {
        let scenes = normalize_scenes(json!([
            {"scene_number": 4, "stock_keywords": "server room, data center ,"},
            " city traffic ",
            {"scene_number": 9, "image_prompt": "A glowing microchip"},
            {"scene_number": 10},
            42
        ]));

        assert_eq!(scenes.len(), 4);
        let indices: Vec<usize> = scenes.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);

        assert_eq!(scenes[0].keywords, vec!["server room", "data center"]);
        assert_eq!(scenes[1].keywords, vec!["city traffic"]);
        assert_eq!(scenes[2].keywords, vec!["A glowing microchip"]);
        assert_eq!(scenes[2].image_prompt.as_deref(), Some("A glowing microchip"));
        assert_eq!(scenes[3].keywords, vec!["technology abstract", "news background"]);
        assert_eq!(scenes[3].role, SceneRole::CallToAction);
    }

    #[test]
    fn test_stored_text_is_kept_verbatim() {
        let scenes = normalize_scenes(json!([
            "2024 election results",
            {"image_prompt": "1. 2024 election night crowds"}
        ]));
        assert_eq!(scenes[0].keywords, vec!["2024 election results"]);
        assert_eq!(scenes[1].image_prompt.as_deref(), Some("1. 2024 election night crowds"));
    }

    #[test]
    fn test_normalized_scenes_survive_storage() {
        let raw = json!([
            {"scene_number": 3, "stock_keywords": "2024 election, ballot box"},
            "7 wonders of the world",
            {"image_prompt": "1. 2024 election night crowds"},
            {"visual_intent": "fallback"},
            {"keywords": [" trimmed ", ""], "image_prompt": "  padded prompt "}
        ]);

        let once = normalize_scenes(raw);
        let twice = normalize_scenes(serde_json::to_value(&once).unwrap());
        assert_eq!(twice, once);
        let thrice = normalize_scenes(serde_json::to_value(&twice).unwrap());
        assert_eq!(thrice, once);
    }

    #[test]
    fn test_wrapped_scenes_object() {
        let scenes = normalize_scenes(json!({"scenes": [{"keywords": ["a", "b"]}]}));
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].keywords, vec!["a", "b"]);
    }

    #[test]
    fn test_null_yields_nothing() {
        assert!(normalize_scenes(Value::Null).is_empty());
        assert!(normalize_scenes(json!("   ")).is_empty());
    }

    #[test]
    fn test_normalize_script_shapes() {
        assert_eq!(normalize_script(&json!(" Big news. ")).unwrap(), "Big news.");
        assert_eq!(normalize_script(&json!({"script": "Hello"})).unwrap(), "Hello");
        assert_eq!(normalize_script(&json!(["One.", "Two."])).unwrap(), "One. Two.");
        assert!(matches!(normalize_script(&json!({"script": ""})), Err(ModelError::EmptyScript)));
        assert!(matches!(
            normalize_script(&json!(3)),
            Err(ModelError::UnsupportedShape { .. })
        ));
    }

    #[test]
    fn test_parse_scene_lines() {
        let text = "Here are your scenes:\n1. A close up of a microphone\nshort\n\n2) A football stadium at night\n";
        let lines = parse_scene_lines(text, 8);
        assert_eq!(
            lines,
            vec!["A close up of a microphone", "A football stadium at night"]
        );
        assert_eq!(parse_scene_lines(text, 1).len(), 1);
    }
}
