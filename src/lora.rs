//! LoRA entries and the `<lora:name:model[:clip]>` tag syntax.
//!
//! A loras widget holds the same information twice: as free text the user can type into,
//! and as an ordered list of structured entries the widget renders. [`merge_loras`]
//! reconciles the list against the text; [`format_lora_tags`] goes the other way.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Strength used when an entry carries none.
pub const DEFAULT_STRENGTH: f64 = 1.0;

static LORA_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<lora:([^:]+):([-\d.]+)(?::([-\d.]+))?>").expect("LoRA tag pattern is valid")
});

/// One row of a loras widget.
///
/// Every field but `name` is optional: an absent field means "not set on the widget"
/// and lets [`merge_loras`] fall back to the value parsed from text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoraEntry {
    pub name: String,
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub strength: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
    #[serde(
        default,
        rename = "clipStrength",
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub clip_strength: Option<f64>,
}

impl LoraEntry {
    pub fn new(name: &str, strength: f64) -> LoraEntry {
        LoraEntry {
            name: name.to_string(),
            strength: Some(strength),
            active: Some(true),
            expanded: None,
            clip_strength: Some(strength),
        }
    }

    /// Only an explicit `active: true` counts.
    pub fn is_active(&self) -> bool {
        self.active == Some(true)
    }
}

/// Widgets sometimes store strengths as formatted strings (`"0.80"`).
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(num)) => Ok(num.as_f64()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&s), &"a strength")),
        Some(other) => Err(de::Error::custom(format!(
            "expected a numeric strength, found {other}"
        ))),
    }
}

/// The editor treats any non-zero number as a set flag.
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(flag)),
        Some(Value::Number(num)) => Ok(Some(num.as_f64().is_some_and(|n| n != 0.0))),
        Some(other) => Err(de::Error::custom(format!(
            "expected a boolean flag, found {other}"
        ))),
    }
}

/// Read widget entries one at a time, skipping any that do not parse.
pub fn lora_entries_from_values(values: &[Value]) -> Vec<LoraEntry> {
    values
        .iter()
        .filter_map(|value| match LoraEntry::deserialize(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("[lora_entries_from_values] skipping malformed entry {value}: {e}");
                None
            }
        })
        .collect()
}

/// Strengths carried by one tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedTag {
    pub strength: f64,
    pub clip_strength: f64,
}

/// Parse every well-formed tag in `text`.
///
/// Names keep the position of their first occurrence; the strengths of the last
/// occurrence win. A tag whose strength is not a number is skipped.
pub fn parse_lora_tags(text: &str) -> IndexMap<String, ParsedTag> {
    let mut parsed = IndexMap::new();
    for caps in LORA_TAG.captures_iter(text) {
        let name = &caps[1];
        let Ok(strength) = caps[2].parse::<f64>() else {
            tracing::debug!("[parse_lora_tags] ignoring tag with malformed strength: {}", &caps[0]);
            continue;
        };
        let clip_strength = match caps.get(3) {
            Some(clip) => match clip.as_str().parse::<f64>() {
                Ok(clip) => clip,
                Err(_) => {
                    tracing::debug!(
                        "[parse_lora_tags] ignoring tag with malformed clip strength: {}",
                        &caps[0]
                    );
                    continue;
                }
            },
            None => strength,
        };
        parsed.insert(
            name.to_string(),
            ParsedTag {
                strength,
                clip_strength,
            },
        );
    }
    parsed
}

/// Reconcile `loras_text` against the widget's current entries.
///
/// Entries whose name appears in the text keep their position and any field they set
/// explicitly; unset fields are filled from the text (`active` defaults to `true`).
/// Entries missing from the text are dropped. Names only present in the text are
/// appended in text order as active entries. Neither input is modified.
pub fn merge_loras(loras_text: &str, loras_arr: &[LoraEntry]) -> Vec<LoraEntry> {
    let parsed = parse_lora_tags(loras_text);
    let mut merged = Vec::with_capacity(parsed.len());
    let mut emitted: HashSet<&str> = HashSet::new();

    for entry in loras_arr {
        let Some(tag) = parsed.get(&entry.name) else {
            continue;
        };
        if !emitted.insert(entry.name.as_str()) {
            continue;
        }
        merged.push(LoraEntry {
            name: entry.name.clone(),
            strength: Some(entry.strength.unwrap_or(tag.strength)),
            active: Some(entry.active.unwrap_or(true)),
            expanded: entry.expanded,
            clip_strength: Some(entry.clip_strength.unwrap_or(tag.clip_strength)),
        });
    }

    for (name, tag) in parsed.iter() {
        if emitted.contains(name.as_str()) {
            continue;
        }
        merged.push(LoraEntry {
            name: name.clone(),
            strength: Some(tag.strength),
            active: Some(true),
            expanded: None,
            clip_strength: Some(tag.clip_strength),
        });
    }

    merged
}

/// Render entries back into tag text, skipping entries explicitly marked inactive.
///
/// The clip strength is written only when it differs from the model strength.
pub fn format_lora_tags(entries: &[LoraEntry]) -> String {
    let mut text = String::new();
    for entry in entries.iter().filter(|entry| entry.active != Some(false)) {
        let strength = entry.strength.unwrap_or(DEFAULT_STRENGTH);
        let clip = entry.clip_strength.unwrap_or(strength);
        if !text.is_empty() {
            text.push(' ');
        }
        let tag = if (clip - strength).abs() > f64::EPSILON {
            format!("<lora:{}:{strength:.2}:{clip:.2}>", entry.name)
        } else {
            format!("<lora:{}:{strength:.2}>", entry.name)
        };
        text.push_str(&tag);
    }
    text
}
