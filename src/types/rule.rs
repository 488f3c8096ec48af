use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ValidationError;
use super::filter::{RuleId, SelectorId};
use crate::constraint::ConstraintKind;

/// A constraint configuration: its kind plus kind-specific parameters.
///
/// On the wire the kind is stored under `"type"` next to the parameters.
/// When reading, a constraint without `"type"` has its kind inferred from the
/// first key naming a known kind, and a JSON-encoded string is accepted in
/// place of an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constraint {
    #[serde(rename = "type")]
    pub kind: ConstraintKind,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Constraint {
    #[must_use]
    pub fn new(kind: ConstraintKind, params: Map<String, Value>) -> Self {
        Self { kind, params }
    }

    /// Interpret a raw JSON value as a constraint.
    ///
    /// # Errors
    ///
    /// Returns a message when the value is not an object, or no kind can be
    /// determined.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let mut map = match value {
            Value::Object(map) => map,
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => return Err("constraint text is not a JSON object".into()),
                Err(e) => return Err(format!("constraint text is not valid JSON: {e}")),
            },
            other => return Err(format!("expected a constraint object, got {other}")),
        };

        let kind = match map.remove("type") {
            Some(Value::String(name)) => name
                .parse::<ConstraintKind>()
                .map_err(|e| e.to_string())?,
            Some(other) => return Err(format!("constraint type must be a string, got {other}")),
            None => map
                .keys()
                .find_map(|key| key.parse::<ConstraintKind>().ok())
                .ok_or_else(|| "constraint has no type".to_string())?,
        };
        Ok(Self { kind, params: map })
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Constraint::from_value(value).map_err(de::Error::custom)
    }
}

/// User-facing description of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
}

impl RuleMetadata {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyRuleName`] for a blank name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyRuleName);
        }
        Ok(())
    }
}

/// A persisted rule: metadata, one constraint and the selectors it applies to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RuleId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    /// Travels separately from the rule body when saving.
    #[serde(default, skip_serializing, deserialize_with = "selector_refs")]
    pub selectors: Vec<SelectorId>,
}

impl Rule {
    #[must_use]
    pub fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            name: self.name.clone(),
            description: self.description.clone(),
            author: self.author.clone(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: RuleMetadata) -> Self {
        self.name = metadata.name;
        self.description = metadata.description;
        self.author = metadata.author;
        self
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "rule {id} ({})", self.name),
            None => write!(f, "unsaved rule ({})", self.name),
        }
    }
}

// Servers answer with either bare ids or full selector objects.
fn selector_refs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SelectorId>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SelectorRef {
        Id(SelectorId),
        Object { id: SelectorId },
    }

    let refs: Option<Vec<SelectorRef>> = Option::deserialize(deserializer)?;
    Ok(refs
        .unwrap_or_default()
        .into_iter()
        .map(|r| match r {
            SelectorRef::Id(id) | SelectorRef::Object { id } => id,
        })
        .collect())
}
