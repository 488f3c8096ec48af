use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a room, teacher or grid slot: numeric or textual.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Num(u64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Num(n) => write!(f, "{n}"),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        ItemId::Num(n)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Text(s.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapDirection {
    Min,
    Max,
}

impl GapDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GapDirection::Min => "min",
            GapDirection::Max => "max",
        }
    }
}

/// Gap length per time unit; unset units are omitted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GapUnits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
}

impl GapUnits {
    /// Populated units as `(name, value)` pairs.
    pub fn populated(&self) -> impl Iterator<Item = (&'static str, u32)> {
        [
            ("slot", self.slot),
            ("day", self.day),
            ("week", self.week),
            ("month", self.month),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }
}

/// One side of a min/max gap constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GapSpec {
    #[serde(rename = "type", default)]
    pub direction: Option<GapDirection>,
    #[serde(default)]
    pub values: GapUnits,
}

impl GapSpec {
    pub(crate) fn issues(&self, field: &str, expected: GapDirection) -> Vec<String> {
        let mut issues = Vec::new();
        match self.direction {
            None => issues.push(format!("{field} needs a type")),
            Some(d) if d != expected => {
                issues.push(format!("{field} type must be {}", expected.as_str()));
            }
            Some(_) => {}
        }
        if self.values.populated().next().is_none() {
            issues.push(format!("{field} needs at least one of slot, day, week or month"));
        }
        for (unit, value) in self.values.populated() {
            if value < 1 {
                issues.push(format!("{field}.{unit} must be at least 1"));
            }
        }
        issues
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CompactnessRange {
    #[serde(default)]
    pub sigma: Option<f64>,
    #[serde(default)]
    pub day: Option<u32>,
    #[serde(default)]
    pub month: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadScope {
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkloadRange {
    #[serde(default)]
    pub min: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
}
