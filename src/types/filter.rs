use std::collections::BTreeSet;
use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use super::resource::{Resource, ResourceKey};

pub type FilterId = u64;
pub type SelectorId = u64;
pub type RuleId = u64;

/// The ranks a filter accepts.
///
/// On the wire `All` is an empty list; `Only` is a non-empty list of positive
/// ranks. `"*"`, `"all"` and `null` are also accepted as `All` when reading.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Rank {
    #[default]
    All,
    Only(Vec<u32>),
}

impl Rank {
    /// Build a rank set, normalising an empty list to [`Rank::All`].
    #[must_use]
    pub fn only(ranks: impl IntoIterator<Item = u32>) -> Self {
        let ranks: Vec<u32> = ranks.into_iter().collect();
        if ranks.is_empty() {
            Rank::All
        } else {
            Rank::Only(ranks)
        }
    }

    #[must_use]
    pub fn accepts(&self, rank: u32) -> bool {
        match self {
            Rank::All => true,
            Rank::Only(ranks) => ranks.contains(&rank),
        }
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Rank::All)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::All => write!(f, "*"),
            Rank::Only(ranks) => {
                let joined: Vec<String> = ranks.iter().map(u32::to_string).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

impl Serialize for Rank {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rank::All => serializer.serialize_seq(Some(0))?.end(),
            Rank::Only(ranks) => {
                let mut seq = serializer.serialize_seq(Some(ranks.len()))?;
                for rank in ranks {
                    seq.serialize_element(rank)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Rank {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RankVisitor;

        impl<'de> Visitor<'de> for RankVisitor {
            type Value = Rank;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of positive ranks, \"*\" or \"all\"")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Rank, E> {
                Ok(Rank::All)
            }

            fn visit_none<E: de::Error>(self) -> Result<Rank, E> {
                Ok(Rank::All)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Rank, E> {
                match v {
                    "*" | "all" | "" => Ok(Rank::All),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Rank, A::Error> {
                let mut ranks = Vec::new();
                while let Some(rank) = seq.next_element::<u32>()? {
                    if rank == 0 {
                        return Err(de::Error::invalid_value(
                            de::Unexpected::Unsigned(0),
                            &"a positive rank",
                        ));
                    }
                    ranks.push(rank);
                }
                Ok(Rank::only(ranks))
            }
        }

        deserializer.deserialize_any(RankVisitor)
    }
}

/// Atomic predicate over labeled resources.
///
/// Every populated field must agree with a resource for the filter to match
/// it; absent fields match anything. A filter without an `id` has not been
/// persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FilterId>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub label_key: Option<String>,
    #[serde(default)]
    pub label_value: Option<String>,
    #[serde(default)]
    pub rank: Rank,
    #[serde(default)]
    pub selector_id: Option<SelectorId>,
}

impl Filter {
    /// An unsaved filter matching every resource.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.label_key = Some(key.into());
        self.label_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn ranks(mut self, ranks: impl IntoIterator<Item = u32>) -> Self {
        self.rank = Rank::only(ranks);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: FilterId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    #[must_use]
    pub fn matches(&self, resource: &Resource) -> bool {
        if let Some(ty) = &self.resource_type {
            if ty != resource.resource_type() {
                return false;
            }
        }
        let label_ok = match (&self.label_key, &self.label_value) {
            (Some(key), Some(value)) => resource.label_value(key) == Some(value.as_str()),
            (Some(key), None) => resource.label_value(key).is_some(),
            (None, Some(value)) => resource.has_label_value(value),
            (None, None) => true,
        };
        label_ok && self.rank.accepts(resource.rank())
    }

    /// The keys of every resource in `resources` this filter matches.
    pub fn select(&self, resources: &[Resource]) -> BTreeSet<ResourceKey> {
        resources
            .iter()
            .filter(|r| self.matches(r))
            .map(Resource::key)
            .collect()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let star = "*";
        write!(
            f,
            "{}[{}:{}]{{{}}}",
            self.resource_type.as_deref().unwrap_or(star),
            self.label_key.as_deref().unwrap_or(star),
            self.label_value.as_deref().unwrap_or(star),
            self.rank,
        )
    }
}
