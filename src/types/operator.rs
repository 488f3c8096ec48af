use std::collections::BTreeSet;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Set operators available inside a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOp {
    Union,
    Intersection,
    Difference,
}

impl SetOp {
    pub const ALL: [SetOp; 3] = [SetOp::Union, SetOp::Intersection, SetOp::Difference];

    /// Wire code used in a selector's `operation` field.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            SetOp::Union => "|",
            SetOp::Intersection => "&",
            SetOp::Difference => "-",
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SetOp::Union => "union",
            SetOp::Intersection => "intersection",
            SetOp::Difference => "difference",
        }
    }

    /// Accepts either the wire code or the long name.
    #[must_use]
    pub fn parse(s: &str) -> Option<SetOp> {
        SetOp::ALL
            .into_iter()
            .find(|op| op.code() == s || op.name() == s)
    }

    #[must_use]
    pub fn apply<T: Ord + Clone>(self, lhs: &BTreeSet<T>, rhs: &BTreeSet<T>) -> BTreeSet<T> {
        match self {
            SetOp::Union => lhs.union(rhs).cloned().collect(),
            SetOp::Intersection => lhs.intersection(rhs).cloned().collect(),
            SetOp::Difference => lhs.difference(rhs).cloned().collect(),
        }
    }
}

impl fmt::Display for SetOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for SetOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for SetOp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SetOp::parse(&s).ok_or_else(|| {
            de::Error::invalid_value(de::Unexpected::Str(&s), &"one of \"|\", \"&\", \"-\"")
        })
    }
}
