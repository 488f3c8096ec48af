//! Closed catalog of constraint kinds and their parameter editors.

mod editor;
mod editors;
mod flag;
mod params;
mod registry;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use editor::{ConstraintEditor, ConstraintError};
pub use editors::{
    CompactnessEditor, ListEditor, MinMaxGapEditor, SameDayEditor, SameWeekEditor,
    SequencedEditor, WorkloadEditor,
};
pub use flag::FlagEditor;
pub use params::{
    CompactnessRange, GapDirection, GapSpec, GapUnits, ItemId, WorkloadRange, WorkloadScope,
};
pub use registry::{ConstraintRegistry, EditorFactory};

/// Every constraint kind a rule can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    AdjacentRooms,
    AllowedGrids,
    AllowedRooms,
    AllowedTeachers,
    Compactness,
    DifferentDay,
    DifferentDailySlot,
    DifferentRooms,
    DifferentSlot,
    DifferentTeachers,
    DifferentWeek,
    DifferentWeekday,
    DifferentWeeklySlot,
    ForbiddenRooms,
    ForbiddenSlots,
    ForbiddenTeachers,
    #[serde(rename = "MINMAXGAP")]
    MinMaxGap,
    NoOverlap,
    Periodic,
    RequiredRooms,
    RequiredTeachers,
    SameDay,
    SameWeek,
    Sequenced,
    SessionWorkload,
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 25] = [
        ConstraintKind::AdjacentRooms,
        ConstraintKind::AllowedGrids,
        ConstraintKind::AllowedRooms,
        ConstraintKind::AllowedTeachers,
        ConstraintKind::Compactness,
        ConstraintKind::DifferentDay,
        ConstraintKind::DifferentDailySlot,
        ConstraintKind::DifferentRooms,
        ConstraintKind::DifferentSlot,
        ConstraintKind::DifferentTeachers,
        ConstraintKind::DifferentWeek,
        ConstraintKind::DifferentWeekday,
        ConstraintKind::DifferentWeeklySlot,
        ConstraintKind::ForbiddenRooms,
        ConstraintKind::ForbiddenSlots,
        ConstraintKind::ForbiddenTeachers,
        ConstraintKind::MinMaxGap,
        ConstraintKind::NoOverlap,
        ConstraintKind::Periodic,
        ConstraintKind::RequiredRooms,
        ConstraintKind::RequiredTeachers,
        ConstraintKind::SameDay,
        ConstraintKind::SameWeek,
        ConstraintKind::Sequenced,
        ConstraintKind::SessionWorkload,
    ];

    /// Wire name, e.g. `ADJACENT_ROOMS`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintKind::AdjacentRooms => "ADJACENT_ROOMS",
            ConstraintKind::AllowedGrids => "ALLOWED_GRIDS",
            ConstraintKind::AllowedRooms => "ALLOWED_ROOMS",
            ConstraintKind::AllowedTeachers => "ALLOWED_TEACHERS",
            ConstraintKind::Compactness => "COMPACTNESS",
            ConstraintKind::DifferentDay => "DIFFERENT_DAY",
            ConstraintKind::DifferentDailySlot => "DIFFERENT_DAILY_SLOT",
            ConstraintKind::DifferentRooms => "DIFFERENT_ROOMS",
            ConstraintKind::DifferentSlot => "DIFFERENT_SLOT",
            ConstraintKind::DifferentTeachers => "DIFFERENT_TEACHERS",
            ConstraintKind::DifferentWeek => "DIFFERENT_WEEK",
            ConstraintKind::DifferentWeekday => "DIFFERENT_WEEKDAY",
            ConstraintKind::DifferentWeeklySlot => "DIFFERENT_WEEKLY_SLOT",
            ConstraintKind::ForbiddenRooms => "FORBIDDEN_ROOMS",
            ConstraintKind::ForbiddenSlots => "FORBIDDEN_SLOTS",
            ConstraintKind::ForbiddenTeachers => "FORBIDDEN_TEACHERS",
            ConstraintKind::MinMaxGap => "MINMAXGAP",
            ConstraintKind::NoOverlap => "NO_OVERLAP",
            ConstraintKind::Periodic => "PERIODIC",
            ConstraintKind::RequiredRooms => "REQUIRED_ROOMS",
            ConstraintKind::RequiredTeachers => "REQUIRED_TEACHERS",
            ConstraintKind::SameDay => "SAME_DAY",
            ConstraintKind::SameWeek => "SAME_WEEK",
            ConstraintKind::Sequenced => "SEQUENCED",
            ConstraintKind::SessionWorkload => "SESSION_WORKLOAD",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            ConstraintKind::AdjacentRooms => "Adjacent Rooms",
            ConstraintKind::AllowedGrids => "Allowed Slots",
            ConstraintKind::AllowedRooms => "Allowed Rooms",
            ConstraintKind::AllowedTeachers => "Allowed Teachers",
            ConstraintKind::Compactness => "Compactness",
            ConstraintKind::DifferentDay => "Different Days",
            ConstraintKind::DifferentDailySlot => "Different Daily Slots",
            ConstraintKind::DifferentRooms => "Different Rooms",
            ConstraintKind::DifferentSlot => "Different Slots",
            ConstraintKind::DifferentTeachers => "Different Teachers",
            ConstraintKind::DifferentWeek => "Different Weeks",
            ConstraintKind::DifferentWeekday => "Different Weekdays",
            ConstraintKind::DifferentWeeklySlot => "Different Weekly Slots",
            ConstraintKind::ForbiddenRooms => "Forbidden Rooms",
            ConstraintKind::ForbiddenSlots => "Forbidden Slots",
            ConstraintKind::ForbiddenTeachers => "Forbidden Teachers",
            ConstraintKind::MinMaxGap => "Min/Max Gap",
            ConstraintKind::NoOverlap => "No Overlap",
            ConstraintKind::Periodic => "Periodic",
            ConstraintKind::RequiredRooms => "Required Rooms",
            ConstraintKind::RequiredTeachers => "Required Teachers",
            ConstraintKind::SameDay => "Same Day",
            ConstraintKind::SameWeek => "Same Week",
            ConstraintKind::Sequenced => "Sequenced",
            ConstraintKind::SessionWorkload => "Session Workload",
        }
    }

    /// Kinds whose only parameter is `{ "<KIND>": true }`.
    #[must_use]
    pub fn is_flag(self) -> bool {
        matches!(
            self,
            ConstraintKind::DifferentDay
                | ConstraintKind::DifferentDailySlot
                | ConstraintKind::DifferentRooms
                | ConstraintKind::DifferentSlot
                | ConstraintKind::DifferentTeachers
                | ConstraintKind::DifferentWeek
                | ConstraintKind::DifferentWeekday
                | ConstraintKind::DifferentWeeklySlot
                | ConstraintKind::NoOverlap
                | ConstraintKind::Periodic
        )
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConstraintKind {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConstraintKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConstraintError::UnknownKind(s.to_owned()))
    }
}
