use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::params::{
    CompactnessRange, GapDirection, GapSpec, ItemId, WorkloadRange, WorkloadScope,
};
use super::{ConstraintEditor, ConstraintError, ConstraintKind};

/// Read an optional field; absent and `null` both mean unset.
fn field<T: DeserializeOwned>(
    kind: ConstraintKind,
    params: &Map<String, Value>,
    key: &str,
) -> Result<Option<T>, ConstraintError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| ConstraintError::invalid(kind, format!("{key}: {e}"))),
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_owned(), value);
    map
}

/// Editor for kinds whose parameter is one list of rooms, teachers or slots.
#[derive(Debug, Clone)]
pub struct ListEditor {
    kind: ConstraintKind,
    key: &'static str,
    min_len: usize,
    items: Vec<ItemId>,
    active: bool,
}

impl ListEditor {
    #[must_use]
    pub fn new(kind: ConstraintKind, key: &'static str, min_len: usize) -> Self {
        Self {
            kind,
            key,
            min_len,
            items: Vec::new(),
            active: false,
        }
    }

    /// The list editor a kind uses, if it is a list kind.
    #[must_use]
    pub fn for_kind(kind: ConstraintKind) -> Option<Self> {
        let (key, min_len) = match kind {
            ConstraintKind::AdjacentRooms => ("roomChain", 2),
            ConstraintKind::AllowedGrids | ConstraintKind::ForbiddenSlots => ("slots", 1),
            ConstraintKind::AllowedRooms
            | ConstraintKind::ForbiddenRooms
            | ConstraintKind::RequiredRooms => ("rooms", 1),
            ConstraintKind::AllowedTeachers
            | ConstraintKind::ForbiddenTeachers
            | ConstraintKind::RequiredTeachers => ("teachers", 1),
            _ => return None,
        };
        Some(Self::new(kind, key, min_len))
    }

    #[must_use]
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }
}

impl ConstraintEditor for ListEditor {
    fn kind(&self) -> ConstraintKind {
        self.kind
    }

    fn initialize(&mut self, params: &Map<String, Value>) -> Result<(), ConstraintError> {
        self.items = field(self.kind, params, self.key)?.unwrap_or_default();
        self.active = true;
        Ok(())
    }

    fn value(&self) -> Map<String, Value> {
        single(self.key, to_value(&self.items))
    }

    fn issues(&self) -> Vec<String> {
        match self.items.len() {
            n if n >= self.min_len => Vec::new(),
            _ if self.min_len <= 1 => vec![format!("{} must not be empty", self.key)],
            _ => vec![format!(
                "{} needs at least {} entries",
                self.key, self.min_len
            )],
        }
    }

    fn teardown(&mut self) {
        self.items.clear();
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// `SEQUENCED`: ordered chains of sessions.
#[derive(Debug, Clone, Default)]
pub struct SequencedEditor {
    sequences: Vec<Vec<ItemId>>,
    active: bool,
}

impl SequencedEditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConstraintEditor for SequencedEditor {
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Sequenced
    }

    fn initialize(&mut self, params: &Map<String, Value>) -> Result<(), ConstraintError> {
        self.sequences = field(self.kind(), params, "sequences")?.unwrap_or_default();
        self.active = true;
        Ok(())
    }

    fn value(&self) -> Map<String, Value> {
        single("sequences", to_value(&self.sequences))
    }

    fn issues(&self) -> Vec<String> {
        if self.sequences.is_empty() {
            return vec!["sequences must not be empty".into()];
        }
        self.sequences
            .iter()
            .enumerate()
            .filter(|(_, seq)| seq.len() < 2)
            .map(|(i, _)| format!("sequence {i} needs at least 2 entries"))
            .collect()
    }

    fn teardown(&mut self) {
        self.sequences.clear();
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// `MINMAXGAP`: a minimum and a maximum distance between sessions.
#[derive(Debug, Clone, Default)]
pub struct MinMaxGapEditor {
    min_gap: Option<GapSpec>,
    max_gap: Option<GapSpec>,
    active: bool,
}

impl MinMaxGapEditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConstraintEditor for MinMaxGapEditor {
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::MinMaxGap
    }

    fn initialize(&mut self, params: &Map<String, Value>) -> Result<(), ConstraintError> {
        let min_gap = field(self.kind(), params, "minGap")?;
        let max_gap = field(self.kind(), params, "maxGap")?;
        self.min_gap = min_gap;
        self.max_gap = max_gap;
        self.active = true;
        Ok(())
    }

    fn value(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("minGap".into(), to_value(&self.min_gap));
        map.insert("maxGap".into(), to_value(&self.max_gap));
        map
    }

    fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for (key, spec, direction) in [
            ("minGap", &self.min_gap, GapDirection::Min),
            ("maxGap", &self.max_gap, GapDirection::Max),
        ] {
            match spec {
                None => issues.push(format!("{key} is required")),
                Some(spec) => issues.extend(spec.issues(key, direction)),
            }
        }
        issues
    }

    fn teardown(&mut self) {
        self.min_gap = None;
        self.max_gap = None;
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// `COMPACTNESS`: spread `sigma` bounded by `max_sigma`; day and month default to 1.
#[derive(Debug, Clone)]
pub struct CompactnessEditor {
    max_sigma: u32,
    range: Option<CompactnessRange>,
    active: bool,
}

impl CompactnessEditor {
    pub const DEFAULT_MAX_SIGMA: u32 = 8;

    #[must_use]
    pub fn new(max_sigma: u32) -> Self {
        Self {
            max_sigma,
            range: None,
            active: false,
        }
    }
}

impl Default for CompactnessEditor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_SIGMA)
    }
}

impl ConstraintEditor for CompactnessEditor {
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Compactness
    }

    fn initialize(&mut self, params: &Map<String, Value>) -> Result<(), ConstraintError> {
        let mut range: Option<CompactnessRange> = field(self.kind(), params, "compactnessRange")?;
        if let Some(range) = &mut range {
            range.day.get_or_insert(1);
            range.month.get_or_insert(1);
        }
        self.range = range;
        self.active = true;
        Ok(())
    }

    fn value(&self) -> Map<String, Value> {
        single("compactnessRange", to_value(&self.range))
    }

    fn issues(&self) -> Vec<String> {
        let Some(range) = self.range else {
            return vec!["compactnessRange is required".into()];
        };
        let mut issues = Vec::new();
        match range.sigma {
            None => issues.push("sigma is required".to_string()),
            Some(sigma) if !(0.0..=f64::from(self.max_sigma)).contains(&sigma) => {
                issues.push(format!("sigma must be between 0 and {}", self.max_sigma));
            }
            Some(_) => {}
        }
        if range.day.is_some_and(|d| !(1..=31).contains(&d)) {
            issues.push("day must be between 1 and 31".into());
        }
        if range.month.is_some_and(|m| !(1..=12).contains(&m)) {
            issues.push("month must be between 1 and 12".into());
        }
        issues
    }

    fn teardown(&mut self) {
        self.range = None;
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// `SAME_DAY`: exactly one ISO date.
#[derive(Debug, Clone, Default)]
pub struct SameDayEditor {
    dates: Vec<NaiveDate>,
    active: bool,
}

impl SameDayEditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_date(text: &str) -> Result<NaiveDate, ConstraintError> {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| {
            ConstraintError::invalid(ConstraintKind::SameDay, format!("date {text:?}: {e}"))
        })
    }
}

impl ConstraintEditor for SameDayEditor {
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::SameDay
    }

    // Accepts a single date string or a list of them.
    fn initialize(&mut self, params: &Map<String, Value>) -> Result<(), ConstraintError> {
        let dates = match params.get("date") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(text)) => vec![Self::parse_date(text)?],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(text) => Self::parse_date(text),
                    other => Err(ConstraintError::invalid(
                        self.kind(),
                        format!("date: expected a string, got {other}"),
                    )),
                })
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(ConstraintError::invalid(
                    self.kind(),
                    format!("date: expected a string, got {other}"),
                ))
            }
        };
        self.dates = dates;
        self.active = true;
        Ok(())
    }

    fn value(&self) -> Map<String, Value> {
        let date = self
            .dates
            .first()
            .map_or(Value::Null, |d| Value::String(d.format("%Y-%m-%d").to_string()));
        single("date", date)
    }

    fn issues(&self) -> Vec<String> {
        if self.dates.len() == 1 {
            Vec::new()
        } else {
            vec![format!(
                "date must name exactly one day (got {})",
                self.dates.len()
            )]
        }
    }

    fn teardown(&mut self) {
        self.dates.clear();
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// `SAME_WEEK`: one week number.
#[derive(Debug, Clone, Default)]
pub struct SameWeekEditor {
    week: Option<u32>,
    active: bool,
}

impl SameWeekEditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConstraintEditor for SameWeekEditor {
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::SameWeek
    }

    fn initialize(&mut self, params: &Map<String, Value>) -> Result<(), ConstraintError> {
        let week = match params.get("week") {
            Some(Value::Array(items)) if items.len() <= 1 => items
                .first()
                .map(|w| serde_json::from_value::<u32>(w.clone()))
                .transpose()
                .map_err(|e| ConstraintError::invalid(self.kind(), format!("week: {e}")))?,
            _ => field(self.kind(), params, "week")?,
        };
        self.week = week;
        self.active = true;
        Ok(())
    }

    fn value(&self) -> Map<String, Value> {
        single("week", to_value(&self.week))
    }

    fn issues(&self) -> Vec<String> {
        match self.week {
            None => vec!["week is required".into()],
            Some(0) => vec!["week must be at least 1".into()],
            Some(_) => Vec::new(),
        }
    }

    fn teardown(&mut self) {
        self.week = None;
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// `SESSION_WORKLOAD`: how many sessions may fall in one day, week or month.
#[derive(Debug, Clone, Default)]
pub struct WorkloadEditor {
    scope: Option<WorkloadScope>,
    workload: WorkloadRange,
    active: bool,
}

impl WorkloadEditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConstraintEditor for WorkloadEditor {
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::SessionWorkload
    }

    fn initialize(&mut self, params: &Map<String, Value>) -> Result<(), ConstraintError> {
        let scope = field(self.kind(), params, "scope")?;
        let workload = field(self.kind(), params, "workload")?.unwrap_or_default();
        self.scope = scope;
        self.workload = workload;
        self.active = true;
        Ok(())
    }

    fn value(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("scope".into(), to_value(&self.scope));
        map.insert("workload".into(), to_value(&self.workload));
        map
    }

    fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.scope.is_none() {
            issues.push("scope is required".to_string());
        }
        match (self.workload.min, self.workload.max) {
            (None, _) => issues.push("workload.min is required".into()),
            (Some(0), _) => issues.push("workload.min must be at least 1".into()),
            _ => {}
        }
        match (self.workload.min, self.workload.max) {
            (_, None) => issues.push("workload.max is required".into()),
            (Some(min), Some(max)) if min > max => {
                issues.push("workload.min must not exceed workload.max".into());
            }
            _ => {}
        }
        issues
    }

    fn teardown(&mut self) {
        self.scope = None;
        self.workload = WorkloadRange::default();
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn loaded<E: ConstraintEditor>(mut editor: E, value: Value) -> E {
        editor.initialize(&params(value)).unwrap();
        editor
    }

    #[test]
    fn adjacent_rooms_needs_two() {
        let editor = ListEditor::for_kind(ConstraintKind::AdjacentRooms).unwrap();
        let editor = loaded(editor, json!({"roomChain": [4]}));
        assert_eq!(editor.issues(), vec!["roomChain needs at least 2 entries"]);

        let editor = loaded(editor, json!({"roomChain": [4, 5]}));
        assert!(editor.validate());
        assert_eq!(Value::Object(editor.value()), json!({"roomChain": [4, 5]}));
    }

    #[test]
    fn list_kinds_use_their_keys() {
        for (kind, key) in [
            (ConstraintKind::AllowedGrids, "slots"),
            (ConstraintKind::ForbiddenSlots, "slots"),
            (ConstraintKind::RequiredRooms, "rooms"),
            (ConstraintKind::ForbiddenTeachers, "teachers"),
        ] {
            let editor = loaded(ListEditor::for_kind(kind).unwrap(), json!({}));
            assert_eq!(editor.issues(), vec![format!("{key} must not be empty")]);
        }
        assert!(ListEditor::for_kind(ConstraintKind::NoOverlap).is_none());
    }

    #[test]
    fn wrong_shape_is_rejected_and_keeps_draft() {
        let mut editor = loaded(
            ListEditor::for_kind(ConstraintKind::AllowedRooms).unwrap(),
            json!({"rooms": [1]}),
        );
        let err = editor.initialize(&params(json!({"rooms": "all"}))).unwrap_err();
        assert!(matches!(err, ConstraintError::InvalidParams { kind: ConstraintKind::AllowedRooms, .. }));
        assert_eq!(editor.items(), &[ItemId::Num(1)]);
    }

    #[test]
    fn set_merges_into_draft() {
        let mut editor = loaded(WorkloadEditor::new(), json!({"scope": "week"}));
        editor
            .set(&params(json!({"workload": {"min": 1, "max": 3}})))
            .unwrap();
        assert!(editor.validate(), "{:?}", editor.issues());
    }

    #[test]
    fn sequenced() {
        let editor = loaded(SequencedEditor::new(), json!({"sequences": [[1, 2], [3]]}));
        assert_eq!(editor.issues(), vec!["sequence 1 needs at least 2 entries"]);
        let editor = loaded(SequencedEditor::new(), json!({}));
        assert_eq!(editor.issues(), vec!["sequences must not be empty"]);
    }

    #[test]
    fn minmaxgap_requires_both_sides() {
        let editor = loaded(
            MinMaxGapEditor::new(),
            json!({"minGap": {"type": "min", "values": {"day": 1}}}),
        );
        assert_eq!(editor.issues(), vec!["maxGap is required"]);

        let editor = loaded(
            MinMaxGapEditor::new(),
            json!({
                "minGap": {"type": "min", "values": {"day": 1}},
                "maxGap": {"type": "max", "values": {"week": 2, "slot": 0}}
            }),
        );
        assert_eq!(editor.issues(), vec!["maxGap.slot must be at least 1"]);
    }

    #[test]
    fn compactness_bounds() {
        let editor = loaded(
            CompactnessEditor::default(),
            json!({"compactnessRange": {"sigma": 3, "day": 15, "month": 6}}),
        );
        assert!(editor.validate());

        let editor = loaded(
            CompactnessEditor::new(4),
            json!({"compactnessRange": {"sigma": 5, "day": 0, "month": 13}}),
        );
        assert_eq!(
            editor.issues(),
            vec![
                "sigma must be between 0 and 4",
                "day must be between 1 and 31",
                "month must be between 1 and 12",
            ]
        );

        let editor = loaded(CompactnessEditor::default(), json!({"compactnessRange": {}}));
        assert_eq!(editor.issues(), vec!["sigma is required"]);
        let editor = loaded(CompactnessEditor::default(), json!({}));
        assert_eq!(editor.issues(), vec!["compactnessRange is required"]);
    }

    #[test]
    fn compactness_day_and_month_default_to_one() {
        let editor = loaded(
            CompactnessEditor::default(),
            json!({"compactnessRange": {"sigma": 3}}),
        );
        assert!(editor.validate());
        assert_eq!(
            Value::Object(editor.value()),
            json!({"compactnessRange": {"sigma": 3.0, "day": 1, "month": 1}})
        );

        let editor = loaded(
            CompactnessEditor::default(),
            json!({"compactnessRange": {"sigma": 3, "day": 32}}),
        );
        assert_eq!(editor.issues(), vec!["day must be between 1 and 31"]);
    }

    #[test]
    fn same_day_takes_exactly_one_date() {
        let editor = loaded(SameDayEditor::new(), json!({"date": "2025-03-14"}));
        assert!(editor.validate());
        assert_eq!(Value::Object(editor.value()), json!({"date": "2025-03-14"}));

        let editor = loaded(SameDayEditor::new(), json!({"date": ["2025-03-14", "2025-03-15"]}));
        assert_eq!(editor.issues(), vec!["date must name exactly one day (got 2)"]);

        let mut editor = SameDayEditor::new();
        assert!(editor.initialize(&params(json!({"date": "14/03/2025"}))).is_err());
    }

    #[test]
    fn same_week() {
        let editor = loaded(SameWeekEditor::new(), json!({"week": [12]}));
        assert!(editor.validate());
        assert_eq!(Value::Object(editor.value()), json!({"week": 12}));
        let editor = loaded(SameWeekEditor::new(), json!({"week": 0}));
        assert_eq!(editor.issues(), vec!["week must be at least 1"]);
    }

    #[test]
    fn workload_range() {
        let editor = loaded(
            WorkloadEditor::new(),
            json!({"scope": "day", "workload": {"min": 4, "max": 2}}),
        );
        assert_eq!(editor.issues(), vec!["workload.min must not exceed workload.max"]);

        let editor = loaded(WorkloadEditor::new(), json!({"workload": {"min": 0}}));
        assert_eq!(
            editor.issues(),
            vec![
                "scope is required",
                "workload.min must be at least 1",
                "workload.max is required",
            ]
        );
    }

    #[test]
    fn teardown_clears_draft() {
        let mut editor = loaded(SameWeekEditor::new(), json!({"week": 3}));
        editor.teardown();
        assert!(!editor.is_active());
        assert_eq!(editor.issues(), vec!["week is required"]);
    }
}
