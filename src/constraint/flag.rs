use serde_json::{Map, Value};

use super::{ConstraintEditor, ConstraintError, ConstraintKind};

/// Editor for kinds without parameters. Its value is `{ "<KIND>": true }`.
#[derive(Debug, Clone)]
pub struct FlagEditor {
    kind: ConstraintKind,
    active: bool,
}

impl FlagEditor {
    #[must_use]
    pub fn new(kind: ConstraintKind) -> Self {
        Self {
            kind,
            active: false,
        }
    }
}

impl ConstraintEditor for FlagEditor {
    fn kind(&self) -> ConstraintKind {
        self.kind
    }

    fn initialize(&mut self, _params: &Map<String, Value>) -> Result<(), ConstraintError> {
        self.active = true;
        Ok(())
    }

    fn value(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(self.kind.as_str().to_owned(), Value::Bool(true));
        map
    }

    fn issues(&self) -> Vec<String> {
        Vec::new()
    }

    fn teardown(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
