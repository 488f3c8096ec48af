use std::collections::HashMap;
use std::fmt;

/// Identity of a schedulable resource: its type plus its rank within that type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub resource_type: String,
    pub rank: u32,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.resource_type, self.rank)
    }
}

/// An opaque schedulable item with a bag of labels.
///
/// Resources are never persisted by this crate. They only exist so that a
/// selector can be previewed against a known universe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    resource_type: String,
    rank: u32,
    labels: HashMap<String, String>,
}

impl Resource {
    #[must_use]
    pub fn new(resource_type: impl Into<String>, rank: u32) -> Self {
        Self {
            resource_type: resource_type.into(),
            rank,
            labels: HashMap::new(),
        }
    }

    /// Attach a label, replacing any previous value for the same key.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    #[must_use]
    pub fn rank(&self) -> u32 {
        self.rank
    }

    #[must_use]
    pub fn label_value(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn has_label_value(&self, value: &str) -> bool {
        self.labels.values().any(|v| v == value)
    }

    #[must_use]
    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            resource_type: self.resource_type.clone(),
            rank: self.rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_replaced() {
        let r = Resource::new("room", 1)
            .label("building", "A")
            .label("building", "B");
        assert_eq!(r.label_value("building"), Some("B"));
        assert!(r.has_label_value("B"));
        assert!(!r.has_label_value("A"));
    }

    #[test]
    fn key_display() {
        let r = Resource::new("session", 4);
        assert_eq!(r.key().to_string(), "session#4");
    }

    #[test]
    fn keys_order_by_type_then_rank() {
        let a = Resource::new("room", 2).key();
        let b = Resource::new("room", 10).key();
        let c = Resource::new("session", 1).key();
        assert!(a < b);
        assert!(b < c);
    }
}
