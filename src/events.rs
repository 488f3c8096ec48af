//! Change notifications for an editing session.

use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::debug;

use crate::constraint::ConstraintKind;
use crate::types::{Rule, Selector, SelectorId};

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A draft filter was buffered at `index`.
    FilterAdded { index: usize },
    SelectorCreated(Selector),
    SelectorAttached(SelectorId),
    SelectorDetached(SelectorId),
    /// The active constraint editor changed; `kind` is `None` after unloading.
    ConstraintChanged {
        kind: Option<ConstraintKind>,
        data: Option<Map<String, Value>>,
    },
    RuleSaved(Rule),
    FormCleared,
}

/// Broadcast channel shared by the components of one session.
///
/// Publishing never blocks and never fails; events sent while nobody is
/// subscribed are dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: SessionEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            debug!(?event, "no subscribers for session event");
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(SessionEvent::FormCleared);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn subscribers_see_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(SessionEvent::SelectorAttached(3));
        bus.publish(SessionEvent::SelectorDetached(3));
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::SelectorAttached(3));
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::SelectorDetached(3));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clones_share_the_channel() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.clone().publish(SessionEvent::FilterAdded { index: 0 });
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::FilterAdded { index: 0 });
    }
}
