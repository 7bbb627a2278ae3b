//! In-process publish/subscribe bus.
//!
//! Listeners run synchronously on the publishing task, in the order they
//! subscribed. The listener list for a topic is captured when a publish
//! starts, so a listener added during dispatch only sees later publishes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use sle_proto::messages::{
    DataFlow, DeliveryModeChange, LinkStateChange, ProfileChange, ProviderStateChange,
    ThrowEventFailure, ThrowEventSuccess,
};
use sle_proto::{Link, LogEntry, ProviderType};
use tracing::trace;

/// A subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Confirmed provider state change.
    ProviderStateChange(ProviderType),
    /// Forward throw accepted.
    ThrowSucceeded,
    /// Forward throw rejected.
    ThrowFailed,
    /// Provider data transfer.
    ProviderDataFlow(ProviderType),
    /// Provider delivery mode change.
    DeliveryModeChange(ProviderType),
    /// Confirmed link state change.
    LinkStateChange(Link),
    /// Link data transfer.
    LinkDataFlow(Link),
    /// Profile created on the server.
    ProfileCreated,
    /// Profile updated on the server.
    ProfileUpdated,
    /// Profile deleted on the server.
    ProfileDeleted,
    /// Proxy log message.
    LogMessage,
    /// A provider bound a profile.
    ProviderBound(ProviderType),
    /// A provider released its profile.
    ProviderUnbound(ProviderType),
    /// The profile selection for a provider changed.
    ProfileSelected(ProviderType),
    /// The websocket opened.
    ConnectionOpened,
    /// The websocket closed.
    ConnectionClosed,
}

/// A published event. Each variant belongs to exactly one [`Topic`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Confirmed provider state change.
    ProviderStateChange {
        /// Provider slot.
        provider: ProviderType,
        /// Payload.
        change: ProviderStateChange,
    },
    /// Forward throw accepted.
    ThrowSucceeded(ThrowEventSuccess),
    /// Forward throw rejected.
    ThrowFailed(ThrowEventFailure),
    /// Provider data transfer.
    ProviderDataFlow {
        /// Provider slot.
        provider: ProviderType,
        /// Payload.
        flow: DataFlow,
    },
    /// Provider delivery mode change.
    DeliveryModeChange {
        /// Provider slot.
        provider: ProviderType,
        /// Payload.
        change: DeliveryModeChange,
    },
    /// Confirmed link state change.
    LinkStateChange {
        /// Link.
        link: Link,
        /// Payload.
        change: LinkStateChange,
    },
    /// Link data transfer.
    LinkDataFlow {
        /// Link.
        link: Link,
        /// Payload.
        flow: DataFlow,
    },
    /// Profile created on the server.
    ProfileCreated(ProfileChange),
    /// Profile updated on the server.
    ProfileUpdated(ProfileChange),
    /// Profile deleted on the server.
    ProfileDeleted(ProfileChange),
    /// Proxy log message.
    LogMessage(LogEntry),
    /// A provider bound a profile.
    ProviderBound {
        /// Provider slot.
        provider: ProviderType,
        /// Bound profile, when the server reported one.
        profile: Option<String>,
    },
    /// A provider released its profile.
    ProviderUnbound(ProviderType),
    /// The profile selection for a provider changed; `None` clears it.
    ProfileSelected {
        /// Provider slot.
        provider: ProviderType,
        /// Newly selected profile.
        profile: Option<String>,
    },
    /// The websocket opened.
    ConnectionOpened,
    /// The websocket closed.
    ConnectionClosed {
        /// Why it closed.
        reason: String,
    },
}

impl Event {
    /// The topic this event is published on.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::ProviderStateChange { provider, .. } => Topic::ProviderStateChange(*provider),
            Self::ThrowSucceeded(_) => Topic::ThrowSucceeded,
            Self::ThrowFailed(_) => Topic::ThrowFailed,
            Self::ProviderDataFlow { provider, .. } => Topic::ProviderDataFlow(*provider),
            Self::DeliveryModeChange { provider, .. } => Topic::DeliveryModeChange(*provider),
            Self::LinkStateChange { link, .. } => Topic::LinkStateChange(*link),
            Self::LinkDataFlow { link, .. } => Topic::LinkDataFlow(*link),
            Self::ProfileCreated(_) => Topic::ProfileCreated,
            Self::ProfileUpdated(_) => Topic::ProfileUpdated,
            Self::ProfileDeleted(_) => Topic::ProfileDeleted,
            Self::LogMessage(_) => Topic::LogMessage,
            Self::ProviderBound { provider, .. } => Topic::ProviderBound(*provider),
            Self::ProviderUnbound(provider) => Topic::ProviderUnbound(*provider),
            Self::ProfileSelected { provider, .. } => Topic::ProfileSelected(*provider),
            Self::ConnectionOpened => Topic::ConnectionOpened,
            Self::ConnectionClosed { .. } => Topic::ConnectionClosed,
        }
    }
}

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Topic-keyed listener registry.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<Topic, Vec<Listener>>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for a topic. There is no unsubscribe.
    pub fn subscribe<F>(&self, topic: Topic, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .entry(topic)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Deliver an event to every listener of its topic.
    ///
    /// Returns the number of listeners invoked. A panicking listener is not
    /// caught: it unwinds into the caller and the remaining listeners of
    /// this publish are skipped.
    pub fn publish(&self, event: &Event) -> usize {
        let topic = event.topic();
        let listeners: Vec<Listener> = match self.listeners.read().get(&topic) {
            Some(listeners) => listeners.clone(),
            None => return 0,
        };

        trace!(?topic, listeners = listeners.len(), "publishing");
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    /// Number of listeners registered for a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.listeners.read().get(&topic).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("EventBus")
            .field("topics", &listeners.len())
            .field(
                "listeners",
                &listeners.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn opened() -> Event {
        Event::ConnectionOpened
    }

    // ==================== Publish Tests ====================

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(&opened()), 0);
        assert_eq!(bus.subscriber_count(Topic::ConnectionOpened), 0);
    }

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for id in 0..3 {
            let seen = Arc::clone(&seen);
            bus.subscribe(Topic::ConnectionOpened, move |_| seen.lock().push(id));
        }

        assert_eq!(bus.publish(&opened()), 3);
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_topics_are_isolated() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        bus.subscribe(Topic::ProviderUnbound(ProviderType::Forward), move |_| {
            *counter.lock() += 1;
        });

        bus.publish(&Event::ProviderUnbound(ProviderType::Return));
        assert_eq!(*hits.lock(), 0);

        bus.publish(&Event::ProviderUnbound(ProviderType::Forward));
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn test_late_subscriber_gets_nothing_retroactively() {
        let bus = EventBus::new();
        bus.publish(&opened());

        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        bus.subscribe(Topic::ConnectionOpened, move |_| *counter.lock() += 1);
        assert_eq!(*hits.lock(), 0);

        bus.publish(&opened());
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn test_subscribe_during_dispatch_applies_to_later_publishes() {
        let bus = Arc::new(EventBus::new());
        let inner_hits = Arc::new(Mutex::new(0));

        let bus_ref = Arc::clone(&bus);
        let hits = Arc::clone(&inner_hits);
        bus.subscribe(Topic::ConnectionOpened, move |_| {
            let hits = Arc::clone(&hits);
            bus_ref.subscribe(Topic::ConnectionOpened, move |_| *hits.lock() += 1);
        });

        assert_eq!(bus.publish(&opened()), 1);
        assert_eq!(*inner_hits.lock(), 0);

        assert_eq!(bus.publish(&opened()), 2);
        assert_eq!(*inner_hits.lock(), 1);
    }

    #[test]
    fn test_panicking_listener_stops_remaining_listeners() {
        let bus = EventBus::new();
        let after = Arc::new(Mutex::new(false));
        bus.subscribe(Topic::ConnectionOpened, |_| {
            std::panic::panic_any("listener failed");
        });
        let flag = Arc::clone(&after);
        bus.subscribe(Topic::ConnectionOpened, move |_| *flag.lock() = true);

        let result = catch_unwind(AssertUnwindSafe(|| bus.publish(&opened())));
        assert!(result.is_err());
        assert!(!*after.lock());
    }

    // ==================== Topic Tests ====================

    #[test]
    fn test_event_topics() {
        let event = Event::ProfileSelected {
            provider: ProviderType::Return,
            profile: None,
        };
        assert_eq!(event.topic(), Topic::ProfileSelected(ProviderType::Return));

        let event = Event::LinkDataFlow {
            link: Link::Downlink,
            flow: DataFlow::default(),
        };
        assert_eq!(event.topic(), Topic::LinkDataFlow(Link::Downlink));

        let event = Event::ConnectionClosed {
            reason: "eof".into(),
        };
        assert_eq!(event.topic(), Topic::ConnectionClosed);
    }

    #[test]
    fn test_listener_receives_payload() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&received);
        bus.subscribe(Topic::LogMessage, move |event| {
            *slot.lock() = Some(event.clone());
        });

        let event = Event::LogMessage(LogEntry {
            time: "2024-01-01T00:00:00".into(),
            level: "INFO".into(),
            message: "bound".into(),
        });
        bus.publish(&event);
        assert_eq!(received.lock().as_ref(), Some(&event));
    }
}
