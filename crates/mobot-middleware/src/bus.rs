//! Headless, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the publishers.  The control loops publish from synchronous code; sending
//! never blocks and never fails because nobody is listening.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Mode`] | Mode changes and wander state changes |
//! | [`Topic::Safety`] | Interlock actions (emergency stop, stop, slowdown, release) |
//! | [`Topic::Faults`] | Behavior faults caught by the mode controller |
//!
//! Every event is also delivered to the firehose returned by
//! [`EventBus::subscribe_all`], which is what a console or logger wants.

use mobot_types::{Event, EventPayload};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Mode,
    Safety,
    Faults,
}

impl Topic {
    /// The lane an event payload is routed to.
    pub fn of(payload: &EventPayload) -> Self {
        match payload {
            EventPayload::ModeChanged { .. } | EventPayload::WanderStateChanged { .. } => {
                Topic::Mode
            }
            EventPayload::Interlock { .. } => Topic::Safety,
            EventPayload::BehaviorFault { .. } => Topic::Faults,
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    all: broadcast::Sender<Event>,
    mode: broadcast::Sender<Event>,
    safety: broadcast::Sender<Event>,
    faults: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus.  `capacity` applies to every channel independently
    /// and must be non-zero.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (all, _) = broadcast::channel(capacity);
        let (mode, _) = broadcast::channel(capacity);
        let (safety, _) = broadcast::channel(capacity);
        let (faults, _) = broadcast::channel(capacity);
        Self {
            all,
            mode,
            safety,
            faults,
        }
    }

    /// Publish `event` to its topic and to the firehose.
    ///
    /// Returns the number of receivers on the event's topic that were handed
    /// the event; `0` when nobody listens, which is normal.
    pub fn publish(&self, event: Event) -> usize {
        let topic = Topic::of(&event.payload);
        // A send error only means there are no receivers right now.
        let _ = self.all.send(event.clone());
        self.topic_sender(topic).send(event).unwrap_or(0)
    }

    /// Subscribe to a single topic.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic: Some(topic),
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to every event regardless of topic.
    pub fn subscribe_all(&self) -> TopicReceiver {
        TopicReceiver {
            topic: None,
            receiver: self.all.subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Mode => &self.mode,
            Topic::Safety => &self.safety,
            Topic::Faults => &self.faults,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to one topic, or to the firehose.
pub struct TopicReceiver {
    topic: Option<Topic>,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event.  A subscriber that fell behind skips the
    /// dropped events with a warning.  Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "event subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// The topic this receiver is bound to; `None` for the firehose.
    pub fn topic(&self) -> Option<Topic> {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mobot_types::{InterlockAction, Mode};

    fn mode_event() -> Event {
        Event::new(
            "mobot-runtime::mode",
            EventPayload::ModeChanged { from: Mode::Manual, to: Mode::AutoWander },
        )
    }

    fn interlock_event() -> Event {
        Event::new(
            "mobot-kernel::interlock",
            EventPayload::Interlock { action: InterlockAction::Stop, distance_m: 0.15 },
        )
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(mode_event()), 0);
    }

    #[tokio::test]
    async fn topic_subscribers_receive_only_their_lane() {
        let bus = EventBus::default();
        let mut mode = bus.subscribe_to(Topic::Mode);
        let mut safety = bus.subscribe_to(Topic::Safety);

        let event = interlock_event();
        assert_eq!(bus.publish(event.clone()), 1);

        assert_eq!(safety.recv().await.map(|e| e.id), Some(event.id));
        assert!(mode.try_recv().is_none());
    }

    #[tokio::test]
    async fn firehose_sees_everything_in_order() {
        let bus = EventBus::default();
        let mut all = bus.subscribe_all();
        let a = mode_event();
        let b = interlock_event();
        bus.publish(a.clone());
        bus.publish(b.clone());
        assert_eq!(all.recv().await.map(|e| e.id), Some(a.id));
        assert_eq!(all.recv().await.map(|e| e.id), Some(b.id));
        assert_eq!(all.topic(), None);
    }

    #[tokio::test]
    async fn slow_subscriber_skips_lagged_events() {
        let bus = EventBus::new(4);
        let mut slow = bus.subscribe_to(Topic::Mode);
        for _ in 0..20 {
            bus.publish(mode_event());
        }
        // Lag is absorbed; the newest buffered events are still delivered.
        assert!(slow.recv().await.is_some());
    }

    #[tokio::test]
    async fn closed_bus_ends_stream() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Faults);
        drop(bus);
        assert!(rx.recv().await.is_none());
    }
}
