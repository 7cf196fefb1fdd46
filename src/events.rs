//! Core events for the presentation layer
//!
//! Subscribers get a bounded queue each. A subscriber that stops draining
//! its queue loses events rather than stalling the receive path, and a
//! dropped receiver is pruned on the next publish.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::net::SocketAddr;

use crate::channels::LogEntry;
use crate::constants::EVENT_QUEUE_CAPACITY;
use crate::error::DecodeError;
use crate::layout::LayoutMode;

/// Something the presentation layer may want to redraw for
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// An entry was appended to a channel
    LogAppended {
        index: usize,
        entry_count: usize,
        entry: LogEntry,
    },
    /// A channel was emptied
    ChannelCleared { index: usize },
    /// Every channel was emptied on request
    AllCleared,
    /// The idle countdown ran out and every channel was emptied
    CountdownExpired,
    /// A channel was renamed
    CaptionChanged { index: usize, caption: String },
    /// The layout or its active channel changed
    LayoutChanged { mode: LayoutMode, active: usize },
    /// A datagram was rejected
    DatagramDropped {
        from: Option<SocketAddr>,
        reason: DecodeError,
    },
    /// The listener is bound
    ServerStarted { local_addr: SocketAddr },
    /// The listener was released
    ServerStopped,
}

/// Fan-out of [`CoreEvent`]s to any number of subscribers
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<CoreEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        let (tx, rx) = bounded(EVENT_QUEUE_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber
    pub fn publish(&self, event: CoreEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Event queue full, dropping {:?}", event);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(CoreEvent::AllCleared);

        assert_eq!(a.try_recv().unwrap(), CoreEvent::AllCleared);
        assert_eq!(b.try_recv().unwrap(), CoreEvent::AllCleared);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(CoreEvent::ServerStopped);

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.try_recv().unwrap(), CoreEvent::ServerStopped);
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let bus = EventBus::new();
        let rx = bus.subscribe();

        for _ in 0..EVENT_QUEUE_CAPACITY + 10 {
            bus.publish(CoreEvent::AllCleared);
        }

        assert_eq!(rx.len(), EVENT_QUEUE_CAPACITY);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
