//! Notification sinks carrying progress events from the engine to observers.

use std::sync::{Arc, Mutex};

use lunapatch_core::ProgressEvent;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 256;

/// Fire-and-forget event publisher; implementations must never block a run.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

/// Fans events out to every live subscriber. Events published while nobody
/// is subscribed are dropped.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<ProgressEvent>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for BroadcastSink {
    fn publish(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            trace!("progress event dropped with no subscribers");
        }
    }
}

/// Keeps every event in memory for later inspection.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn publish(&self, event: ProgressEvent) {
        (**self).publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunapatch_core::Step;

    #[test]
    fn broadcast_without_subscribers_drops_silently() {
        let sink = BroadcastSink::new();
        sink.publish(ProgressEvent::global_log("nobody listening"));

        let mut rx = sink.subscribe();
        sink.publish(ProgressEvent::StepUpdate(Step::Setup));
        assert_eq!(
            rx.try_recv().expect("event"),
            ProgressEvent::StepUpdate(Step::Setup)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn broadcast_reaches_every_subscriber() {
        let sink = BroadcastSink::new();
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();
        assert_eq!(sink.receiver_count(), 2);

        sink.publish(ProgressEvent::InstallationComplete);
        assert!(first.try_recv().expect("first").is_terminal());
        assert!(second.try_recv().expect("second").is_terminal());
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.publish(ProgressEvent::global_log("one"));
        sink.publish(ProgressEvent::InstallationComplete);
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());

        sink.clear();
        assert!(sink.events().is_empty());
    }
}
