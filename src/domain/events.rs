use super::payment::PollState;
use tokio::sync::mpsc;

/// Views the host may be asked to navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Orders,
}

/// Outward notifications of a payment attempt, consumed by the host UI.
#[derive(Debug, Clone, PartialEq)]
pub enum PollerEvent {
    StateChanged(PollState),
    /// Human-readable progress text.
    Status(String),
    /// Human-readable error text shown next to the status.
    Error(String),
    Navigate(Destination),
}

/// Sending half of the event stream. A dropped receiver is tolerated.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<PollerEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<PollerEvent>) -> Self {
        Self { tx }
    }

    /// Creates a sink together with the receiver the host subscribes to.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PollerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: PollerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event receiver dropped, discarding event");
        }
    }

    pub fn status(&self, text: impl Into<String>) {
        self.emit(PollerEvent::Status(text.into()));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.emit(PollerEvent::Error(text.into()));
    }
}
