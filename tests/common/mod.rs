#![allow(dead_code)]

use mpesa_checkout::application::poller::PaymentConfirmationPoller;
use mpesa_checkout::config::PollerConfig;
use mpesa_checkout::domain::events::{EventSink, PollerEvent};
use mpesa_checkout::domain::payment::{PaymentStatus, PhoneNumber};
use mpesa_checkout::error::GatewayError;
use mpesa_checkout::infrastructure::in_memory::ScriptedPaymentGateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// An event together with the (virtual) time it was observed at.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub at: Duration,
    pub event: PollerEvent,
}

pub fn phone() -> PhoneNumber {
    PhoneNumber::new("254712345678").unwrap()
}

pub fn pending(n: usize) -> Vec<Result<PaymentStatus, GatewayError>> {
    vec![Ok(PaymentStatus::Pending); n]
}

pub fn transport_error() -> Result<PaymentStatus, GatewayError> {
    Err(GatewayError::Transport("connection reset by peer".to_string()))
}

/// Builds a poller with default timings and a recorder collecting its events.
pub fn poller_with_recorder(
    gateway: Arc<ScriptedPaymentGateway>,
) -> (PaymentConfirmationPoller, JoinHandle<Vec<Recorded>>) {
    let (events, rx) = EventSink::channel();
    let poller = PaymentConfirmationPoller::new(gateway, PollerConfig::default(), events);
    (poller, tokio::spawn(record(rx, Instant::now())))
}

pub async fn record(mut rx: UnboundedReceiver<PollerEvent>, start: Instant) -> Vec<Recorded> {
    let mut out = Vec::new();
    while let Some(event) = rx.recv().await {
        out.push(Recorded {
            at: start.elapsed(),
            event,
        });
    }
    out
}

pub fn time_of(recorded: &[Recorded], event: &PollerEvent) -> Option<Duration> {
    recorded.iter().find(|r| &r.event == event).map(|r| r.at)
}

pub fn count(recorded: &[Recorded], event: &PollerEvent) -> usize {
    recorded.iter().filter(|r| &r.event == event).count()
}
