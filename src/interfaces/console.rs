use crate::domain::events::{Destination, PollerEvent};
use std::io::{self, Write};
use tokio::sync::mpsc::UnboundedReceiver;

/// What the host saw once the event stream closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSummary {
    pub navigated_to_orders: bool,
}

/// Terminal stand-in for the checkout view: prints status and error text as
/// it arrives and follows navigation signals.
pub struct StatusPrinter<W: Write> {
    out: W,
}

impl<W: Write> StatusPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn render(&mut self, event: &PollerEvent) -> io::Result<()> {
        match event {
            PollerEvent::Status(text) => writeln!(self.out, "{text}")?,
            PollerEvent::Error(text) => writeln!(self.out, "Error: {text}")?,
            PollerEvent::Navigate(Destination::Orders) => writeln!(self.out, "-> /orders")?,
            PollerEvent::StateChanged(state) => {
                tracing::debug!(state = ?state, "payment state changed");
                return Ok(());
            }
        }
        self.out.flush()
    }

    /// Renders events until every sender is gone.
    pub async fn run(
        mut self,
        mut events: UnboundedReceiver<PollerEvent>,
    ) -> io::Result<SessionSummary> {
        let mut summary = SessionSummary::default();
        while let Some(event) = events.recv().await {
            if event == PollerEvent::Navigate(Destination::Orders) {
                summary.navigated_to_orders = true;
            }
            self.render(&event)?;
        }
        Ok(summary)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
