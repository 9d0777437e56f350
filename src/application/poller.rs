use crate::config::PollerConfig;
use crate::domain::events::{Destination, EventSink, PollerEvent};
use crate::domain::payment::{
    InitiationReceipt, OrderId, PaymentAttempt, PollOutcome, PollState, PhoneNumber,
};
use crate::domain::ports::SharedPaymentGateway;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, warn};

pub const MSG_INITIATING: &str = "Initiating M-Pesa payment...";
pub const MSG_STK_SENT: &str =
    "STK Push sent! Please check your phone and enter your M-Pesa PIN to complete payment.";
pub const MSG_INITIATION_REJECTED: &str = "Failed to initiate payment";
pub const MSG_INITIATION_ERROR: &str = "Payment initiation failed";
pub const MSG_INITIATION_GENERIC: &str = "Failed to initiate M-Pesa payment";
pub const MSG_SUCCEEDED: &str = "Payment successful! Redirecting...";
pub const MSG_FAILED: &str = "Payment failed. Please try again.";
pub const MSG_NOT_COMPLETED: &str = "Payment was not completed";
pub const MSG_TIMED_OUT: &str = "Payment timeout. Please check your orders.";

/// Drives one payment attempt from initiation to a terminal state.
///
/// The poller never fails past its own boundary: every outcome is reported
/// through the [`EventSink`] and reflected in the returned [`PaymentAttempt`].
/// Status checks are strictly sequential; the next one is scheduled only
/// after the previous one resolved.
///
/// Cancelling (see [`PaymentConfirmationPoller::cancellation_token`]) stops
/// the attempt at its next suspension point. No status check is issued and
/// no event is emitted after cancellation.
pub struct PaymentConfirmationPoller {
    gateway: SharedPaymentGateway,
    config: PollerConfig,
    events: EventSink,
    cancel: CancellationToken,
}

impl PaymentConfirmationPoller {
    pub fn new(gateway: SharedPaymentGateway, config: PollerConfig, events: EventSink) -> Self {
        Self {
            gateway,
            config,
            events,
            cancel: CancellationToken::new(),
        }
    }

    /// Ties the attempt to a token owned by the host (e.g. a view's teardown).
    pub fn with_cancellation_token(self, cancel: CancellationToken) -> Self {
        Self { cancel, ..self }
    }

    /// Token the host cancels when it tears the attempt down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Initiates the payment and polls until a terminal state or cancellation.
    ///
    /// Returns once the navigation signal (if any) has been sent.
    #[instrument(skip_all, fields(order_id = %order_id))]
    pub async fn initiate(&self, order_id: OrderId, phone_number: PhoneNumber) -> PaymentAttempt {
        let mut attempt = PaymentAttempt::new(
            order_id,
            phone_number,
            self.config.max_attempts,
            self.config.poll_interval,
        );
        if self.cancel.is_cancelled() {
            return attempt;
        }

        self.events.status(MSG_INITIATING);
        if attempt.begin_initiation().is_err() {
            return attempt;
        }
        self.state_changed(&attempt);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("cancelled during payment initiation");
                return attempt;
            }
            result = self.gateway.initiate_payment(order_id, attempt.phone_number()) => result,
        };

        match result {
            Ok(InitiationReceipt {
                success: true,
                payment_id: Some(payment_id),
                ..
            }) => {
                info!(payment_id = %payment_id, "STK push accepted");
                if attempt.confirm_initiation(payment_id).is_err() {
                    return attempt;
                }
                self.state_changed(&attempt);
                self.events.status(MSG_STK_SENT);
            }
            Ok(receipt) => {
                info!(message = ?receipt.message, "payment initiation rejected");
                self.fail_initiation(
                    &mut attempt,
                    MSG_INITIATION_REJECTED,
                    receipt.message.as_deref(),
                );
                return attempt;
            }
            Err(err) => {
                warn!(error = %err, "payment initiation request failed");
                self.fail_initiation(&mut attempt, MSG_INITIATION_ERROR, err.server_message());
                return attempt;
            }
        }

        self.poll_until_settled(&mut attempt).await;
        attempt
    }

    /// Runs [`initiate`](Self::initiate) on a new task.
    pub fn spawn(self, order_id: OrderId, phone_number: PhoneNumber) -> PollerHandle {
        let cancel = self.cancel.clone();
        let join = tokio::spawn(async move { self.initiate(order_id, phone_number).await });
        PollerHandle {
            _teardown: cancel.clone().drop_guard(),
            cancel,
            join,
        }
    }

    async fn poll_until_settled(&self, attempt: &mut PaymentAttempt) {
        while attempt.can_poll() {
            let Some(payment_id) = attempt.payment_id().cloned() else {
                return;
            };

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(attempt = attempt.attempt_count(), "polling cancelled");
                    return;
                }
                result = self.gateway.check_status(&payment_id) => result,
            };

            let outcome = match result {
                Ok(status) => PollOutcome::Verdict(status),
                Err(err) => {
                    warn!(
                        payment_id = %payment_id,
                        attempt = attempt.attempt_count() + 1,
                        error = %err,
                        "status check failed"
                    );
                    PollOutcome::Inconclusive
                }
            };

            let state = match attempt.apply_poll(outcome) {
                Ok(state) => state,
                Err(err) => {
                    warn!(error = %err, "poll outcome rejected by state machine");
                    return;
                }
            };

            match state {
                PollState::Succeeded => {
                    info!(payment_id = %payment_id, "payment confirmed");
                    self.state_changed(attempt);
                    self.events.status(MSG_SUCCEEDED);
                    self.navigate_after(self.config.success_redirect_delay).await;
                }
                PollState::Failed => {
                    info!(payment_id = %payment_id, "payment failed");
                    self.state_changed(attempt);
                    self.events.status(MSG_FAILED);
                    self.events.error(MSG_NOT_COMPLETED);
                }
                PollState::TimedOut => {
                    warn!(
                        payment_id = %payment_id,
                        attempts = attempt.attempt_count(),
                        "payment confirmation timed out"
                    );
                    self.state_changed(attempt);
                    self.events.status(MSG_TIMED_OUT);
                    self.navigate_after(self.config.timeout_redirect_delay).await;
                }
                _ => {
                    debug!(
                        attempt = attempt.attempt_count(),
                        max_attempts = attempt.max_attempts(),
                        "payment still pending"
                    );
                    if !self.pause(attempt.poll_interval()).await {
                        info!(attempt = attempt.attempt_count(), "polling cancelled");
                        return;
                    }
                }
            }
        }
    }

    fn fail_initiation(&self, attempt: &mut PaymentAttempt, status: &str, message: Option<&str>) {
        if attempt.reject_initiation().is_err() {
            return;
        }
        self.state_changed(attempt);
        self.events.status(status);
        self.events
            .error(message.unwrap_or(MSG_INITIATION_GENERIC).to_string());
    }

    async fn navigate_after(&self, delay: Duration) {
        if self.pause(delay).await {
            self.events.emit(PollerEvent::Navigate(Destination::Orders));
        } else {
            debug!("navigation suppressed by cancellation");
        }
    }

    /// Sleeps for `duration`; returns `false` if cancelled first.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn state_changed(&self, attempt: &PaymentAttempt) {
        self.events.emit(PollerEvent::StateChanged(attempt.state()));
    }
}

/// Handle to a poller running on its own task.
///
/// Dropping the handle cancels the attempt.
pub struct PollerHandle {
    cancel: CancellationToken,
    join: JoinHandle<PaymentAttempt>,
    _teardown: DropGuard,
}

impl PollerHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the attempt to settle (or observe cancellation).
    pub async fn join(self) -> Result<PaymentAttempt, JoinError> {
        self.join.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentStatus;
    use crate::error::GatewayError;
    use crate::infrastructure::in_memory::ScriptedPaymentGateway;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn poller(
        gateway: Arc<ScriptedPaymentGateway>,
    ) -> (PaymentConfirmationPoller, UnboundedReceiver<PollerEvent>) {
        let (events, rx) = EventSink::channel();
        (
            PaymentConfirmationPoller::new(gateway, PollerConfig::default(), events),
            rx,
        )
    }

    fn drain(rx: &mut UnboundedReceiver<PollerEvent>) -> Vec<PollerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_verdict_stops_without_navigation() {
        let gateway = Arc::new(
            ScriptedPaymentGateway::accepting("P9")
                .with_statuses([Ok(PaymentStatus::Pending), Ok(PaymentStatus::Failed)]),
        );
        let (poller, mut rx) = poller(gateway.clone());

        let attempt = poller
            .initiate(OrderId(5), PhoneNumber::new("254700000000").unwrap())
            .await;

        assert_eq!(attempt.state(), PollState::Failed);
        assert_eq!(gateway.status_checks(), 2);
        let events = drain(&mut rx);
        assert!(events.contains(&PollerEvent::Error(MSG_NOT_COMPLETED.to_string())));
        assert!(!events.contains(&PollerEvent::Navigate(Destination::Orders)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initiation_transport_error_uses_server_message() {
        let gateway = Arc::new(ScriptedPaymentGateway::failing_initiation(
            GatewayError::Http {
                status: 400,
                message: Some("Invalid phone number".to_string()),
            },
        ));
        let (poller, mut rx) = poller(gateway.clone());

        let attempt = poller
            .initiate(OrderId(5), PhoneNumber::new("0000").unwrap())
            .await;

        assert_eq!(attempt.state(), PollState::Failed);
        assert_eq!(gateway.status_checks(), 0);
        let events = drain(&mut rx);
        assert!(events.contains(&PollerEvent::Status(MSG_INITIATION_ERROR.to_string())));
        assert!(events.contains(&PollerEvent::Error("Invalid phone number".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initiation_transport_error_falls_back_to_generic_message() {
        let gateway = Arc::new(ScriptedPaymentGateway::failing_initiation(
            GatewayError::Transport("connection reset".to_string()),
        ));
        let (poller, mut rx) = poller(gateway);

        let attempt = poller
            .initiate(OrderId(5), PhoneNumber::new("254700000000").unwrap())
            .await;

        assert_eq!(attempt.state(), PollState::Failed);
        assert!(drain(&mut rx).contains(&PollerEvent::Error(MSG_INITIATION_GENERIC.to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_without_payment_id_fails() {
        let gateway = Arc::new(ScriptedPaymentGateway::with_receipt(InitiationReceipt {
            success: true,
            payment_id: None,
            message: None,
        }));
        let (poller, _rx) = poller(gateway.clone());

        let attempt = poller
            .initiate(OrderId(5), PhoneNumber::new("254700000000").unwrap())
            .await;

        assert_eq!(attempt.state(), PollState::Failed);
        assert!(attempt.payment_id().is_none());
        assert_eq!(gateway.status_checks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_initiation_does_nothing() {
        let gateway = Arc::new(ScriptedPaymentGateway::accepting("P1"));
        let (poller, mut rx) = poller(gateway.clone());
        poller.cancel();

        let attempt = poller
            .initiate(OrderId(5), PhoneNumber::new("254700000000").unwrap())
            .await;

        assert_eq!(attempt.state(), PollState::Idle);
        assert_eq!(gateway.initiations(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_on_last_attempt_times_out() {
        let mut statuses: Vec<Result<PaymentStatus, GatewayError>> =
            vec![Ok(PaymentStatus::Pending); 29];
        statuses.push(Err(GatewayError::Transport("timeout".to_string())));
        let gateway = Arc::new(ScriptedPaymentGateway::accepting("P1").with_statuses(statuses));
        let (poller, _rx) = poller(gateway.clone());

        let attempt = poller
            .initiate(OrderId(5), PhoneNumber::new("254700000000").unwrap())
            .await;

        assert_eq!(attempt.state(), PollState::TimedOut);
        assert_eq!(attempt.attempt_count(), 30);
        assert_eq!(gateway.status_checks(), 30);
    }
}
