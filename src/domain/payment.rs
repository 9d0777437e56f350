use crate::error::{CheckoutError, StateError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of an order created by the commerce API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier the payment provider assigns once an STK Push is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// M-Pesa phone number that receives the STK Push.
///
/// Only emptiness is checked here; the payment provider owns format rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(value: impl AsRef<str>) -> Result<Self, CheckoutError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            Err(CheckoutError::ValidationError(
                "Please enter your M-Pesa phone number".to_string(),
            ))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for PhoneNumber {
    type Error = CheckoutError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Verdict returned by the status-check collaborator.
///
/// Anything other than `completed` or `failed` is inconclusive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Other(String),
}

impl From<&str> for PaymentStatus {
    fn from(value: &str) -> Self {
        match value {
            "pending" => PaymentStatus::Pending,
            "completed" => PaymentStatus::Completed,
            "failed" => PaymentStatus::Failed,
            other => PaymentStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        PaymentStatus::from(value.as_str())
    }
}

/// Answer of the payment-initiation collaborator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InitiationReceipt {
    pub success: bool,
    pub payment_id: Option<PaymentId>,
    pub message: Option<String>,
}

impl InitiationReceipt {
    pub fn accepted(payment_id: impl Into<String>) -> Self {
        Self {
            success: true,
            payment_id: Some(PaymentId::new(payment_id)),
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payment_id: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollState {
    Idle,
    Initiating,
    AwaitingConfirmation,
    Succeeded,
    Failed,
    TimedOut,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PollState::Succeeded | PollState::Failed | PollState::TimedOut
        )
    }
}

/// Result of a single status check, as seen by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Verdict(PaymentStatus),
    /// The status check could not be completed (transport error).
    Inconclusive,
}

/// One attempt at confirming the payment of an order.
///
/// All transitions go through the methods below; the fields are private so
/// the attempt counter and payment id invariants cannot be bypassed.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentAttempt {
    order_id: OrderId,
    payment_id: Option<PaymentId>,
    phone_number: PhoneNumber,
    state: PollState,
    attempt_count: u32,
    max_attempts: u32,
    poll_interval: Duration,
}

impl PaymentAttempt {
    /// Creates an idle attempt. A zero budget is raised to one poll.
    pub fn new(
        order_id: OrderId,
        phone_number: PhoneNumber,
        max_attempts: u32,
        poll_interval: Duration,
    ) -> Self {
        Self {
            order_id,
            payment_id: None,
            phone_number,
            state: PollState::Idle,
            attempt_count: 0,
            max_attempts: max_attempts.max(1),
            poll_interval,
        }
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn payment_id(&self) -> Option<&PaymentId> {
        self.payment_id.as_ref()
    }

    pub fn phone_number(&self) -> &PhoneNumber {
        &self.phone_number
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Idle -> Initiating.
    pub fn begin_initiation(&mut self) -> Result<(), StateError> {
        self.expect_state(PollState::Idle, "begin initiation")?;
        self.state = PollState::Initiating;
        Ok(())
    }

    /// Initiating -> AwaitingConfirmation, holding the provider's payment id.
    pub fn confirm_initiation(&mut self, payment_id: PaymentId) -> Result<(), StateError> {
        self.expect_state(PollState::Initiating, "confirm initiation")?;
        self.payment_id = Some(payment_id);
        self.attempt_count = 0;
        self.state = PollState::AwaitingConfirmation;
        Ok(())
    }

    /// Initiating -> Failed. Initiation failures are never retried.
    pub fn reject_initiation(&mut self) -> Result<(), StateError> {
        self.expect_state(PollState::Initiating, "reject initiation")?;
        self.state = PollState::Failed;
        Ok(())
    }

    /// Whether another status check may be issued.
    pub fn can_poll(&self) -> bool {
        self.state == PollState::AwaitingConfirmation
            && self.payment_id.is_some()
            && self.attempt_count < self.max_attempts
    }

    /// Applies the outcome of one status check and returns the new state.
    ///
    /// Inconclusive outcomes (pending, unknown statuses, transport errors)
    /// consume one attempt; reaching the budget yields `TimedOut`.
    pub fn apply_poll(&mut self, outcome: PollOutcome) -> Result<PollState, StateError> {
        self.expect_state(PollState::AwaitingConfirmation, "record a poll")?;
        if self.payment_id.is_none() {
            return Err(StateError::MissingPaymentId);
        }
        if self.attempt_count >= self.max_attempts {
            return Err(StateError::BudgetExhausted(self.max_attempts));
        }

        match outcome {
            PollOutcome::Verdict(PaymentStatus::Completed) => self.state = PollState::Succeeded,
            PollOutcome::Verdict(PaymentStatus::Failed) => self.state = PollState::Failed,
            PollOutcome::Verdict(_) | PollOutcome::Inconclusive => {
                self.attempt_count += 1;
                if self.attempt_count >= self.max_attempts {
                    self.state = PollState::TimedOut;
                }
            }
        }
        Ok(self.state)
    }

    fn expect_state(&self, expected: PollState, action: &'static str) -> Result<(), StateError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(StateError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn awaiting(max_attempts: u32) -> PaymentAttempt {
        let mut attempt = PaymentAttempt::new(
            OrderId(101),
            PhoneNumber::new("254712345678").unwrap(),
            max_attempts,
            Duration::from_millis(2000),
        );
        attempt.begin_initiation().unwrap();
        attempt.confirm_initiation(PaymentId::new("P1")).unwrap();
        attempt
    }

    #[test]
    fn test_phone_number_rejects_blank() {
        assert!(PhoneNumber::new("").is_err());
        assert!(PhoneNumber::new("   ").is_err());
        assert_eq!(
            PhoneNumber::new(" 254712345678 ").unwrap().as_str(),
            "254712345678"
        );
    }

    #[test]
    fn test_status_deserialization_keeps_unknown_values() {
        let status: PaymentStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, PaymentStatus::Completed);
        let status: PaymentStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(status, PaymentStatus::Other("processing".to_string()));
    }

    #[test]
    fn test_no_poll_without_payment_id() {
        let mut attempt = PaymentAttempt::new(
            OrderId(1),
            PhoneNumber::new("254700000000").unwrap(),
            30,
            Duration::from_millis(2000),
        );
        assert!(!attempt.can_poll());
        assert_eq!(
            attempt.apply_poll(PollOutcome::Inconclusive),
            Err(StateError::InvalidTransition {
                from: PollState::Idle,
                action: "record a poll",
            })
        );
        assert!(attempt.payment_id().is_none());
    }

    #[test]
    fn test_confirm_initiation_resets_attempts() {
        let attempt = awaiting(30);
        assert_eq!(attempt.state(), PollState::AwaitingConfirmation);
        assert_eq!(attempt.attempt_count(), 0);
        assert_eq!(attempt.payment_id(), Some(&PaymentId::new("P1")));
    }

    #[test]
    fn test_pending_and_errors_consume_attempts() {
        let mut attempt = awaiting(30);
        attempt
            .apply_poll(PollOutcome::Verdict(PaymentStatus::Pending))
            .unwrap();
        attempt.apply_poll(PollOutcome::Inconclusive).unwrap();
        attempt
            .apply_poll(PollOutcome::Verdict(PaymentStatus::Other("queued".into())))
            .unwrap();
        assert_eq!(attempt.attempt_count(), 3);
        assert_eq!(attempt.state(), PollState::AwaitingConfirmation);
    }

    #[test]
    fn test_verdicts_leave_counter_unchanged() {
        let mut attempt = awaiting(30);
        attempt.apply_poll(PollOutcome::Inconclusive).unwrap();
        let state = attempt
            .apply_poll(PollOutcome::Verdict(PaymentStatus::Completed))
            .unwrap();
        assert_eq!(state, PollState::Succeeded);
        assert_eq!(attempt.attempt_count(), 1);

        let mut attempt = awaiting(30);
        let state = attempt
            .apply_poll(PollOutcome::Verdict(PaymentStatus::Failed))
            .unwrap();
        assert_eq!(state, PollState::Failed);
        assert_eq!(attempt.attempt_count(), 0);
    }

    #[test]
    fn test_budget_exhaustion_times_out() {
        let mut attempt = awaiting(3);
        for _ in 0..2 {
            assert_eq!(
                attempt.apply_poll(PollOutcome::Inconclusive).unwrap(),
                PollState::AwaitingConfirmation
            );
        }
        assert_eq!(
            attempt.apply_poll(PollOutcome::Inconclusive).unwrap(),
            PollState::TimedOut
        );
        assert_eq!(attempt.attempt_count(), 3);
        assert!(!attempt.can_poll());
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        let mut attempt = awaiting(30);
        attempt
            .apply_poll(PollOutcome::Verdict(PaymentStatus::Completed))
            .unwrap();
        assert!(attempt.is_terminal());
        assert!(
            attempt
                .apply_poll(PollOutcome::Verdict(PaymentStatus::Failed))
                .is_err()
        );
        assert!(attempt.reject_initiation().is_err());
        assert!(attempt.begin_initiation().is_err());
        assert_eq!(attempt.state(), PollState::Succeeded);
    }

    #[test]
    fn test_rejected_initiation_is_terminal() {
        let mut attempt = PaymentAttempt::new(
            OrderId(7),
            PhoneNumber::new("254700000000").unwrap(),
            30,
            Duration::from_millis(2000),
        );
        attempt.begin_initiation().unwrap();
        attempt.reject_initiation().unwrap();
        assert_eq!(attempt.state(), PollState::Failed);
        assert!(attempt.confirm_initiation(PaymentId::new("late")).is_err());
    }
}
