//! Application layer orchestrating a checkout.
//!
//! `CheckoutService` creates the order and hands it to a
//! `PaymentConfirmationPoller`, which runs the payment state machine on a
//! `tokio` task and reports progress over a channel.

pub mod checkout;
pub mod poller;
