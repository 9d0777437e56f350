use super::poller::PaymentConfirmationPoller;
use crate::config::PollerConfig;
use crate::domain::events::EventSink;
use crate::domain::order::{LineItem, OrderRequest, PaymentMethod, ShippingDetails};
use crate::domain::payment::{OrderId, PaymentAttempt, PhoneNumber};
use crate::domain::ports::{SharedOrderService, SharedPaymentGateway};
use crate::error::{CheckoutError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const MSG_ORDER_FAILED: &str = "Failed to create order";

/// What the checkout form submits.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub shipping: ShippingDetails,
    pub payment_method: PaymentMethod,
    pub items: Vec<LineItem>,
    pub phone_number: String,
}

/// Turns a checkout submission into an order and confirms its payment.
pub struct CheckoutService {
    orders: SharedOrderService,
    gateway: SharedPaymentGateway,
    config: PollerConfig,
}

impl CheckoutService {
    pub fn new(
        orders: SharedOrderService,
        gateway: SharedPaymentGateway,
        config: PollerConfig,
    ) -> Self {
        Self {
            orders,
            gateway,
            config,
        }
    }

    /// Validates the submission and creates the order.
    ///
    /// The phone number is checked before anything is sent so that a missing
    /// number never leaves an unpaid order behind.
    pub async fn place_order(&self, request: CheckoutRequest) -> Result<(OrderId, PhoneNumber)> {
        let order = OrderRequest::new(request.shipping, request.payment_method, request.items)?;
        let phone_number = PhoneNumber::new(&request.phone_number)?;

        let order_id = self.orders.create_order(&order).await.map_err(|err| {
            warn!(error = %err, "order creation failed");
            CheckoutError::OrderCreation(
                err.server_message().unwrap_or(MSG_ORDER_FAILED).to_string(),
            )
        })?;
        info!(order_id = %order_id, total = %order.total(), "order created");
        Ok((order_id, phone_number))
    }

    /// Places the order and drives its payment to a terminal state.
    ///
    /// Cancelling `cancel` abandons the payment attempt; the order stays.
    pub async fn checkout(
        &self,
        request: CheckoutRequest,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Result<PaymentAttempt> {
        let (order_id, phone_number) = self.place_order(request).await?;
        let poller = PaymentConfirmationPoller::new(self.gateway.clone(), self.config, events)
            .with_cancellation_token(cancel);
        Ok(poller.initiate(order_id, phone_number).await)
    }
}
