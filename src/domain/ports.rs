use super::order::OrderRequest;
use super::payment::{InitiationReceipt, OrderId, PaymentId, PaymentStatus, PhoneNumber};
use crate::error::GatewayError;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderId, GatewayError>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Sends the STK Push for `order_id` to `phone_number`.
    async fn initiate_payment(
        &self,
        order_id: OrderId,
        phone_number: &PhoneNumber,
    ) -> Result<InitiationReceipt, GatewayError>;

    async fn check_status(&self, payment_id: &PaymentId) -> Result<PaymentStatus, GatewayError>;
}

pub type SharedOrderService = Arc<dyn OrderService>;
pub type SharedPaymentGateway = Arc<dyn PaymentGateway>;
