use crate::domain::order::OrderRequest;
use crate::domain::payment::{InitiationReceipt, OrderId, PaymentId, PaymentStatus, PhoneNumber};
use crate::domain::ports::{OrderService, PaymentGateway};
use crate::error::GatewayError;
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// A payment gateway that replays a scripted sequence of answers.
///
/// Used by the tests and by the CLI's `--simulate` mode. Once the status
/// script runs dry every further check fails with [`GatewayError::Exhausted`].
pub struct ScriptedPaymentGateway {
    receipt: Result<InitiationReceipt, GatewayError>,
    statuses: Mutex<VecDeque<Result<PaymentStatus, GatewayError>>>,
    latency: Duration,
    initiations: AtomicUsize,
    status_checks: AtomicUsize,
}

impl ScriptedPaymentGateway {
    pub fn with_receipt(receipt: InitiationReceipt) -> Self {
        Self::new(Ok(receipt))
    }

    /// Accepts every initiation with the given payment id.
    pub fn accepting(payment_id: impl Into<String>) -> Self {
        Self::with_receipt(InitiationReceipt::accepted(payment_id))
    }

    /// Answers every initiation with `success=false` and `message`.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self::with_receipt(InitiationReceipt::rejected(message))
    }

    pub fn failing_initiation(error: GatewayError) -> Self {
        Self::new(Err(error))
    }

    fn new(receipt: Result<InitiationReceipt, GatewayError>) -> Self {
        Self {
            receipt,
            statuses: Mutex::new(VecDeque::new()),
            latency: Duration::ZERO,
            initiations: AtomicUsize::new(0),
            status_checks: AtomicUsize::new(0),
        }
    }

    pub fn with_statuses(
        self,
        statuses: impl IntoIterator<Item = Result<PaymentStatus, GatewayError>>,
    ) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            ..self
        }
    }

    /// Delays every answer by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        Self { latency, ..self }
    }

    pub fn initiations(&self) -> usize {
        self.initiations.load(Ordering::SeqCst)
    }

    pub fn status_checks(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }

    async fn respond(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedPaymentGateway {
    async fn initiate_payment(
        &self,
        _order_id: OrderId,
        _phone_number: &PhoneNumber,
    ) -> Result<InitiationReceipt, GatewayError> {
        self.initiations.fetch_add(1, Ordering::SeqCst);
        self.respond().await;
        self.receipt.clone()
    }

    async fn check_status(&self, _payment_id: &PaymentId) -> Result<PaymentStatus, GatewayError> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        self.respond().await;
        let mut statuses = self.statuses.lock().await;
        statuses
            .pop_front()
            .unwrap_or(Err(GatewayError::Exhausted("check_status")))
    }
}

/// An order service that keeps created orders in memory.
///
/// Order ids are handed out sequentially.
pub struct InMemoryOrderService {
    next_id: AtomicU64,
    orders: RwLock<BTreeMap<OrderId, OrderRequest>>,
    failure: Option<GatewayError>,
}

impl Default for InMemoryOrderService {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl InMemoryOrderService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first_id: u64) -> Self {
        Self {
            next_id: AtomicU64::new(first_id),
            orders: RwLock::new(BTreeMap::new()),
            failure: None,
        }
    }

    /// Rejects every order with `error`.
    pub fn failing(error: GatewayError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub async fn orders(&self) -> Vec<(OrderId, OrderRequest)> {
        let orders = self.orders.read().await;
        orders
            .iter()
            .map(|(id, request)| (*id, request.clone()))
            .collect()
    }
}

#[async_trait]
impl OrderService for InMemoryOrderService {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderId, GatewayError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let id = OrderId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut orders = self.orders.write().await;
        orders.insert(id, request.clone());
        Ok(id)
    }
}
