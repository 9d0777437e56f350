use crate::config::HttpConfig;
use crate::domain::order::{LineItem, OrderRequest, PaymentMethod};
use crate::domain::payment::{InitiationReceipt, OrderId, PaymentId, PaymentStatus, PhoneNumber};
use crate::domain::ports::{OrderService, PaymentGateway};
use crate::error::GatewayError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Client for the storefront's REST commerce API.
///
/// The bearer token is passed in by the caller; do not log it.
#[derive(Debug, Clone)]
pub struct HttpCommerceClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCommerceClient {
    pub fn new(config: &HttpConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Http {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

/// Pulls the human-readable reason out of an error body (`message`, then `detail`).
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "detail"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

#[derive(Serialize)]
struct OrderBody<'a> {
    shipping_address: &'a str,
    shipping_city: &'a str,
    shipping_postal_code: &'a str,
    shipping_country: &'a str,
    payment_method: PaymentMethod,
    items: &'a [LineItem],
}

#[derive(Deserialize)]
struct CreatedOrder {
    id: u64,
}

#[derive(Serialize)]
struct InitiateBody<'a> {
    order_id: OrderId,
    phone_number: &'a str,
}

#[derive(Deserialize)]
struct InitiateResponse {
    success: bool,
    #[serde(default)]
    payment_id: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl From<InitiateResponse> for InitiationReceipt {
    fn from(response: InitiateResponse) -> Self {
        // The API returns numeric ids, but strings are accepted too.
        let payment_id = match response.payment_id {
            Some(Value::String(id)) if !id.is_empty() => Some(PaymentId::new(id)),
            Some(Value::Number(id)) => Some(PaymentId::new(id.to_string())),
            _ => None,
        };
        Self {
            success: response.success,
            payment_id,
            message: response.message,
        }
    }
}

#[derive(Deserialize)]
struct StatusResponse {
    status: PaymentStatus,
}

#[async_trait]
impl OrderService for HttpCommerceClient {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderId, GatewayError> {
        let body = OrderBody {
            shipping_address: &request.shipping.address,
            shipping_city: &request.shipping.city,
            shipping_postal_code: &request.shipping.postal_code,
            shipping_country: &request.shipping.country,
            payment_method: request.payment_method,
            items: &request.items,
        };
        let response = self
            .authorized(self.http.post(self.url("orders/orders/")))
            .json(&body)
            .send()
            .await?;
        let created: CreatedOrder = Self::read_json(response).await?;
        debug!(order_id = created.id, "order created");
        Ok(OrderId(created.id))
    }
}

#[async_trait]
impl PaymentGateway for HttpCommerceClient {
    async fn initiate_payment(
        &self,
        order_id: OrderId,
        phone_number: &PhoneNumber,
    ) -> Result<InitiationReceipt, GatewayError> {
        let body = InitiateBody {
            order_id,
            phone_number: phone_number.as_str(),
        };
        let response = self
            .authorized(self.http.post(self.url("payments/initiate_mpesa/")))
            .json(&body)
            .send()
            .await?;
        let receipt: InitiateResponse = Self::read_json(response).await?;
        Ok(receipt.into())
    }

    async fn check_status(&self, payment_id: &PaymentId) -> Result<PaymentStatus, GatewayError> {
        let path = format!("payments/{payment_id}/check_status/");
        let response = self.authorized(self.http.get(self.url(&path))).send().await?;
        let body: StatusResponse = Self::read_json(response).await?;
        Ok(body.status)
    }
}
