use crate::error::CheckoutError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where the order is shipped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "M-Pesa")]
    MPesa,
}

/// One cart row: a product, how many, and the unit price charged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: u64,
    pub quantity: u32,
    pub price: Decimal,
}

impl LineItem {
    pub fn new(product_id: u64, quantity: u32, price: Decimal) -> Result<Self, CheckoutError> {
        if quantity == 0 {
            return Err(CheckoutError::ValidationError(format!(
                "Quantity for product {product_id} must be at least 1"
            )));
        }
        if price.is_sign_negative() {
            return Err(CheckoutError::ValidationError(format!(
                "Price for product {product_id} must not be negative"
            )));
        }
        Ok(Self {
            product_id,
            quantity,
            price,
        })
    }

    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Everything the order-creation collaborator needs.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub shipping: ShippingDetails,
    pub payment_method: PaymentMethod,
    pub items: Vec<LineItem>,
}

impl OrderRequest {
    pub fn new(
        shipping: ShippingDetails,
        payment_method: PaymentMethod,
        items: Vec<LineItem>,
    ) -> Result<Self, CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::ValidationError(
                "Your cart is empty".to_string(),
            ));
        }
        Ok(Self {
            shipping,
            payment_method,
            items,
        })
    }

    pub fn total(&self) -> Decimal {
        self.items.iter().map(LineItem::subtotal).sum()
    }
}
