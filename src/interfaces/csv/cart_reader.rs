use crate::domain::order::LineItem;
use crate::error::{CheckoutError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct CartRow {
    product_id: u64,
    quantity: u32,
    price: Decimal,
}

/// Reads cart line items from a CSV source with a
/// `product_id, quantity, price` header.
pub struct CartReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CartReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields each row as a validated [`LineItem`].
    pub fn items(self) -> impl Iterator<Item = Result<LineItem>> {
        self.reader.into_deserialize().map(|row| {
            let row: CartRow = row.map_err(CheckoutError::from)?;
            LineItem::new(row.product_id, row.quantity, row.price)
        })
    }

    /// Reads the whole cart, stopping at the first bad row.
    pub fn read_all(self) -> Result<Vec<LineItem>> {
        self.items().collect()
    }
}
