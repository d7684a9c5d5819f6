use chrono::{DateTime, Utc};

use super::money::{line_value, AmountError, Price, Quantity};
use super::{Category, Producer, Product, Shop, Variant};

/// A receipt. `total_cost` is stored, not derived: whoever changes the items
/// has to call `Database::recompute_transaction_total` afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: Option<i64>,
    /// Epoch milliseconds, UTC.
    pub date: i64,
    pub shop_id: Option<i64>,
    pub total_cost: Price,
    pub note: Option<String>,
}

impl Transaction {
    pub fn new(date: i64, shop_id: Option<i64>, total_cost: Price) -> Self {
        Self {
            id: None,
            date,
            shop_id,
            total_cost,
            note: None,
        }
    }

    pub fn date_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.date)
    }
}

/// One line of a receipt. `price` is the unit price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: Option<i64>,
    pub transaction_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: Quantity,
    pub price: Price,
}

impl Item {
    pub fn new(transaction_id: i64, product_id: i64, quantity: Quantity, price: Price) -> Self {
        Self {
            id: None,
            transaction_id,
            product_id,
            variant_id: None,
            quantity,
            price,
        }
    }

    pub fn value(&self) -> Result<Price, AmountError> {
        line_value(self.price, self.quantity)
    }
}

/// A transaction with every foreign key resolved, read as one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetails {
    pub transaction: Transaction,
    pub shop: Option<Shop>,
    pub items: Vec<ItemDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetails {
    pub item: Item,
    pub product: Product,
    pub category: Category,
    pub producer: Option<Producer>,
    pub variant: Option<Variant>,
}

impl TransactionDetails {
    /// Sum of the item values; equals `transaction.total_cost` when the
    /// caller kept the stored total up to date.
    pub fn items_total(&self) -> Result<Price, AmountError> {
        self.items
            .iter()
            .try_fold(Price::ZERO, |sum, i| sum.checked_add(i.item.value()?))
    }
}
