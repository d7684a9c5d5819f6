mod category;
mod money;
mod name;
mod product;
mod shop;
mod tag;
mod transaction;

pub use category::Category;
pub use money::{line_value, AmountError, Price, Quantity, PRICE_SCALE, QUANTITY_SCALE};
pub use name::{normalize_name, normalize_note};
pub use product::{Product, Variant};
pub use shop::{Producer, Shop};
pub use tag::{SystemTag, Tag};
pub use transaction::{Item, ItemDetails, Transaction, TransactionDetails};

#[cfg(test)]
mod tests;
