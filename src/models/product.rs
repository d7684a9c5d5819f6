#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: Option<i64>,
    pub category_id: i64,
    pub producer_id: Option<i64>,
    pub name: String,
}

impl Product {
    pub fn new(name: String, category_id: i64, producer_id: Option<i64>) -> Self {
        Self {
            id: None,
            category_id,
            producer_id,
            name,
        }
    }
}

/// A variant such as "1L" or "organic". Without a product it is global and
/// may be picked for any product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub id: Option<i64>,
    pub product_id: Option<i64>,
    pub name: String,
}

impl Variant {
    pub fn new(name: String, product_id: Option<i64>) -> Self {
        Self {
            id: None,
            product_id,
            name,
        }
    }

    pub fn global(name: String) -> Self {
        Self::new(name, None)
    }

    pub fn is_global(&self) -> bool {
        self.product_id.is_none()
    }

    /// Whether this variant may be attached to an item of `product_id`.
    pub fn applies_to(&self, product_id: i64) -> bool {
        !matches!(self.product_id, Some(p) if p != product_id)
    }
}
