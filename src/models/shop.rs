#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shop {
    pub id: Option<i64>,
    pub name: String,
}

impl Shop {
    pub fn new(name: String) -> Self {
        Self { id: None, name }
    }
}

impl std::fmt::Display for Shop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Manufacturer or brand of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Producer {
    pub id: Option<i64>,
    pub name: String,
}

impl Producer {
    pub fn new(name: String) -> Self {
        Self { id: None, name }
    }
}

impl std::fmt::Display for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
