#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color_ordinal: i64,
}

/// The reserved parent tags created when the shop/product columns are folded
/// into the tag graph. Each one owns a stable id below the autoincrement range
/// used for ordinary tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemTag {
    Shop,
    Variant,
    Producer,
    Product,
    Category,
}

impl SystemTag {
    pub fn id(self) -> i64 {
        match self {
            Self::Shop => 9999,
            Self::Variant => 9998,
            Self::Producer => 9997,
            Self::Product => 9996,
            Self::Category => 9995,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shop => "SHOP",
            Self::Variant => "VARIANT",
            Self::Producer => "PRODUCER",
            Self::Product => "PRODUCT",
            Self::Category => "CATEGORY",
        }
    }

    pub fn color_ordinal(self) -> i64 {
        match self {
            Self::Shop => 1,
            Self::Variant => 2,
            Self::Producer => 3,
            Self::Product => 4,
            Self::Category => 5,
        }
    }

    pub fn all() -> &'static [SystemTag] {
        &[
            Self::Shop,
            Self::Variant,
            Self::Producer,
            Self::Product,
            Self::Category,
        ]
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.id() == id)
    }
}

impl std::fmt::Display for SystemTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
