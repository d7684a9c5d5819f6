//! Typed outcomes of store writes.
//!
//! Inserts and updates report validation problems as values so callers can
//! map each variant to a field message. Storage failures share the same enum
//! through the `Storage` variant.

use thiserror::Error;

use crate::models::AmountError;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("name must not be blank")]
    BlankName,

    #[error("'{0}' already exists")]
    DuplicateName(String),

    #[error("{entity} {id} does not exist")]
    MissingReference { entity: &'static str, id: i64 },

    #[error("variant {variant_id} cannot be used with product {product_id}")]
    VariantMismatch { variant_id: i64, product_id: i64 },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

/// What a guarded delete would take down with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dependents {
    pub products: usize,
    pub variants: usize,
    pub items: usize,
}

impl Dependents {
    pub fn is_empty(&self) -> bool {
        self.products == 0 && self.variants == 0 && self.items == 0
    }
}

impl std::fmt::Display for Dependents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} products, {} variants, {} items",
            self.products, self.variants, self.items
        )
    }
}

#[derive(Error, Debug)]
pub enum DeleteError {
    #[error("{entity} {id} is still referenced by {dependents}; force the delete to remove them")]
    Dangerous {
        entity: &'static str,
        id: i64,
        dependents: Dependents,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
