//! Cart snapshot taken at checkout time.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DomainError;
use crate::money::Money;

/// Catalog product identifier as the order service expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(u64);

impl ProductId {
    /// Creates a product ID from a known-good integer.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Parses the raw id carried on a cart line.
    ///
    /// Only positive integers are accepted; surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().parse::<u64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(DomainError::InvalidProductId {
                raw: raw.to_string(),
            }),
        }
    }

    /// Returns the numeric id.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single line of the cart as the storefront renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product id exactly as the cart API returned it.
    pub product_id: String,
    /// Unit price in minor units.
    pub unit_price: Money,
    /// Display title.
    pub title: String,
}

impl CartLine {
    /// Creates a new cart line.
    pub fn new(product_id: impl Into<String>, unit_price: Money, title: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            unit_price,
            title: title.into(),
        }
    }
}

/// SHA-256 digest of a cart's lines and subtotal.
///
/// Two snapshots share a fingerprint only if they list the same products at
/// the same prices in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartFingerprint(String);

impl CartFingerprint {
    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Immutable view of the cart at checkout time.
///
/// Owned by the caller; checkout only ever borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    lines: Vec<CartLine>,
    subtotal: Money,
}

impl CartSnapshot {
    /// Creates a snapshot whose subtotal is the sum of the line prices.
    ///
    /// Fails if the sum does not fit in minor units.
    pub fn new(lines: Vec<CartLine>) -> Result<Self, DomainError> {
        let subtotal = Money::checked_sum(lines.iter().map(|line| line.unit_price))?;
        Ok(Self { lines, subtotal })
    }

    /// Creates a snapshot with a subtotal reported by the cart service.
    pub fn with_subtotal(lines: Vec<CartLine>, subtotal: Money) -> Self {
        Self { lines, subtotal }
    }

    /// Returns the cart lines in display order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Returns the subtotal in minor units.
    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the number of lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Digests the cart contents.
    pub fn fingerprint(&self) -> CartFingerprint {
        let mut hasher = Sha256::new();
        for line in &self.lines {
            hasher.update(line.product_id.trim().as_bytes());
            hasher.update(b"|");
            hasher.update(line.unit_price.minor().to_be_bytes());
            hasher.update(b";");
        }
        hasher.update(self.subtotal.minor().to_be_bytes());
        CartFingerprint(format!("{:x}", hasher.finalize()))
    }

    /// Resolves every line to an integer product id, in cart order.
    ///
    /// Fails on the first line whose id does not parse; the result always has
    /// one entry per line.
    pub fn product_ids(&self) -> Result<Vec<ProductId>, DomainError> {
        self.lines
            .iter()
            .map(|line| ProductId::parse(&line.product_id))
            .collect()
    }
}
