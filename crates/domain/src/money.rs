//! Monetary amounts in minor currency units and gateway sub-unit scaling.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Money amount in the storefront's minor currency unit.
///
/// Integral by construction; all pricing arithmetic stays in this unit and
/// only [`Money::to_gateway_subunits`] leaves it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money {
    minor: i64,
}

impl Money {
    /// Creates a money amount from minor units.
    pub fn from_minor(minor: i64) -> Self {
        Self { minor }
    }

    /// Creates a money amount, rejecting negative values.
    pub fn try_from_minor(minor: i64) -> Result<Self, DomainError> {
        if minor < 0 {
            return Err(DomainError::NegativeAmount { amount: minor });
        }
        Ok(Self { minor })
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { minor: 0 }
    }

    /// Returns the amount in minor units.
    pub fn minor(&self) -> i64 {
        self.minor
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Returns `max(0, self - discount)`.
    ///
    /// This is the only way a payable total is derived from a subtotal.
    pub fn less_discount(&self, discount: Money) -> Money {
        Money {
            minor: self.minor.saturating_sub(discount.minor).max(0),
        }
    }

    /// Clamps a discount into `[0, self]`.
    pub fn clamp_discount(&self, discount: Money) -> Money {
        Money {
            minor: discount.minor.clamp(0, self.minor.max(0)),
        }
    }

    /// Adds two amounts, reporting overflow instead of wrapping.
    pub fn checked_add(&self, other: Money) -> Result<Money, DomainError> {
        self.minor
            .checked_add(other.minor)
            .map(Money::from_minor)
            .ok_or(DomainError::SumOverflow {
                left: self.minor,
                right: other.minor,
            })
    }

    /// Sums amounts with [`Money::checked_add`].
    pub fn checked_sum<I>(amounts: I) -> Result<Money, DomainError>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }

    /// Converts to the sub-unit the gateway charges in.
    ///
    /// Uses checked multiplication; an overflow is reported, never wrapped.
    pub fn to_gateway_subunits(&self, currency: Currency) -> Result<i64, DomainError> {
        let multiplier = currency.subunit_multiplier();
        self.minor
            .checked_mul(multiplier)
            .ok_or(DomainError::AmountOverflow {
                amount: self.minor,
                multiplier,
            })
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.minor)
    }
}

/// Currencies the payment gateway accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Inr,
    Usd,
    Eur,
}

impl Currency {
    /// Multiplier from the storefront minor unit to the gateway sub-unit.
    ///
    /// Fixed at 100 for every supported currency. Adding a currency with a
    /// different exponent means adding a row here, not changing callers.
    pub fn subunit_multiplier(&self) -> i64 {
        match self {
            Currency::Inr | Currency::Usd | Currency::Eur => 100,
        }
    }

    /// Returns the ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Inr => "INR",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Currency::Inr),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            _ => Err(DomainError::UnsupportedCurrency {
                code: s.to_string(),
            }),
        }
    }
}
