use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod helcim;
pub mod order;
pub mod payment;

pub use config::{ConfigError, GatewayConfig, GatewayMode};
pub use helcim::{RemoteStatus, RemoteTransaction, ReturnNotification};
pub use order::{BillingAddress, Order};
pub use payment::{Payment, PaymentState};

/// Name of the manifest file holding gateway configurations
pub const MANIFEST_FILE_NAME: &str = "helcim.yaml";

/// Ordered form fields, as posted to or received from the hosted page
pub type FormFields = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    #[error("Currency mismatch: {0} and {1}")]
    CurrencyMismatch(String, String),
    #[error("Invalid amount '{0}'")]
    InvalidNumber(String),
}

/// A decimal amount in a given currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// The decimal amount, serialized as a string (e.g. "19.99")
    pub number: Decimal,

    /// Three-letter ISO currency code (e.g. "USD")
    pub currency_code: String,
}

impl Price {
    pub fn new(number: Decimal, currency_code: impl Into<String>) -> Self {
        Self {
            number,
            currency_code: currency_code.into(),
        }
    }

    /// Parse a price from its string amount, e.g. `Price::parse("19.99", "USD")`
    pub fn parse(number: &str, currency_code: impl Into<String>) -> Result<Self, PriceError> {
        let number = Decimal::from_str(number.trim())
            .map_err(|_| PriceError::InvalidNumber(number.to_string()))?;
        Ok(Self::new(number, currency_code))
    }

    /// A zero amount in the given currency
    pub fn zero(currency_code: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    pub fn is_zero(&self) -> bool {
        self.number.is_zero()
    }

    fn ensure_same_currency(&self, other: &Price) -> Result<(), PriceError> {
        if self.currency_code != other.currency_code {
            return Err(PriceError::CurrencyMismatch(
                self.currency_code.clone(),
                other.currency_code.clone(),
            ));
        }
        Ok(())
    }

    pub fn add(&self, other: &Price) -> Result<Price, PriceError> {
        self.ensure_same_currency(other)?;
        Ok(Price::new(self.number + other.number, &self.currency_code))
    }

    pub fn subtract(&self, other: &Price) -> Result<Price, PriceError> {
        self.ensure_same_currency(other)?;
        Ok(Price::new(self.number - other.number, &self.currency_code))
    }

    pub fn less_than(&self, other: &Price) -> Result<bool, PriceError> {
        self.ensure_same_currency(other)?;
        Ok(self.number < other.number)
    }

    pub fn greater_than(&self, other: &Price) -> Result<bool, PriceError> {
        self.ensure_same_currency(other)?;
        Ok(self.number > other.number)
    }

    /// The amount with exactly two decimals, half-up rounded ("19.90", "5.00")
    pub fn to_fixed2(&self) -> String {
        let rounded = self
            .number
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format!("{:.2}", rounded)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_fixed2(), self.currency_code)
    }
}
