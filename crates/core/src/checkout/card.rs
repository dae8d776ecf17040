//! Card field checks run before tokenization.
//!
//! Raw card data only lives here long enough to be validated and handed to the
//! tokenizer; submissions to the gateway carry the token and a card summary.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

const MIN_CARD_NUMBER_LEN: usize = 13;
const MIN_CVV_LEN: usize = 3;
const MIN_HOLDER_NAME_LEN: usize = 2;

/// Number of years offered after the current one in the expiry selector
pub const EXPIRY_YEARS_AHEAD: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Unknown,
}

impl CardType {
    /// Guess the brand from the leading digits
    pub fn detect(number: &str) -> Self {
        let digits = digits_only(number);
        if digits.starts_with('4') {
            CardType::Visa
        } else if digits.starts_with("34") || digits.starts_with("37") {
            CardType::Amex
        } else if digits.starts_with('5') || digits.starts_with('2') {
            CardType::Mastercard
        } else if digits.starts_with('6') {
            CardType::Discover
        } else {
            CardType::Unknown
        }
    }

    pub fn max_cvv_len(&self) -> usize {
        match self {
            CardType::Amex => 4,
            _ => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Visa => "visa",
            CardType::Mastercard => "mastercard",
            CardType::Amex => "amex",
            CardType::Discover => "discover",
            CardType::Unknown => "",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Group a card number in blocks of four, as typed into the form
pub fn format_card_number(number: &str) -> String {
    digits_only(number)
        .chars()
        .collect::<Vec<_>>()
        .chunks(4)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Card fields as entered by the customer
#[derive(Clone, PartialEq, Eq)]
pub struct CardDetails {
    pub number: String,
    pub exp_month: Option<u32>,
    pub exp_year: Option<i32>,
    pub cvv: String,
    pub holder_name: String,
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("last4", &self.last4())
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .finish_non_exhaustive()
    }
}

impl CardDetails {
    pub fn card_type(&self) -> CardType {
        CardType::detect(&self.number)
    }

    pub fn last4(&self) -> String {
        let digits: Vec<char> = digits_only(&self.number).chars().collect();
        digits[digits.len().saturating_sub(4)..].iter().collect()
    }

    /// Check every field, collecting all problems into one
    /// [`GatewayError::InvalidCard`].
    ///
    /// A card is valid through the last day of its expiry month.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        let mut errors = Vec::new();

        let number = digits_only(&self.number);
        if number.len() < MIN_CARD_NUMBER_LEN || !number.chars().all(|c| c.is_ascii_digit()) {
            errors.push("Please enter a valid card number.".to_string());
        }

        match (self.exp_month, self.exp_year) {
            (Some(month), Some(year)) if (1..=12).contains(&month) => {
                if (year, month) < (today.year(), today.month()) {
                    errors.push("Card has expired.".to_string());
                }
            }
            _ => errors.push("Please select expiry month and year.".to_string()),
        }

        let cvv = self.cvv.trim();
        let max_cvv = self.card_type().max_cvv_len();
        if cvv.len() < MIN_CVV_LEN
            || cvv.len() > max_cvv
            || !cvv.chars().all(|c| c.is_ascii_digit())
        {
            errors.push("Please enter a valid CVV.".to_string());
        }

        if self.holder_name.trim().chars().count() < MIN_HOLDER_NAME_LEN {
            errors.push("Please enter the cardholder name.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::InvalidCard(errors))
        }
    }
}

/// Expiry month choices, "01" to "12"
pub fn month_options() -> Vec<String> {
    (1..=12).map(|m| format!("{:02}", m)).collect()
}

/// Expiry year choices from the current year on
pub fn year_options(current_year: i32) -> Vec<i32> {
    (current_year..=current_year + EXPIRY_YEARS_AHEAD).collect()
}
