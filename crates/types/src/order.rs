use serde::{Deserialize, Serialize};

use crate::Price;

/// Billing address fields sent to the hosted page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingAddress {
    pub given_name: String,
    pub family_name: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: String,
    pub postal_code: String,
}

impl BillingAddress {
    pub fn contact_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
            .trim()
            .to_string()
    }
}

/// The order a payment is taken for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub email: String,
    pub total_price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing: Option<BillingAddress>,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        customer_id: impl Into<String>,
        email: impl Into<String>,
        total_price: Price,
    ) -> Self {
        Self {
            id: id.into(),
            customer_id: customer_id.into(),
            email: email.into(),
            total_price,
            billing: None,
        }
    }

    pub fn with_billing(mut self, billing: BillingAddress) -> Self {
        self.billing = Some(billing);
        self
    }
}
