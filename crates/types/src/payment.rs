use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GatewayMode, Price, PriceError};

/// Local payment state, mirroring the commerce payment workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    New,
    Authorization,
    Completed,
    PartiallyRefunded,
    Refunded,
    AuthorizationVoided,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::New => "new",
            PaymentState::Authorization => "authorization",
            PaymentState::Completed => "completed",
            PaymentState::PartiallyRefunded => "partially_refunded",
            PaymentState::Refunded => "refunded",
            PaymentState::AuthorizationVoided => "authorization_voided",
        }
    }

    /// No further transition is possible from a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentState::Refunded | PaymentState::AuthorizationVoided
        )
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment recorded against an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Storage identifier, assigned on first save
    pub id: Option<u64>,

    pub order_id: String,

    pub amount: Price,

    pub state: PaymentState,

    /// Checkout token before processing, processor transaction id afterwards
    pub remote_id: Option<String>,

    /// Status string last reported by the processor
    pub remote_state: Option<String>,

    pub refunded_amount: Price,

    pub authorized_time: Option<DateTime<Utc>>,

    pub captured_time: Option<DateTime<Utc>>,

    /// Gateway mode the payment was taken in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_mode: Option<GatewayMode>,
}

impl Payment {
    /// A new, unsaved payment for the full `amount` of an order
    pub fn new(order_id: impl Into<String>, amount: Price) -> Self {
        let refunded_amount = Price::zero(amount.currency_code.clone());
        Self {
            id: None,
            order_id: order_id.into(),
            amount,
            state: PaymentState::New,
            remote_id: None,
            remote_state: None,
            refunded_amount,
            authorized_time: None,
            captured_time: None,
            gateway_mode: None,
        }
    }

    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    /// Amount still available for refund
    pub fn balance(&self) -> Result<Price, PriceError> {
        self.amount.subtract(&self.refunded_amount)
    }
}
