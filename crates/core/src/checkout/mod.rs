//! Card checkout through the Helcim tokenizer.
//!
//! The browser exchanges card fields for a single-use token; only that token
//! and a card summary reach the server. [`CheckoutForm::submit`] turns the
//! token into a processed payment.

use commerce_helcim_types::{FormFields, Order, Payment};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{GatewayError, Result},
    gateway::HelcimGateway,
    services::NoticeLevel,
};

pub mod card;
#[cfg(feature = "mock-tokens")]
pub mod mock;

pub use card::{CardDetails, CardType};
#[cfg(feature = "mock-tokens")]
pub use mock::MockToken;

/// Prefix marking tokens generated without the tokenizer
pub const MOCK_TOKEN_PREFIX: &str = "test_token_";

/// Token attached to a checkout submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutToken {
    /// Issued by the Helcim tokenizer
    Provider(String),
    #[cfg(feature = "mock-tokens")]
    Mock(MockToken),
}

#[cfg(feature = "mock-tokens")]
fn mock_token(value: &str) -> Result<CheckoutToken> {
    Ok(CheckoutToken::Mock(MockToken::from_submitted(value)))
}

#[cfg(not(feature = "mock-tokens"))]
fn mock_token(_value: &str) -> Result<CheckoutToken> {
    Err(GatewayError::MockTokenRejected)
}

impl CheckoutToken {
    /// Classify a submitted token.
    ///
    /// Builds without `mock-tokens` reject mock tokens here, before any
    /// processing.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(GatewayError::MissingToken);
        }
        if value.starts_with(MOCK_TOKEN_PREFIX) {
            return mock_token(value);
        }
        Ok(CheckoutToken::Provider(value.to_string()))
    }
}

/// Settings handed to the client-side tokenizer script
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenizerSettings {
    /// Passed to the tokenizer's `configure({token, test})`
    pub token: String,
    pub test: bool,
    pub amount: Decimal,
    pub currency: String,
}

/// Fields posted by the checkout form once tokenization succeeded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutSubmission {
    pub helcim_token: String,
    pub card_type: Option<String>,
    pub last4: Option<String>,
    pub exp_month: Option<String>,
    pub exp_year: Option<String>,
}

impl CheckoutSubmission {
    pub fn from_form(fields: &FormFields) -> Self {
        let optional = |key: &str| fields.get(key).filter(|v| !v.is_empty()).cloned();
        Self {
            helcim_token: fields.get("helcim_token").cloned().unwrap_or_default(),
            card_type: optional("card_type"),
            last4: optional("last4"),
            exp_month: optional("exp_month"),
            exp_year: optional("exp_year"),
        }
    }
}

/// Reusable card saved from an add-payment-method submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub remote_id: String,
    pub card_type: Option<String>,
    pub last4: Option<String>,
    pub exp_month: Option<String>,
    pub exp_year: Option<String>,
}

/// Checkout form adapter bound to a gateway
pub struct CheckoutForm<'a> {
    gateway: &'a HelcimGateway,
}

impl<'a> CheckoutForm<'a> {
    pub fn new(gateway: &'a HelcimGateway) -> Self {
        Self { gateway }
    }

    /// Whether this build and gateway accept mock tokens
    pub fn mock_tokens_enabled(&self) -> bool {
        cfg!(feature = "mock-tokens") && self.gateway.config().mode.is_test()
    }

    pub fn tokenizer_settings(&self, payment: &Payment) -> TokenizerSettings {
        let config = self.gateway.config();
        TokenizerSettings {
            token: config.secret_key.clone(),
            test: config.mode.is_test(),
            amount: payment.amount.number,
            currency: payment.amount.currency_code.clone(),
        }
    }

    /// Process the payment with the submitted token, capturing immediately
    pub async fn submit(
        &self,
        payment: &mut Payment,
        order: &Order,
        submission: &CheckoutSubmission,
    ) -> Result<()> {
        let result = self.process(payment, order, submission).await;
        if let Err(err) = &result {
            self.notify(NoticeLevel::Error, &err.user_message());
        }
        result
    }

    async fn process(
        &self,
        payment: &mut Payment,
        order: &Order,
        submission: &CheckoutSubmission,
    ) -> Result<()> {
        match CheckoutToken::parse(&submission.helcim_token)? {
            CheckoutToken::Provider(token) => {
                let mut pending = payment.clone();
                pending.remote_id = Some(token);
                self.gateway.create_payment(&mut pending, order, true).await?;
                *payment = pending;
                self.notify(NoticeLevel::Status, "Payment processed successfully.");
                Ok(())
            }
            #[cfg(feature = "mock-tokens")]
            CheckoutToken::Mock(token) => self.complete_with_mock(payment, token),
        }
    }

    #[cfg(feature = "mock-tokens")]
    fn complete_with_mock(&self, payment: &mut Payment, token: MockToken) -> Result<()> {
        use commerce_helcim_types::PaymentState;

        use crate::error::Operation;

        if !self.mock_tokens_enabled() {
            tracing::warn!(
                order_id = %payment.order_id,
                "Mock checkout token refused outside test mode"
            );
            return Err(GatewayError::MockTokenRejected);
        }
        if payment.state != PaymentState::New {
            return Err(GatewayError::wrong_state(
                Operation::Process,
                payment.state,
                &[PaymentState::New],
            ));
        }

        let services = self.gateway.services();
        let now = services.clock.now();
        let mut updated = payment.clone();
        updated.state = PaymentState::Completed;
        updated.remote_id = Some(token.as_str().to_string());
        updated.remote_state = Some("APPROVED".to_string());
        updated.authorized_time = Some(now);
        updated.captured_time = Some(now);
        updated.gateway_mode = Some(self.gateway.config().mode);
        services.payments.save(&mut updated)?;
        *payment = updated;

        tracing::info!(payment_id = ?payment.id, "Payment completed with mock token");
        self.notify(NoticeLevel::Status, "Payment completed successfully (Test Mode).");
        Ok(())
    }

    /// Turn an add-payment-method submission into a stored card
    pub fn payment_method(&self, submission: &CheckoutSubmission) -> Result<PaymentMethod> {
        let remote_id = match CheckoutToken::parse(&submission.helcim_token)? {
            CheckoutToken::Provider(token) => token,
            #[cfg(feature = "mock-tokens")]
            CheckoutToken::Mock(token) => {
                if !self.mock_tokens_enabled() {
                    return Err(GatewayError::MockTokenRejected);
                }
                token.as_str().to_string()
            }
        };
        Ok(PaymentMethod {
            remote_id,
            card_type: submission.card_type.clone(),
            last4: submission.last4.clone(),
            exp_month: submission.exp_month.clone(),
            exp_year: submission.exp_year.clone(),
        })
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        self.gateway.services().notifier.notify(level, message);
    }
}
