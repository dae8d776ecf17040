//! Hosted payment page flow.
//!
//! The customer is sent to a Helcim-hosted page with a POST form. Helcim only
//! supports static callback URLs, so the order id travels in a visitor cookie
//! and the static return/cancel routes resolve it back to the order's
//! checkout step.

use chrono::{DateTime, NaiveDateTime, Utc};
use commerce_helcim_types::{
    FormFields, GatewayConfig, Order, Payment, PaymentState, ReturnNotification,
};
use tracing::{info, warn};
use url::Url;

use crate::{
    error::{GatewayError, Result},
    services::{NoticeLevel, Services},
    trust,
};

/// Visitor cookie carrying the order id across the hosted page round trip
pub const ORDER_COOKIE: &str = "commerce_helcim_order_id";

const TRANSACTION_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Cookie change the caller must apply to the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieAction {
    Set { name: String, value: String },
    Clear { name: String },
}

/// Where a static callback route should send the customer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    /// The site front page
    Front,
    /// The order's checkout return step, with the posted fields forwarded
    CheckoutReturn { order_id: String, fields: FormFields },
    /// The order's checkout cancel step
    CheckoutCancel { order_id: String },
}

/// Return and cancel URLs of the current checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrls {
    pub return_url: Url,
    pub cancel_url: Url,
}

/// Auto-submitting POST form towards the hosted page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectForm {
    pub action: Url,
    pub fields: FormFields,
    pub cookie: CookieAction,
}

impl RedirectForm {
    pub const METHOD: &'static str = "post";
}

/// Static route hit by the hosted page after an approved payment
pub fn route_return(fields: &FormFields) -> RedirectTarget {
    match fields.get("orderId").map(|id| id.trim()) {
        Some(order_id) if !order_id.is_empty() => RedirectTarget::CheckoutReturn {
            order_id: order_id.to_string(),
            fields: fields.clone(),
        },
        _ => RedirectTarget::Front,
    }
}

/// Static route hit when the customer cancels on the hosted page
pub fn route_cancel(order_cookie: Option<&str>) -> RedirectTarget {
    match order_cookie.map(str::trim) {
        Some(order_id) if !order_id.is_empty() => RedirectTarget::CheckoutCancel {
            order_id: order_id.to_string(),
        },
        _ => RedirectTarget::Front,
    }
}

/// Off-site gateway posting to a Helcim hosted page
#[derive(Clone)]
pub struct HostedPage {
    config: GatewayConfig,
    services: Services,
}

impl HostedPage {
    pub fn new(config: GatewayConfig, services: Services) -> Self {
        Self { config, services }
    }

    pub fn display_label(&self) -> &str {
        &self.config.display_label
    }

    /// Build the form that sends the customer to the hosted page
    pub fn build_redirect_form(
        &self,
        payment: &Payment,
        order: &Order,
        urls: &CallbackUrls,
    ) -> Result<RedirectForm> {
        let action = self.config.hosted_page_url()?.clone();
        let billing = order.billing.clone().unwrap_or_default();

        let mut fields = FormFields::new();
        fields.insert("currency".into(), payment.amount.currency_code.clone());
        fields.insert("transactionType".into(), "purchase".into());
        fields.insert("amount".into(), payment.amount.number.to_string());
        fields.insert("orderId".into(), payment.order_id.clone());
        fields.insert("customerId".into(), order.customer_id.clone());
        fields.insert("billingcontactName".into(), billing.contact_name());
        fields.insert("billingstreet1".into(), billing.address_line1);
        fields.insert("billingstreet2".into(), billing.address_line2);
        fields.insert("billingpostalCode".into(), billing.postal_code);
        fields.insert("billingemail".into(), order.email.clone());
        fields.insert("return_url".into(), urls.return_url.to_string());
        fields.insert("cancel_url".into(), urls.cancel_url.to_string());
        if self.config.mode.is_test() {
            fields.insert("test".into(), "1".into());
        }

        Ok(RedirectForm {
            action,
            fields,
            cookie: CookieAction::Set {
                name: ORDER_COOKIE.to_string(),
                value: payment.order_id.clone(),
            },
        })
    }

    fn authorized_time(&self, notification: &ReturnNotification) -> DateTime<Utc> {
        let stamp = format!("{} {}", notification.date.trim(), notification.time.trim());
        TRANSACTION_DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(&stamp, format).ok())
            .map(|naive| naive.and_utc())
            .unwrap_or_else(|| {
                warn!(stamp = %stamp, "Unparseable Helcim transaction time, using current time");
                self.services.clock.now()
            })
    }

    /// Record the payment reported by an approved hosted page return.
    ///
    /// Refuses to record anything unless the amount hash matches the order.
    pub fn on_return(&self, order: &Order, notification: &ReturnNotification) -> Result<Payment> {
        info!(
            order_id = %order.id,
            approval_code = %notification.approval_code,
            response = %notification.response,
            "Helcim returned"
        );

        let reported_order_id = notification.order_id.trim();
        let order_matches = reported_order_id.is_empty() || reported_order_id == order.id;
        if !order_matches || !trust::is_trusted(&self.config, order, notification) {
            warn!(
                order_id = %order.id,
                reported_order_id = %notification.order_id,
                "Untrusted Helcim return notification refused"
            );
            return Err(GatewayError::Untrusted {
                order_id: order.id.clone(),
            });
        }

        self.services.notifier.notify(
            NoticeLevel::Status,
            &format!("You have returned from {}.", self.display_label()),
        );

        let mut payment = Payment::new(order.id.clone(), order.total_price.clone());
        payment.state = PaymentState::Authorization;
        payment.authorized_time = Some(self.authorized_time(notification));
        payment.remote_id = Some(notification.approval_code.clone());
        payment.remote_state = Some(notification.response.clone());
        payment.gateway_mode = Some(self.config.mode);
        self.services.payments.save(&mut payment)?;

        Ok(payment)
    }

    /// Customer came back from the hosted page without paying
    pub fn on_cancel(&self, order: &Order) -> CookieAction {
        info!(order_id = %order.id, "Helcim payment canceled");
        CookieAction::Clear {
            name: ORDER_COOKIE.to_string(),
        }
    }
}
