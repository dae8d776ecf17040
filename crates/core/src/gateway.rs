//! Payment state reconciliation against the Helcim processor.
//!
//! Each operation checks the local payment state first, calls the processor
//! once, and only on an `APPROVED` answer applies and persists the new state:
//!
//! | Operation | From | To |
//! |---|---|---|
//! | [`create_payment`](HelcimGateway::create_payment) (capture) | new | completed |
//! | [`create_payment`](HelcimGateway::create_payment) (authorize) | new | authorization |
//! | [`capture_payment`](HelcimGateway::capture_payment) | authorization | completed |
//! | [`void_payment`](HelcimGateway::void_payment) | authorization | authorization_voided |
//! | [`refund_payment`](HelcimGateway::refund_payment) | completed, partially_refunded | partially_refunded, refunded |

use std::sync::Arc;

use commerce_helcim_driver::{
    CaptureRequest, ProcessRequest, ProcessorApi, RefundRequest, TransactionType, VoidRequest,
};
use commerce_helcim_types::{
    GatewayConfig, Order, Payment, PaymentState, Price, RemoteTransaction,
};
use tracing::{debug, error, info, warn};

use crate::{
    error::{GatewayError, Operation, Result},
    services::Services,
};

/// Helcim card gateway bound to one configuration
#[derive(Clone)]
pub struct HelcimGateway {
    config: GatewayConfig,
    processor: Arc<dyn ProcessorApi>,
    services: Services,
}

impl HelcimGateway {
    pub fn new(
        config: GatewayConfig,
        processor: Arc<dyn ProcessorApi>,
        services: Services,
    ) -> Self {
        Self {
            config,
            processor,
            services,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn display_label(&self) -> &str {
        &self.config.display_label
    }

    fn assert_state(
        &self,
        payment: &Payment,
        operation: Operation,
        allowed: &[PaymentState],
    ) -> Result<()> {
        if allowed.contains(&payment.state) {
            return Ok(());
        }
        let err = GatewayError::wrong_state(operation, payment.state, allowed);
        error!(payment_id = ?payment.id, "{}", err);
        Err(err)
    }

    fn remote_transaction_id(&self, payment: &Payment, operation: Operation) -> Result<String> {
        match payment.remote_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => {
                let err =
                    GatewayError::precondition(operation, "payment has no remote transaction id");
                error!(payment_id = ?payment.id, "{}", err);
                Err(err)
            }
        }
    }

    fn same_currency(&self, payment: &Payment, amount: &Price, operation: Operation) -> Result<()> {
        if payment.amount.currency_code != amount.currency_code {
            return Err(GatewayError::precondition(
                operation,
                format!(
                    "amount currency {} does not match payment currency {}",
                    amount.currency_code, payment.amount.currency_code
                ),
            ));
        }
        Ok(())
    }

    async fn call<F>(
        &self,
        operation: Operation,
        payment: &Payment,
        fut: F,
    ) -> Result<RemoteTransaction>
    where
        F: std::future::Future<Output = commerce_helcim_driver::Result<RemoteTransaction>>,
    {
        fut.await.map_err(|e| {
            error!(
                operation = %operation,
                payment_id = ?payment.id,
                order_id = %payment.order_id,
                "Helcim {} failed: {}",
                operation,
                e
            );
            GatewayError::from(e)
        })
    }

    fn approved_or_decline(
        &self,
        operation: Operation,
        response: &RemoteTransaction,
        default_message: &str,
    ) -> Result<()> {
        if response.status.is_approved() {
            return Ok(());
        }
        let message = response
            .message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_message.to_string());
        warn!(operation = %operation, status = %response.status, "Helcim declined: {}", message);
        Err(GatewayError::Declined { operation, message })
    }

    /// Persist `updated` and only then replace the caller's copy
    fn commit(&self, payment: &mut Payment, mut updated: Payment) -> Result<()> {
        self.services.payments.save(&mut updated)?;
        *payment = updated;
        Ok(())
    }

    /// Charge the checkout token stored in the payment's remote id.
    ///
    /// With `capture` the payment is authorized and captured at once
    /// (`completed`), otherwise it is only authorized (`authorization`).
    pub async fn create_payment(
        &self,
        payment: &mut Payment,
        order: &Order,
        capture: bool,
    ) -> Result<()> {
        self.assert_state(payment, Operation::Process, &[PaymentState::New])?;
        if order.id != payment.order_id {
            return Err(GatewayError::precondition(
                Operation::Process,
                format!(
                    "payment belongs to order {}, not {}",
                    payment.order_id, order.id
                ),
            ));
        }

        let token = match payment.remote_id.as_deref() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => return Err(GatewayError::MissingToken),
        };

        let request = ProcessRequest {
            token,
            amount: payment.amount.number,
            currency: payment.amount.currency_code.clone(),
            transaction_type: if capture {
                TransactionType::Purchase
            } else {
                TransactionType::Preauth
            },
            order_id: order.id.clone(),
            customer_code: order.customer_id.clone(),
        };
        debug!(order_id = %order.id, capture, "Processing Helcim payment");

        let response = self
            .call(
                Operation::Process,
                payment,
                self.processor.process_payment(&request, &self.config),
            )
            .await?;
        self.approved_or_decline(Operation::Process, &response, "Payment was declined.")?;

        let transaction_id = response.transaction_id.clone().ok_or_else(|| {
            GatewayError::Decode("approved response without transactionId".to_string())
        })?;

        let now = self.services.clock.now();
        let mut updated = payment.clone();
        updated.state = if capture {
            PaymentState::Completed
        } else {
            PaymentState::Authorization
        };
        updated.remote_id = Some(transaction_id);
        updated.remote_state = Some(response.status.to_string());
        updated.authorized_time = Some(now);
        if capture {
            updated.captured_time = Some(now);
        }
        updated.gateway_mode = Some(self.config.mode);
        self.commit(payment, updated)?;

        info!(
            payment_id = ?payment.id,
            order_id = %payment.order_id,
            state = %payment.state,
            "Helcim payment processed"
        );
        Ok(())
    }

    /// Capture an authorized payment, for its full amount unless `amount` is given.
    ///
    /// A given amount must be positive and no more than the authorized amount.
    pub async fn capture_payment(
        &self,
        payment: &mut Payment,
        amount: Option<Price>,
    ) -> Result<()> {
        self.assert_state(payment, Operation::Capture, &[PaymentState::Authorization])?;
        let amount = amount.unwrap_or_else(|| payment.amount.clone());
        self.same_currency(payment, &amount, Operation::Capture)?;
        if amount.number.is_sign_negative() || amount.is_zero() {
            return Err(GatewayError::precondition(
                Operation::Capture,
                format!("capture amount {} must be positive", amount),
            ));
        }
        if amount.greater_than(&payment.amount)? {
            return Err(GatewayError::precondition(
                Operation::Capture,
                format!(
                    "capture amount {} exceeds authorized amount {}",
                    amount, payment.amount
                ),
            ));
        }
        let transaction_id = self.remote_transaction_id(payment, Operation::Capture)?;

        let request = CaptureRequest {
            transaction_id,
            amount: amount.number,
        };
        let response = self
            .call(
                Operation::Capture,
                payment,
                self.processor.capture_payment(&request, &self.config),
            )
            .await?;
        self.approved_or_decline(Operation::Capture, &response, "Capture failed.")?;

        let mut updated = payment.clone();
        updated.state = PaymentState::Completed;
        updated.amount = amount;
        updated.captured_time = Some(self.services.clock.now());
        updated.remote_state = Some(response.status.to_string());
        self.commit(payment, updated)?;

        info!(payment_id = ?payment.id, amount = %payment.amount, "Helcim payment captured");
        Ok(())
    }

    /// Release an authorization without capturing it
    pub async fn void_payment(&self, payment: &mut Payment) -> Result<()> {
        self.assert_state(payment, Operation::Void, &[PaymentState::Authorization])?;
        let transaction_id = self.remote_transaction_id(payment, Operation::Void)?;

        let request = VoidRequest { transaction_id };
        let response = self
            .call(
                Operation::Void,
                payment,
                self.processor.void_payment(&request, &self.config),
            )
            .await?;
        self.approved_or_decline(Operation::Void, &response, "Void failed.")?;

        let mut updated = payment.clone();
        updated.state = PaymentState::AuthorizationVoided;
        updated.remote_state = Some(response.status.to_string());
        self.commit(payment, updated)?;

        info!(payment_id = ?payment.id, "Helcim authorization voided");
        Ok(())
    }

    /// Refund a captured payment, for its remaining balance unless `amount` is given.
    ///
    /// The refund may not exceed the remaining balance; once the refunded total
    /// reaches the payment amount the payment is `refunded`.
    pub async fn refund_payment(&self, payment: &mut Payment, amount: Option<Price>) -> Result<()> {
        self.assert_state(
            payment,
            Operation::Refund,
            &[PaymentState::Completed, PaymentState::PartiallyRefunded],
        )?;
        let balance = payment.balance()?;
        let amount = amount.unwrap_or_else(|| balance.clone());
        self.same_currency(payment, &amount, Operation::Refund)?;
        if amount.number.is_sign_negative() || amount.is_zero() {
            return Err(GatewayError::precondition(
                Operation::Refund,
                format!("refund amount {} must be positive", amount),
            ));
        }
        if amount.greater_than(&balance)? {
            return Err(GatewayError::precondition(
                Operation::Refund,
                format!("refund amount {} exceeds remaining balance {}", amount, balance),
            ));
        }
        let transaction_id = self.remote_transaction_id(payment, Operation::Refund)?;

        let request = RefundRequest {
            transaction_id,
            amount: amount.number,
        };
        let response = self
            .call(
                Operation::Refund,
                payment,
                self.processor.refund_payment(&request, &self.config),
            )
            .await?;
        self.approved_or_decline(Operation::Refund, &response, "Refund failed.")?;

        let refunded_amount = payment.refunded_amount.add(&amount)?;
        let mut updated = payment.clone();
        updated.state = if refunded_amount.less_than(&payment.amount)? {
            PaymentState::PartiallyRefunded
        } else {
            PaymentState::Refunded
        };
        updated.refunded_amount = refunded_amount;
        self.commit(payment, updated)?;

        info!(
            payment_id = ?payment.id,
            refunded = %payment.refunded_amount,
            state = %payment.state,
            "Helcim payment refunded"
        );
        Ok(())
    }

    /// Record the processor's current status of the payment's transaction.
    ///
    /// The local state is left alone; only `remote_state` is updated.
    pub async fn refresh_remote_state(&self, payment: &mut Payment) -> Result<RemoteTransaction> {
        if payment.state == PaymentState::New {
            return Err(GatewayError::precondition(
                Operation::Refresh,
                "payment has not been processed yet",
            ));
        }
        let transaction_id = self.remote_transaction_id(payment, Operation::Refresh)?;

        let response = self
            .call(
                Operation::Refresh,
                payment,
                self.processor.get_transaction(&transaction_id, &self.config),
            )
            .await?;

        if payment.remote_state.as_deref() != Some(response.status.as_str()) {
            let mut updated = payment.clone();
            updated.remote_state = Some(response.status.to_string());
            self.commit(payment, updated)?;
            debug!(
                payment_id = ?payment.id,
                remote_state = %response.status,
                "Remote state updated"
            );
        }
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use commerce_helcim_driver::{ApiError, Result as ApiResult};
    use commerce_helcim_types::{GatewayMode, RemoteStatus};
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        repository::{InMemoryPaymentRepository, PaymentRepository, RepositoryError},
        services::FixedClock,
    };

    /// Recorded processor call: endpoint name and JSON body
    pub(crate) type Call = (&'static str, serde_json::Value);

    /// Processor double answering from a queue of canned responses
    #[derive(Default)]
    pub(crate) struct FakeProcessor {
        responses: Mutex<VecDeque<ApiResult<RemoteTransaction>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeProcessor {
        pub(crate) fn respond(&self, response: ApiResult<RemoteTransaction>) -> &Self {
            self.responses.lock().push_back(response);
            self
        }

        pub(crate) fn approve(&self, transaction_id: &str) -> &Self {
            self.respond(Ok(RemoteTransaction {
                status: RemoteStatus::Approved,
                transaction_id: Some(transaction_id.to_string()),
                message: None,
            }))
        }

        pub(crate) fn decline(&self, message: Option<&str>) -> &Self {
            self.respond(Ok(RemoteTransaction {
                status: RemoteStatus::Declined,
                transaction_id: None,
                message: message.map(str::to_string),
            }))
        }

        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn answer(
            &self,
            endpoint: &'static str,
            body: serde_json::Value,
        ) -> ApiResult<RemoteTransaction> {
            self.calls.lock().push((endpoint, body));
            self.responses
                .lock()
                .pop_front()
                .expect("unexpected processor call")
        }
    }

    #[async_trait]
    impl ProcessorApi for FakeProcessor {
        async fn process_payment(
            &self,
            request: &ProcessRequest,
            _config: &GatewayConfig,
        ) -> ApiResult<RemoteTransaction> {
            self.answer("process", serde_json::to_value(request).unwrap())
        }

        async fn capture_payment(
            &self,
            request: &CaptureRequest,
            _config: &GatewayConfig,
        ) -> ApiResult<RemoteTransaction> {
            self.answer("capture", serde_json::to_value(request).unwrap())
        }

        async fn void_payment(
            &self,
            request: &VoidRequest,
            _config: &GatewayConfig,
        ) -> ApiResult<RemoteTransaction> {
            self.answer("void", serde_json::to_value(request).unwrap())
        }

        async fn refund_payment(
            &self,
            request: &RefundRequest,
            _config: &GatewayConfig,
        ) -> ApiResult<RemoteTransaction> {
            self.answer("refund", serde_json::to_value(request).unwrap())
        }

        async fn get_transaction(
            &self,
            transaction_id: &str,
            _config: &GatewayConfig,
        ) -> ApiResult<RemoteTransaction> {
            self.answer("get", serde_json::json!({ "transactionId": transaction_id }))
        }
    }

    pub(crate) fn test_config() -> GatewayConfig {
        GatewayConfig::new(
            GatewayMode::Test,
            "aB3dE5gH7jK9",
            "s3cr3t-key-with-twenty-chars",
        )
    }

    pub(crate) fn frozen_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap()
    }

    pub(crate) struct Harness {
        pub processor: Arc<FakeProcessor>,
        pub payments: Arc<InMemoryPaymentRepository>,
        pub gateway: HelcimGateway,
    }

    pub(crate) fn harness(config: GatewayConfig) -> Harness {
        let processor = Arc::new(FakeProcessor::default());
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let services =
            Services::new(payments.clone()).with_clock(Arc::new(FixedClock(frozen_now())));
        let gateway = HelcimGateway::new(config, processor.clone(), services);
        Harness {
            processor,
            payments,
            gateway,
        }
    }

    pub(crate) fn order(total: &str) -> Order {
        Order::new("42", "7", "buyer@example.com", Price::parse(total, "USD").unwrap())
    }

    fn usd(amount: &str) -> Price {
        Price::parse(amount, "USD").unwrap()
    }

    fn payment_in(state: PaymentState, amount: &str) -> Payment {
        let mut payment = Payment::new("42", usd(amount)).with_remote_id("20163175");
        payment.state = state;
        payment
    }

    #[tokio::test]
    async fn test_purchase_completes_new_payment() {
        let h = harness(test_config());
        h.processor.approve("20163175");
        let mut payment = Payment::new("42", usd("19.99")).with_remote_id("tok_abc");

        h.gateway
            .create_payment(&mut payment, &order("19.99"), true)
            .await
            .unwrap();

        assert_eq!(payment.state, PaymentState::Completed);
        assert_eq!(payment.remote_id.as_deref(), Some("20163175"));
        assert_eq!(payment.remote_state.as_deref(), Some("APPROVED"));
        assert_eq!(payment.authorized_time, Some(frozen_now()));
        assert_eq!(payment.captured_time, Some(frozen_now()));
        assert_eq!(payment.gateway_mode, Some(GatewayMode::Test));
        assert_eq!(h.payments.load(payment.id.unwrap()).unwrap(), payment);

        let calls = h.processor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "process");
        assert_eq!(
            calls[0].1,
            serde_json::json!({
                "token": "tok_abc",
                "amount": "19.99",
                "currency": "USD",
                "type": "purchase",
                "orderId": "42",
                "customerCode": "7",
            })
        );
    }

    #[tokio::test]
    async fn test_preauth_leaves_payment_authorized() {
        let h = harness(test_config());
        h.processor.approve("20163175");
        let mut payment = Payment::new("42", usd("19.99")).with_remote_id("tok_abc");

        h.gateway
            .create_payment(&mut payment, &order("19.99"), false)
            .await
            .unwrap();

        assert_eq!(payment.state, PaymentState::Authorization);
        assert!(payment.captured_time.is_none());
        assert_eq!(h.processor.calls()[0].1["type"], "preauth");
    }

    #[tokio::test]
    async fn test_decline_leaves_state_unchanged() {
        let h = harness(test_config());
        h.processor.decline(Some("Insufficient funds"));
        let mut payment = Payment::new("42", usd("19.99")).with_remote_id("tok_abc");
        let before = payment.clone();

        let err = h
            .gateway
            .create_payment(&mut payment, &order("19.99"), true)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Declined {
                operation: Operation::Process,
                ref message,
            } if message == "Insufficient funds"
        ));
        assert_eq!(payment, before);
        assert!(h.payments.is_empty());
    }

    #[tokio::test]
    async fn test_decline_without_message_uses_default() {
        let h = harness(test_config());
        h.processor.decline(None);
        let mut payment = Payment::new("42", usd("19.99")).with_remote_id("tok_abc");

        let err = h
            .gateway
            .create_payment(&mut payment, &order("19.99"), true)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Payment was declined.");
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected_before_calling_processor() {
        let h = harness(test_config());
        let mut payment = Payment::new("42", usd("19.99"));

        let err = h
            .gateway
            .create_payment(&mut payment, &order("19.99"), true)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::MissingToken));
        assert!(h.processor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_a_decline() {
        let h = harness(test_config());
        h.processor.respond(Err(ApiError::Transport {
            status: Some(500),
            message: "Card declined".into(),
        }));
        let mut payment = Payment::new("42", usd("19.99")).with_remote_id("tok_abc");

        let err = h
            .gateway
            .create_payment(&mut payment, &order("19.99"), true)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Transport(ref m) if m == "Card declined"));
        assert_eq!(payment.state, PaymentState::New);
    }

    #[tokio::test]
    async fn test_capture_authorized_payment_with_lower_amount() {
        let h = harness(test_config());
        h.processor.approve("20163175");
        let mut payment = payment_in(PaymentState::Authorization, "19.99");

        h.gateway
            .capture_payment(&mut payment, Some(usd("15.00")))
            .await
            .unwrap();

        assert_eq!(payment.state, PaymentState::Completed);
        assert_eq!(payment.amount, usd("15.00"));
        assert_eq!(payment.captured_time, Some(frozen_now()));
        assert_eq!(
            h.processor.calls()[0].1,
            serde_json::json!({ "transactionId": "20163175", "amount": "15.00" })
        );
    }

    #[tokio::test]
    async fn test_capture_decline_uses_default_message() {
        let h = harness(test_config());
        h.processor.decline(None);
        let mut payment = payment_in(PaymentState::Authorization, "19.99");

        let err = h.gateway.capture_payment(&mut payment, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Capture failed.");
        assert_eq!(payment.state, PaymentState::Authorization);
    }

    #[tokio::test]
    async fn test_capture_amount_must_be_positive_and_within_authorization() {
        let h = harness(test_config());
        let mut payment = payment_in(PaymentState::Authorization, "19.99");

        for amount in ["0.00", "-1.00", "20.00"] {
            let err = h
                .gateway
                .capture_payment(&mut payment, Some(usd(amount)))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                GatewayError::Precondition {
                    operation: Operation::Capture,
                    ..
                }
            ));
        }

        assert!(h.processor.calls().is_empty());
        assert_eq!(payment, payment_in(PaymentState::Authorization, "19.99"));
    }

    #[tokio::test]
    async fn test_void_decline_keeps_authorization() {
        let h = harness(test_config());
        h.processor.decline(None);
        let mut payment = payment_in(PaymentState::Authorization, "19.99");

        let err = h.gateway.void_payment(&mut payment).await.unwrap_err();

        assert_eq!(err.to_string(), "Void failed.");
        assert_eq!(payment.state, PaymentState::Authorization);
        assert!(h.payments.is_empty());
    }

    #[tokio::test]
    async fn test_void_authorized_payment() {
        let h = harness(test_config());
        h.processor.approve("20163175");
        let mut payment = payment_in(PaymentState::Authorization, "19.99");

        h.gateway.void_payment(&mut payment).await.unwrap();

        assert_eq!(payment.state, PaymentState::AuthorizationVoided);
        assert_eq!(
            h.processor.calls()[0],
            ("void", serde_json::json!({ "transactionId": "20163175" }))
        );
    }

    #[tokio::test]
    async fn test_void_completed_payment_is_precondition_error() {
        let h = harness(test_config());
        let mut payment = payment_in(PaymentState::Completed, "19.99");

        let err = h.gateway.void_payment(&mut payment).await.unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Precondition {
                operation: Operation::Void,
                ..
            }
        ));
        assert!(h.processor.calls().is_empty());
        assert_eq!(payment.state, PaymentState::Completed);
    }

    #[tokio::test]
    async fn test_partial_refunds_up_to_amount() {
        let h = harness(test_config());
        h.processor
            .approve("r1")
            .approve("r2")
            .approve("r3");
        let mut payment = payment_in(PaymentState::Completed, "30.00");

        h.gateway
            .refund_payment(&mut payment, Some(usd("10.00")))
            .await
            .unwrap();
        assert_eq!(payment.state, PaymentState::PartiallyRefunded);
        assert_eq!(payment.refunded_amount, usd("10.00"));

        h.gateway
            .refund_payment(&mut payment, Some(usd("15.00")))
            .await
            .unwrap();
        assert_eq!(payment.state, PaymentState::PartiallyRefunded);
        assert_eq!(payment.refunded_amount.to_fixed2(), "25.00");

        h.gateway
            .refund_payment(&mut payment, Some(usd("5.00")))
            .await
            .unwrap();
        assert_eq!(payment.state, PaymentState::Refunded);
        assert_eq!(payment.refunded_amount.to_fixed2(), "30.00");

        // Nothing further can be refunded, and the processor is not asked.
        let err = h
            .gateway
            .refund_payment(&mut payment, Some(usd("0.01")))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Precondition { .. }));
        assert_eq!(h.processor.calls().len(), 3);
        assert_eq!(payment.refunded_amount.to_fixed2(), "30.00");
    }

    #[tokio::test]
    async fn test_refund_decline_is_not_counted() {
        let h = harness(test_config());
        h.processor.decline(Some("Refund window closed"));
        let mut payment = payment_in(PaymentState::PartiallyRefunded, "30.00");
        payment.refunded_amount = usd("10.00");
        let before = payment.clone();

        let err = h
            .gateway
            .refund_payment(&mut payment, Some(usd("5.00")))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Refund window closed");
        assert_eq!(payment, before);
        assert!(h.payments.is_empty());
    }

    /// Repository whose saves always fail
    struct FailingRepository;

    impl PaymentRepository for FailingRepository {
        fn save(&self, _payment: &mut Payment) -> std::result::Result<u64, RepositoryError> {
            Err(RepositoryError::Storage("disk full".into()))
        }

        fn load(&self, id: u64) -> std::result::Result<Payment, RepositoryError> {
            Err(RepositoryError::NotFound(id))
        }

        fn load_for_order(
            &self,
            _order_id: &str,
        ) -> std::result::Result<Vec<Payment>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_failed_save_leaves_caller_payment_untouched() {
        let processor = Arc::new(FakeProcessor::default());
        processor.approve("r1");
        let services = Services::new(Arc::new(FailingRepository))
            .with_clock(Arc::new(FixedClock(frozen_now())));
        let gateway = HelcimGateway::new(test_config(), processor.clone(), services);
        let mut payment = payment_in(PaymentState::Completed, "30.00");
        let before = payment.clone();

        let err = gateway
            .refund_payment(&mut payment, Some(usd("10.00")))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Repository(_)));
        assert_eq!(err.user_message(), crate::error::GENERIC_FAILURE_MESSAGE);
        assert_eq!(payment, before);
        assert_eq!(processor.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_refund_defaults_to_remaining_balance() {
        let h = harness(test_config());
        h.processor.approve("r1");
        let mut payment = payment_in(PaymentState::PartiallyRefunded, "30.00");
        payment.refunded_amount = usd("12.50");

        h.gateway.refund_payment(&mut payment, None).await.unwrap();

        assert_eq!(payment.state, PaymentState::Refunded);
        assert_eq!(h.processor.calls()[0].1["amount"], "17.50");
    }

    #[tokio::test]
    async fn test_refund_over_balance_is_rejected() {
        let h = harness(test_config());
        let mut payment = payment_in(PaymentState::Completed, "30.00");

        let err = h
            .gateway
            .refund_payment(&mut payment, Some(usd("30.01")))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("exceeds remaining balance"));
        assert!(h.processor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refund_in_other_currency_is_rejected() {
        let h = harness(test_config());
        let mut payment = payment_in(PaymentState::Completed, "30.00");

        let err = h
            .gateway
            .refund_payment(&mut payment, Some(Price::parse("5.00", "CAD").unwrap()))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Precondition { operation: Operation::Refund, .. }));
    }

    #[tokio::test]
    async fn test_refund_requires_captured_payment() {
        let h = harness(test_config());
        let mut payment = payment_in(PaymentState::Authorization, "30.00");

        let err = h.gateway.refund_payment(&mut payment, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::Precondition { operation: Operation::Refund, .. }));
    }

    #[tokio::test]
    async fn test_refresh_records_remote_state_only() {
        let h = harness(test_config());
        h.processor.decline(None);
        let mut payment = payment_in(PaymentState::Completed, "30.00");
        payment.remote_state = Some("APPROVED".into());

        let response = h.gateway.refresh_remote_state(&mut payment).await.unwrap();

        assert_eq!(response.status, RemoteStatus::Declined);
        assert_eq!(payment.state, PaymentState::Completed);
        assert_eq!(payment.remote_state.as_deref(), Some("DECLINED"));
        assert_eq!(h.processor.calls()[0].0, "get");
    }
}
