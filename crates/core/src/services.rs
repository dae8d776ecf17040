//! Collaborators injected into the gateway: storage, user notices and time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::repository::PaymentRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Status,
    Warning,
    Error,
}

/// Channel for messages meant for the customer or the admin on screen
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Forwards notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Status => info!(notice = message, "Status message"),
            NoticeLevel::Warning => warn!(notice = message, "Warning message"),
            NoticeLevel::Error => error!(notice = message, "Error message"),
        }
    }
}

/// Keeps notices in memory so they can be rendered or inspected later
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().push((level, message.to_string()));
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The collaborators shared by the gateway and the hosted page flow
#[derive(Clone)]
pub struct Services {
    pub payments: Arc<dyn PaymentRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Services logging notices and reading the system clock
    pub fn new(payments: Arc<dyn PaymentRepository>) -> Self {
        Self {
            payments,
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
