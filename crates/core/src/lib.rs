//! Helcim card payments for commerce orders.
//!
//! Two checkout styles are offered:
//!
//! - [`checkout`]: the customer's card is tokenized in the browser and the
//!   token is processed server side by [`HelcimGateway`].
//! - [`hosted`]: the customer pays on a Helcim-hosted page and comes back
//!   with a notification verified by [`trust`].
//!
//! Captures, voids, refunds and remote status refreshes go through
//! [`HelcimGateway`] in both cases.

pub mod checkout;
pub mod error;
pub mod gateway;
pub mod hosted;
pub mod repository;
pub mod services;
pub mod trust;

pub use commerce_helcim_driver::{HelcimClient, ProcessorApi};
pub use error::{GatewayError, Operation, Result};
pub use gateway::HelcimGateway;
pub use hosted::HostedPage;
pub use repository::{InMemoryPaymentRepository, PaymentRepository, RepositoryError};
pub use services::{Clock, NoticeLevel, Notifier, Services};
