//! Verification of hosted page return notifications.
//!
//! The hosted page posts back an `amountHash`: the lowercase hex SHA-256 of the
//! hash key followed by the order amount in `xxxxx.xx` form. The processor
//! offers no signed webhook for this flow, so this check is what separates a
//! genuine return from a forged one.

use commerce_helcim_types::{GatewayConfig, Order, Price, ReturnNotification};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// `sha256(secret_key + amount)` with the amount fixed to two decimals
pub fn amount_hash(secret_key: &str, amount: &Price) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret_key.as_bytes());
    hasher.update(amount.to_fixed2().as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `reported_hash` matches the hash of `amount` under `secret_key`
pub fn verify_amount_hash(secret_key: &str, amount: &Price, reported_hash: &str) -> bool {
    let calculated = amount_hash(secret_key, amount);
    calculated.as_bytes().ct_eq(reported_hash.as_bytes()).into()
}

/// Whether a return notification was produced by the processor for this order
pub fn is_trusted(
    config: &GatewayConfig,
    order: &Order,
    notification: &ReturnNotification,
) -> bool {
    verify_amount_hash(config.hash_key(), &order.total_price, &notification.amount_hash)
}
