use chrono::{DateTime, Utc};
use rand::Rng;

use super::MOCK_TOKEN_PREFIX;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Locally generated stand-in for a tokenizer token.
///
/// Only exists in builds with the `mock-tokens` feature, and is only accepted
/// by gateways in test mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockToken(String);

impl MockToken {
    /// `test_token_<millis>_<9 random base36 chars>`
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
            .collect();
        Self(format!(
            "{}{}_{}",
            MOCK_TOKEN_PREFIX,
            now.timestamp_millis(),
            suffix
        ))
    }

    pub(crate) fn from_submitted(value: &str) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
