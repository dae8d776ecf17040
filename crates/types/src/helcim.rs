//! Wire types exchanged with the Helcim processor

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::FormFields;

/// Transaction status string as reported by the processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemoteStatus {
    Approved,
    Declined,
    Other(String),
}

impl RemoteStatus {
    pub fn is_approved(&self) -> bool {
        matches!(self, RemoteStatus::Approved)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RemoteStatus::Approved => "APPROVED",
            RemoteStatus::Declined => "DECLINED",
            RemoteStatus::Other(other) => other,
        }
    }
}

impl From<String> for RemoteStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "APPROVED" => RemoteStatus::Approved,
            "DECLINED" => RemoteStatus::Declined,
            _ => RemoteStatus::Other(value),
        }
    }
}

impl From<RemoteStatus> for String {
    fn from(value: RemoteStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processor response to a payment request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTransaction {
    pub status: RemoteStatus,

    #[serde(default, deserialize_with = "string_or_number")]
    pub transaction_id: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

/// Transaction ids come back as numbers from some endpoints
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number for transactionId, got {}",
            other
        ))),
    }
}

/// Fields POSTed back by the hosted page after an approved payment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReturnNotification {
    pub order_id: String,
    pub date: String,
    pub time: String,
    pub approval_code: String,
    pub response: String,
    pub response_message: String,
    pub amount_hash: String,
}

impl ReturnNotification {
    /// Read the notification from posted form fields, trimmed; missing fields are empty
    pub fn from_form(fields: &FormFields) -> Self {
        let get = |key: &str| {
            fields
                .get(key)
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };
        Self {
            order_id: get("orderId"),
            date: get("date"),
            time: get("time"),
            approval_code: get("approvalCode"),
            response: get("response"),
            response_message: get("responseMessage"),
            amount_hash: get("amountHash"),
        }
    }
}
