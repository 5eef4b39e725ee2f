//! Parsing of push-channel payloads and fallback query responses.

use super::payment::PaymentStatus;
use crate::error::{Result, TrackerError};
use serde::Deserialize;
use serde_json::Value;

/// A parsed push-channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    /// Gateway callback relayed by the backend.
    GatewayResult { code: i64, message: String },
    /// Generic payment-updated event carrying a status directly.
    StatusUpdate {
        status: PaymentStatus,
        message: Option<String>,
    },
}

impl PushMessage {
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        let Some(object) = value.as_object() else {
            return Err(TrackerError::MalformedMessage(
                "payload is not a JSON object".to_string(),
            ));
        };

        if let Some(code) = object.get("resultCode").or_else(|| object.get("ResultCode")) {
            let code = parse_code(code)?;
            let message = first_text(&value, &["message", "resultDesc", "ResultDesc"]);
            return Ok(Self::GatewayResult {
                code,
                message: message.unwrap_or_default(),
            });
        }

        if let Some(status) = object.get("status") {
            let status = parse_status(status)?;
            return Ok(Self::StatusUpdate {
                status,
                message: first_text(&value, &["message", "reason"]),
            });
        }

        Err(TrackerError::MalformedMessage(
            "payload carries neither resultCode nor status".to_string(),
        ))
    }
}

/// Result code and description pulled out of a status query response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub code: i64,
    pub description: String,
}

impl QueryResult {
    /// Extracts the result from whichever response shape the gateway returned.
    pub fn extract(response: &Value) -> Result<Self> {
        let candidates: [(&[&str], &[&str]); 4] = [
            (&["resultCode"], &["resultDesc"]),
            (&["ResultCode"], &["ResultDesc"]),
            (&["raw", "ResultCode"], &["raw", "ResultDesc"]),
            (&["CODE"], &["MESSAGE"]),
        ];

        for (code_path, desc_path) in candidates {
            if let Some(code) = lookup(response, code_path) {
                let code = parse_code(code).map_err(|_| {
                    TrackerError::UnexpectedResponse(format!("non-numeric result code {code}"))
                })?;
                let description = lookup(response, desc_path)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Ok(Self { code, description });
            }
        }

        Err(TrackerError::UnexpectedResponse(
            "no result code in status query response".to_string(),
        ))
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .filter(|found| !found.is_null())
}

fn first_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

fn parse_status(value: &Value) -> Result<PaymentStatus> {
    PaymentStatus::deserialize(value)
        .map_err(|_| TrackerError::MalformedMessage(format!("unknown status {value}")))
}

fn parse_code(value: &Value) -> Result<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| TrackerError::MalformedMessage(format!("invalid result code {value}")))
}
