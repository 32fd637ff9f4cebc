//! Response envelope and result codes for the backend API.
//!
//! Every JSON response is wrapped as `{ "code": .., "msg": .., "data": .. }`.
//! The header (`code` + `msg`) is classified before the payload is decoded.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Application-level result codes carried in the envelope `code` field.
pub struct ResultCode;

impl ResultCode {
    /// Request succeeded.
    pub const SUCCESS: i64 = 200;
    /// Generic application error.
    pub const ERROR: i64 = 500;
    /// Session expired; credentials are no longer valid.
    pub const OVERDUE: i64 = 401;
}

/// A validated, typed API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultData<T> {
    #[serde(default, deserialize_with = "deserialize_code")]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: String,
    pub data: T,
}

/// Envelope header, decoded without touching the payload.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct EnvelopeHeader {
    #[serde(default, deserialize_with = "deserialize_code")]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: String,
}

/// How a response envelope should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeOutcome {
    Success,
    SessionExpired,
    Failed,
}

impl EnvelopeHeader {
    /// Classify the header.
    ///
    /// A missing or zero code counts as success, same as an explicit
    /// `SUCCESS`.
    pub fn outcome(&self) -> EnvelopeOutcome {
        match self.code {
            Some(ResultCode::OVERDUE) => EnvelopeOutcome::SessionExpired,
            Some(code) if code != 0 && code != ResultCode::SUCCESS => EnvelopeOutcome::Failed,
            _ => EnvelopeOutcome::Success,
        }
    }
}

/// Accept `200`, `"200"` or `null` for the code field.
fn deserialize_code<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("code out of range: {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("non-numeric code: {:?}", s))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "unexpected code type: {}",
            other
        ))),
    }
}
