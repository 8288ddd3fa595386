//! Relay protocol message types
//!
//! Every relay route answers with a JSON body `{"status": <int>, "value": <string>}`.

use huntsync_core::Status;
use serde::{Deserialize, Serialize};

/// Decoded relay answer: a tagged result, never an exception
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default)]
    pub value: String,
}

impl Response {
    pub fn ok(value: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            value: value.into(),
        }
    }

    pub fn new(status: Status, value: impl Into<String>) -> Self {
        Self {
            status,
            value: value.into(),
        }
    }

    /// Local failure carrying a description
    pub fn exception(description: impl Into<String>) -> Self {
        Self::new(Status::Exception, description)
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Integer payload of a successful read
    pub fn int_value(&self) -> Option<u32> {
        if !self.is_ok() {
            return None;
        }
        let trimmed = self.value.trim();
        trimmed
            .parse::<u32>()
            .ok()
            .or_else(|| trimmed.parse::<f64>().ok().map(clamp_reading))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

fn clamp_reading(v: f64) -> u32 {
    if v.is_nan() || v <= 0.0 {
        0
    } else if v >= u32::MAX as f64 {
        u32::MAX
    } else {
        v as u32
    }
}

/// Raw HTTP answer before protocol decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub http_status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(http_status: u16, body: impl Into<String>) -> Self {
        Self {
            http_status,
            body: body.into(),
        }
    }
}
