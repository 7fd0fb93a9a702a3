//! Protocol status carried by responses.

use serde::{Deserialize, Serialize};

use super::status_codes;

/// SAML `Status` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Top-level status code URI.
    pub code: String,

    /// Optional nested status code URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_code: Option<String>,

    /// Optional human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Status {
    /// Success status.
    #[must_use]
    pub fn success() -> Self {
        Self {
            code: status_codes::SUCCESS.to_string(),
            sub_code: None,
            message: None,
        }
    }

    /// Requester error with a second-level code.
    #[must_use]
    pub fn requester(sub_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: status_codes::REQUESTER.to_string(),
            sub_code: Some(sub_code.into()),
            message: Some(message.into()),
        }
    }

    /// Responder error.
    #[must_use]
    pub fn responder(message: impl Into<String>) -> Self {
        Self {
            code: status_codes::RESPONDER.to_string(),
            sub_code: None,
            message: Some(message.into()),
        }
    }

    /// Returns true for a top-level success code.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == status_codes::SUCCESS
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}
