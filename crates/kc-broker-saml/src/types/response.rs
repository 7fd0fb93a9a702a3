//! Authentication `Response` received from an external IdP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Assertion, Status};

/// SAML `Response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Response ID.
    pub id: String,

    /// Protocol version.
    #[serde(default = "default_version")]
    pub version: String,

    /// Issue instant.
    pub issue_instant: DateTime<Utc>,

    /// Issuer entity ID. Optional on the response element itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// ID of the request being answered; absent for IdP-initiated SSO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// Location the response was sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Status.
    pub status: Status,

    /// Decrypted assertions in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,

    /// Whether the response element carried a signature.
    #[serde(skip)]
    pub signed: bool,
}

fn default_version() -> String {
    "2.0".to_string()
}

impl Response {
    /// Success response from `issuer`.
    #[must_use]
    pub fn success(issuer: impl Into<String>) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            version: default_version(),
            issue_instant: Utc::now(),
            issuer: Some(issuer.into()),
            in_response_to: None,
            destination: None,
            status: Status::success(),
            assertions: Vec::new(),
            signed: false,
        }
    }

    /// Sets `InResponseTo`.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Appends an assertion.
    #[must_use]
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Checks the fields every response must carry.
    pub fn check_structure(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("ID is required".to_string());
        }
        if self.version != "2.0" {
            return Err(format!("unsupported SAML version: {}", self.version));
        }
        Ok(())
    }
}
