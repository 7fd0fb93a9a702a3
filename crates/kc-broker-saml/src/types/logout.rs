//! Single Logout messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Status, SubjectIdentifier};

/// SAML `LogoutRequest` sent by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutRequest {
    /// Request ID.
    pub id: String,

    /// Issue instant.
    pub issue_instant: DateTime<Utc>,

    /// SP entity ID.
    pub issuer: String,

    /// IdP SLO location; filled on send.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Subject being logged out.
    pub subject: SubjectIdentifier,

    /// IdP session indexes to end.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session_indexes: Vec<String>,

    /// Logout reason URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LogoutRequest {
    /// User-initiated logout.
    pub const REASON_USER: &'static str = "urn:oasis:names:tc:SAML:2.0:logout:user";

    /// Creates a logout request for `subject`.
    #[must_use]
    pub fn new(issuer: impl Into<String>, subject: impl Into<SubjectIdentifier>) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: None,
            subject: subject.into(),
            session_indexes: Vec::new(),
            reason: None,
        }
    }

    /// Adds a session index.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_indexes.push(index.into());
        self
    }
}

/// SAML `LogoutResponse` received from the IdP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    /// Response ID.
    pub id: String,

    /// Issue instant.
    pub issue_instant: DateTime<Utc>,

    /// Issuer entity ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// ID of the logout request being answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// Status.
    pub status: Status,
}

impl LogoutResponse {
    /// Success response to `request_id`.
    #[must_use]
    pub fn success(issuer: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            issue_instant: Utc::now(),
            issuer: Some(issuer.into()),
            in_response_to: Some(request_id.into()),
            status: Status::success(),
        }
    }
}
