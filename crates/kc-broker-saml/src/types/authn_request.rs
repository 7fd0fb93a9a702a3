//! `AuthnRequest` sent by the broker to an external IdP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NameIdFormat, SamlBinding};

/// SAML `AuthnRequest`.
///
/// Only the fields the exchange context reads or fills are modelled; the
/// outbound adapter owns the full XML rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// Request ID; becomes the exchange's request ID.
    pub id: String,

    /// Issue instant.
    pub issue_instant: DateTime<Utc>,

    /// SP entity ID.
    pub issuer: String,

    /// IdP SSO location; filled from the resolved endpoint on send.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Where the response should be delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<String>,

    /// Index of the ACS endpoint in SP metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_index: Option<u16>,

    /// Binding URI the response should use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_binding: Option<String>,

    /// Requested name ID format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id_policy_format: Option<String>,

    /// `ForceAuthn`.
    #[serde(default)]
    pub force_authn: bool,

    /// `IsPassive`.
    #[serde(default)]
    pub is_passive: bool,
}

impl AuthnRequest {
    /// Creates a request with a fresh ID.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: None,
            assertion_consumer_service_url: None,
            assertion_consumer_service_index: None,
            protocol_binding: None,
            name_id_policy_format: None,
            force_authn: false,
            is_passive: false,
        }
    }

    /// Sets the ACS URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the response binding.
    #[must_use]
    pub fn with_protocol_binding(mut self, binding: SamlBinding) -> Self {
        self.protocol_binding = Some(binding.uri().to_string());
        self
    }

    /// Sets the requested name ID format.
    #[must_use]
    pub fn with_name_id_format(mut self, format: NameIdFormat) -> Self {
        self.name_id_policy_format = Some(format.uri().to_string());
        self
    }

    /// Sets `ForceAuthn`.
    #[must_use]
    pub const fn force_authn(mut self, force: bool) -> Self {
        self.force_authn = force;
        self
    }
}
