//! Credentials produced by a completed inbound leg.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::ValidatedSubject;
use crate::types::SubjectIdentifier;

/// What the broker learned about the authenticated subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Subject identifier.
    pub subject: SubjectIdentifier,

    /// IdP entity ID.
    pub issuer: String,

    /// IdP session index, needed for logout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_index: Option<String>,

    /// When the subject authenticated at the IdP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authn_instant: Option<DateTime<Utc>>,

    /// Attribute values by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Vec<String>>,

    /// Relay state returned with the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_state: Option<String>,
}

impl Credentials {
    /// Credentials naming only a subject.
    #[must_use]
    pub fn for_subject(subject: SubjectIdentifier, issuer: impl Into<String>) -> Self {
        Self {
            subject,
            issuer: issuer.into(),
            session_index: None,
            authn_instant: None,
            attributes: BTreeMap::new(),
            relay_state: None,
        }
    }

    /// Builds credentials from a validated assertion.
    #[must_use]
    pub fn from_validated(subject: &ValidatedSubject, relay_state: Option<String>) -> Self {
        let assertion = &subject.assertion;
        let first_statement = assertion.authn_statements.first();
        Self {
            subject: subject.base_subject_id.clone(),
            issuer: assertion.issuer.clone(),
            session_index: first_statement.and_then(|s| s.session_index.clone()),
            authn_instant: first_statement.map(|s| s.authn_instant),
            attributes: assertion.attributes(),
            relay_state,
        }
    }

    /// First value of attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name)?.first().map(String::as_str)
    }
}
