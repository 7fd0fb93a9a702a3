//! Assertion object model as handed over by the inbound adapter.
//!
//! These are already-deserialized views of the XML. The broker never
//! builds assertions itself; the constructors here exist for adapters and
//! tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{confirmation_methods, SubjectIdentifier};

/// SAML `Assertion`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assertion {
    /// Assertion ID.
    pub id: String,

    /// Issue instant.
    pub issue_instant: DateTime<Utc>,

    /// Issuer entity ID.
    pub issuer: String,

    /// Subject, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,

    /// Validity conditions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,

    /// Authentication statements in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authn_statements: Vec<AuthnStatement>,

    /// Attribute statements in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_statements: Vec<AttributeStatement>,

    /// Whether the assertion carried an enveloped signature.
    ///
    /// Set by the inbound adapter; the signature itself is checked by a
    /// [`SignatureVerifier`](crate::validation::SignatureVerifier).
    #[serde(skip)]
    pub signed: bool,
}

impl Assertion {
    /// Creates an empty assertion from `issuer`.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            subject: None,
            conditions: None,
            authn_statements: Vec::new(),
            attribute_statements: Vec::new(),
            signed: false,
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Appends an authentication statement.
    #[must_use]
    pub fn with_authn_statement(mut self, statement: AuthnStatement) -> Self {
        self.authn_statements.push(statement);
        self
    }

    /// Appends an attribute statement.
    #[must_use]
    pub fn with_attribute_statement(mut self, statement: AttributeStatement) -> Self {
        self.attribute_statements.push(statement);
        self
    }

    /// Marks the assertion as signed.
    #[must_use]
    pub const fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    /// Flattens all attribute statements into name → values.
    ///
    /// Values of repeated attribute names are concatenated in document order.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<String, Vec<String>> {
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for attr in self.attribute_statements.iter().flat_map(|s| &s.attributes) {
            out.entry(attr.name.clone())
                .or_default()
                .extend(attr.values.iter().cloned());
        }
        out
    }
}

/// Assertion `Subject`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subject {
    /// `NameID` or `BaseID` naming the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<SubjectIdentifier>,

    /// Confirmations in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confirmations: Vec<SubjectConfirmation>,
}

impl Subject {
    /// Creates a subject named by `identifier`.
    #[must_use]
    pub fn new(identifier: impl Into<SubjectIdentifier>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            confirmations: Vec::new(),
        }
    }

    /// Creates a subject without an identifier.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Appends a confirmation.
    #[must_use]
    pub fn with_confirmation(mut self, confirmation: SubjectConfirmation) -> Self {
        self.confirmations.push(confirmation);
        self
    }
}

/// `SubjectConfirmation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectConfirmation {
    /// Confirmation method URI.
    pub method: String,

    /// Identifier carried by the confirmation itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<SubjectIdentifier>,

    /// Confirmation data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SubjectConfirmationData>,
}

impl SubjectConfirmation {
    /// Bearer confirmation with the given data.
    #[must_use]
    pub fn bearer(data: SubjectConfirmationData) -> Self {
        Self {
            method: confirmation_methods::BEARER.to_string(),
            identifier: None,
            data: Some(data),
        }
    }

    /// Sets the confirmation's own identifier.
    #[must_use]
    pub fn identified_by(mut self, identifier: impl Into<SubjectIdentifier>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Returns true for the bearer method.
    #[must_use]
    pub fn is_bearer(&self) -> bool {
        self.method == confirmation_methods::BEARER
    }
}

/// `SubjectConfirmationData`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectConfirmationData {
    /// ID of the request this confirmation answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// Not valid before.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// Not valid on or after.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Location the assertion may be presented to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,

    /// Client address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// `Conditions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conditions {
    /// Not valid before.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// Not valid on or after.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Audience restrictions. Each restriction must be satisfied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audience_restrictions: Vec<AudienceRestriction>,
}

impl Conditions {
    /// Conditions valid in `[not_before, not_on_or_after)`.
    #[must_use]
    pub fn between(not_before: DateTime<Utc>, not_on_or_after: DateTime<Utc>) -> Self {
        Self {
            not_before: Some(not_before),
            not_on_or_after: Some(not_on_or_after),
            ..Self::default()
        }
    }

    /// Adds a single-audience restriction.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience_restrictions.push(AudienceRestriction {
            audiences: vec![audience.into()],
        });
        self
    }
}

/// `AudienceRestriction`; satisfied when any listed audience matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudienceRestriction {
    /// Audience URIs.
    pub audiences: Vec<String>,
}

/// `AuthnStatement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthnStatement {
    /// When the subject authenticated.
    pub authn_instant: DateTime<Utc>,

    /// IdP session index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_index: Option<String>,

    /// IdP session end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_not_on_or_after: Option<DateTime<Utc>>,

    /// Authentication context class reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authn_context_class_ref: Option<String>,
}

impl AuthnStatement {
    /// Statement for an authentication at `authn_instant`.
    #[must_use]
    pub fn at(authn_instant: DateTime<Utc>) -> Self {
        Self {
            authn_instant,
            session_index: None,
            session_not_on_or_after: None,
            authn_context_class_ref: None,
        }
    }

    /// Sets the session index.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_index = Some(index.into());
        self
    }
}

/// `AttributeStatement`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeStatement {
    /// Attributes in document order.
    pub attributes: Vec<Attribute>,
}

/// `Attribute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,

    /// Friendly name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// String values.
    pub values: Vec<String>,
}

impl Attribute {
    /// Attribute with the given values.
    #[must_use]
    pub fn new<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            friendly_name: None,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}
