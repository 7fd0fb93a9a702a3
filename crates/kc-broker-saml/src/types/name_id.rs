//! Subject identifiers.
//!
//! An assertion names its subject with a `NameID` or, less commonly, a
//! `BaseID` extension element. Either may also appear inside a
//! `SubjectConfirmation`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::NameIdFormat;

/// SAML `NameID`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    /// The identifier value.
    pub value: String,

    /// Format URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Qualifying IdP domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,

    /// Qualifying SP entity ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,
}

impl NameId {
    /// Creates a name ID with no format.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            name_qualifier: None,
            sp_name_qualifier: None,
        }
    }

    /// Creates a name ID with the given format.
    #[must_use]
    pub fn with_format(value: impl Into<String>, format: NameIdFormat) -> Self {
        Self {
            format: Some(format.uri().to_string()),
            ..Self::new(value)
        }
    }

    /// Returns the parsed format, `Unspecified` when absent or unknown.
    #[must_use]
    pub fn parsed_format(&self) -> NameIdFormat {
        self.format
            .as_deref()
            .and_then(NameIdFormat::from_uri)
            .unwrap_or_default()
    }
}

/// SAML `BaseID` extension identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseId {
    /// Identifier value as produced by the extension's deserializer.
    pub value: String,

    /// The `xsi:type` of the concrete extension element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    /// Qualifying IdP domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,

    /// Qualifying SP entity ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,
}

/// The resolved identifier of an authenticated subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubjectIdentifier {
    /// A `NameID` element.
    NameId(NameId),
    /// A `BaseID` element.
    BaseId(BaseId),
}

impl SubjectIdentifier {
    /// Returns the raw identifier value.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::NameId(n) => &n.value,
            Self::BaseId(b) => &b.value,
        }
    }

    /// Returns the name ID if this identifier is one.
    #[must_use]
    pub fn as_name_id(&self) -> Option<&NameId> {
        match self {
            Self::NameId(n) => Some(n),
            Self::BaseId(_) => None,
        }
    }
}

impl From<NameId> for SubjectIdentifier {
    fn from(name_id: NameId) -> Self {
        Self::NameId(name_id)
    }
}

impl From<BaseId> for SubjectIdentifier {
    fn from(base_id: BaseId) -> Self {
        Self::BaseId(base_id)
    }
}

impl fmt::Display for SubjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}
