//! Role descriptors and endpoints.
//!
//! These mirror the parts of `SPSSODescriptor` and `IDPSSODescriptor` the
//! exchange consults. They are produced by a metadata resolver and never
//! modified by the broker.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::SamlBinding;

/// A protocol endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Binding URI.
    pub binding: String,

    /// Location URL.
    pub location: String,

    /// Response location, if different from `location`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_location: Option<String>,
}

impl Endpoint {
    /// Creates an endpoint for a known binding.
    #[must_use]
    pub fn new(binding: SamlBinding, location: impl Into<String>) -> Self {
        Self {
            binding: binding.uri().to_string(),
            location: location.into(),
            response_location: None,
        }
    }

    /// Sets the response location.
    #[must_use]
    pub fn with_response_location(mut self, location: impl Into<String>) -> Self {
        self.response_location = Some(location.into());
        self
    }

    /// Returns the parsed binding, if it is one the broker knows.
    #[must_use]
    pub fn saml_binding(&self) -> Option<SamlBinding> {
        SamlBinding::from_uri(&self.binding)
    }

    /// Where responses to messages sent to this endpoint go.
    #[must_use]
    pub fn effective_response_location(&self) -> &str {
        self.response_location.as_deref().unwrap_or(&self.location)
    }
}

/// An indexed endpoint such as an assertion consumer service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedEndpoint {
    /// The endpoint.
    #[serde(flatten)]
    pub endpoint: Endpoint,

    /// Declared index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u16>,

    /// `isDefault`; absent in metadata reads as false.
    #[serde(default)]
    pub is_default: bool,
}

impl IndexedEndpoint {
    /// Creates a non-default indexed endpoint.
    #[must_use]
    pub const fn new(endpoint: Endpoint, index: u16) -> Self {
        Self {
            endpoint,
            index: Some(index),
            is_default: false,
        }
    }

    /// Marks the endpoint as the default.
    #[must_use]
    pub const fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// `SPSSODescriptor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpSsoDescriptor {
    /// SP entity ID.
    pub entity_id: String,

    /// Assertion consumer services in document order.
    #[serde(default)]
    pub assertion_consumer_services: Vec<IndexedEndpoint>,

    /// Single logout services.
    #[serde(default)]
    pub single_logout_services: Vec<Endpoint>,

    /// `AuthnRequestsSigned`.
    #[serde(default)]
    pub authn_requests_signed: bool,

    /// `WantAssertionsSigned`.
    #[serde(default)]
    pub want_assertions_signed: bool,

    /// Supported name ID format URIs.
    #[serde(default)]
    pub name_id_formats: Vec<String>,
}

impl SpSsoDescriptor {
    /// Creates a descriptor with no endpoints.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            assertion_consumer_services: Vec::new(),
            single_logout_services: Vec::new(),
            authn_requests_signed: false,
            want_assertions_signed: false,
            name_id_formats: Vec::new(),
        }
    }

    /// Appends an assertion consumer service.
    #[must_use]
    pub fn with_acs(mut self, acs: IndexedEndpoint) -> Self {
        self.assertion_consumer_services.push(acs);
        self
    }

    /// Appends a single logout service.
    #[must_use]
    pub fn with_slo(mut self, slo: Endpoint) -> Self {
        self.single_logout_services.push(slo);
        self
    }
}

/// `IDPSSODescriptor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdpSsoDescriptor {
    /// IdP entity ID.
    pub entity_id: String,

    /// Single sign-on services in document order.
    #[serde(default)]
    pub single_sign_on_services: Vec<Endpoint>,

    /// Single logout services.
    #[serde(default)]
    pub single_logout_services: Vec<Endpoint>,

    /// `WantAuthnRequestsSigned`.
    #[serde(default)]
    pub want_authn_requests_signed: bool,

    /// Supported name ID format URIs.
    #[serde(default)]
    pub name_id_formats: Vec<String>,
}

impl IdpSsoDescriptor {
    /// Creates a descriptor with no endpoints.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            single_sign_on_services: Vec::new(),
            single_logout_services: Vec::new(),
            want_authn_requests_signed: false,
            name_id_formats: Vec::new(),
        }
    }

    /// Appends a single sign-on service.
    #[must_use]
    pub fn with_sso(mut self, sso: Endpoint) -> Self {
        self.single_sign_on_services.push(sso);
        self
    }

    /// Appends a single logout service.
    #[must_use]
    pub fn with_slo(mut self, slo: Endpoint) -> Self {
        self.single_logout_services.push(slo);
        self
    }
}

/// Role shape of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleKind {
    /// SP SSO role.
    ServiceProvider,
    /// IdP SSO role.
    IdentityProvider,
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceProvider => f.write_str("SPSSODescriptor"),
            Self::IdentityProvider => f.write_str("IDPSSODescriptor"),
        }
    }
}

/// A role descriptor of either shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleDescriptor {
    /// SP role.
    ServiceProvider(SpSsoDescriptor),
    /// IdP role.
    IdentityProvider(IdpSsoDescriptor),
}

impl RoleDescriptor {
    /// Returns the role shape.
    #[must_use]
    pub const fn kind(&self) -> RoleKind {
        match self {
            Self::ServiceProvider(_) => RoleKind::ServiceProvider,
            Self::IdentityProvider(_) => RoleKind::IdentityProvider,
        }
    }

    /// Returns the owning entity ID.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        match self {
            Self::ServiceProvider(sp) => &sp.entity_id,
            Self::IdentityProvider(idp) => &idp.entity_id,
        }
    }

    /// Returns the single logout services of either role.
    #[must_use]
    pub fn single_logout_services(&self) -> &[Endpoint] {
        match self {
            Self::ServiceProvider(sp) => &sp.single_logout_services,
            Self::IdentityProvider(idp) => &idp.single_logout_services,
        }
    }

    /// Returns the SP descriptor, if SP-shaped.
    #[must_use]
    pub const fn as_service_provider(&self) -> Option<&SpSsoDescriptor> {
        match self {
            Self::ServiceProvider(sp) => Some(sp),
            Self::IdentityProvider(_) => None,
        }
    }

    /// Returns the IdP descriptor, if IdP-shaped.
    #[must_use]
    pub const fn as_identity_provider(&self) -> Option<&IdpSsoDescriptor> {
        match self {
            Self::IdentityProvider(idp) => Some(idp),
            Self::ServiceProvider(_) => None,
        }
    }

    /// Short description used in error messages.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} of {}", self.kind(), self.entity_id())
    }
}

impl From<SpSsoDescriptor> for RoleDescriptor {
    fn from(sp: SpSsoDescriptor) -> Self {
        Self::ServiceProvider(sp)
    }
}

impl From<IdpSsoDescriptor> for RoleDescriptor {
    fn from(idp: IdpSsoDescriptor) -> Self {
        Self::IdentityProvider(idp)
    }
}
