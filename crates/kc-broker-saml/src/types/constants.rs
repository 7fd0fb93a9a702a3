//! SAML 2.0 URIs used by the broker.

use serde::{Deserialize, Serialize};

/// SAML 2.0 protocol namespace, recorded in protocol subcontexts.
pub const SAML20P_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// Transport bindings advertised by metadata endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamlBinding {
    /// HTTP POST binding.
    HttpPost,
    /// HTTP Redirect binding.
    HttpRedirect,
    /// HTTP Artifact binding.
    HttpArtifact,
    /// SOAP binding.
    Soap,
}

impl SamlBinding {
    /// Returns the URI for this binding.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
            Self::HttpArtifact => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Artifact",
            Self::Soap => "urn:oasis:names:tc:SAML:2.0:bindings:SOAP",
        }
    }

    /// Parses a binding from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        [
            Self::HttpPost,
            Self::HttpRedirect,
            Self::HttpArtifact,
            Self::Soap,
        ]
        .into_iter()
        .find(|b| b.uri() == uri)
    }

    /// Parses a binding from a short configuration name (`post`, `redirect`, ...).
    #[must_use]
    pub fn from_short_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "post" | "http-post" => Some(Self::HttpPost),
            "redirect" | "http-redirect" => Some(Self::HttpRedirect),
            "artifact" | "http-artifact" => Some(Self::HttpArtifact),
            "soap" => Some(Self::Soap),
            _ => None,
        }
    }
}

/// Name identifier formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NameIdFormat {
    /// Unspecified.
    #[default]
    Unspecified,
    /// Email address.
    Email,
    /// Persistent pairwise identifier.
    Persistent,
    /// Transient one-time identifier.
    Transient,
    /// Entity identifier.
    Entity,
}

impl NameIdFormat {
    /// Returns the URI for this format.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Unspecified => "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified",
            Self::Email => "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress",
            Self::Persistent => "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent",
            Self::Transient => "urn:oasis:names:tc:SAML:2.0:nameid-format:transient",
            Self::Entity => "urn:oasis:names:tc:SAML:2.0:nameid-format:entity",
        }
    }

    /// Parses a format from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        [
            Self::Unspecified,
            Self::Email,
            Self::Persistent,
            Self::Transient,
            Self::Entity,
        ]
        .into_iter()
        .find(|f| f.uri() == uri)
    }
}

/// Subject confirmation methods.
pub mod confirmation_methods {
    /// Bearer.
    pub const BEARER: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";
    /// Holder of key.
    pub const HOLDER_OF_KEY: &str = "urn:oasis:names:tc:SAML:2.0:cm:holder-of-key";
}

/// Top-level status codes.
pub mod status_codes {
    /// Success.
    pub const SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";
    /// Requester error.
    pub const REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";
    /// Responder error.
    pub const RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";
    /// Version mismatch.
    pub const VERSION_MISMATCH: &str = "urn:oasis:names:tc:SAML:2.0:status:VersionMismatch";
    /// Authentication failed (second level).
    pub const AUTHN_FAILED: &str = "urn:oasis:names:tc:SAML:2.0:status:AuthnFailed";
    /// Request denied (second level).
    pub const REQUEST_DENIED: &str = "urn:oasis:names:tc:SAML:2.0:status:RequestDenied";
    /// Unsupported binding (second level).
    pub const UNSUPPORTED_BINDING: &str = "urn:oasis:names:tc:SAML:2.0:status:UnsupportedBinding";
    /// Partial logout (second level).
    pub const PARTIAL_LOGOUT: &str = "urn:oasis:names:tc:SAML:2.0:status:PartialLogout";
}
