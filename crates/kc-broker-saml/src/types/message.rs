//! Closed set of protocol messages and profiles.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{AuthnRequest, LogoutRequest, LogoutResponse, Response};

/// A protocol message travelling through a transport adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ProfileMessage {
    /// SP → IdP authentication request.
    AuthnRequest(AuthnRequest),
    /// IdP → SP authentication response.
    Response(Response),
    /// Logout request.
    LogoutRequest(LogoutRequest),
    /// Logout response.
    LogoutResponse(LogoutResponse),
}

impl ProfileMessage {
    /// Returns the message kind.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::AuthnRequest(_) => MessageKind::AuthnRequest,
            Self::Response(_) => MessageKind::Response,
            Self::LogoutRequest(_) => MessageKind::LogoutRequest,
            Self::LogoutResponse(_) => MessageKind::LogoutResponse,
        }
    }

    /// Returns the message ID.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::AuthnRequest(m) => &m.id,
            Self::Response(m) => &m.id,
            Self::LogoutRequest(m) => &m.id,
            Self::LogoutResponse(m) => &m.id,
        }
    }
}

/// Discriminant of [`ProfileMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// `AuthnRequest`.
    AuthnRequest,
    /// `Response`.
    Response,
    /// `LogoutRequest`.
    LogoutRequest,
    /// `LogoutResponse`.
    LogoutResponse,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AuthnRequest => "AuthnRequest",
            Self::Response => "Response",
            Self::LogoutRequest => "LogoutRequest",
            Self::LogoutResponse => "LogoutResponse",
        };
        f.write_str(name)
    }
}

/// SAML profiles driven by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamlProfile {
    /// Web Browser SSO.
    WebBrowserSso,
    /// Single Logout.
    SingleLogout,
}

impl SamlProfile {
    /// Profile URI.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::WebBrowserSso => "urn:oasis:names:tc:SAML:2.0:profiles:SSO:browser",
            Self::SingleLogout => "urn:oasis:names:tc:SAML:2.0:profiles:SSO:logout",
        }
    }
}
