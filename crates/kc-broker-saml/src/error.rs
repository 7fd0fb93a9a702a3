//! Broker error types.
//!
//! Every failure is surfaced to the request-handling layer. Nothing here
//! substitutes a default when a resolution or validation step fails.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::ConfigError;
use crate::context::EntitySide;
use crate::metadata::{EndpointSelector, RoleKind};
use crate::storage::StorageError;
use crate::transport::TransportError;
use crate::types::MessageKind;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors raised while driving one SAML exchange leg.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The entity carries a descriptor of the other role.
    #[error("{side} entity carries a {actual} descriptor, expected {expected}")]
    RoleMismatch {
        /// Which entity was consulted.
        side: EntitySide,
        /// The requested role shape.
        expected: RoleKind,
        /// The stored role shape.
        actual: RoleKind,
    },

    /// No role descriptor is attached to the entity's metadata context.
    #[error("no role descriptor attached to the {side} entity")]
    MissingRoleDescriptor {
        /// Which entity was consulted.
        side: EntitySide,
    },

    /// Binding or index resolution found no candidate endpoint.
    #[error("no endpoint matching {requested} in {descriptor}")]
    NoMatchingEndpoint {
        /// What was asked for.
        requested: EndpointSelector,
        /// Summary of the descriptor that was searched.
        descriptor: String,
    },

    /// The SP descriptor lists no assertion consumer service at all.
    #[error("no assertion consumer services in {descriptor}")]
    NoAssertionConsumerService {
        /// Summary of the SP descriptor.
        descriptor: String,
    },

    /// Transport adapter failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An inbound message failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The inbound adapter delivered a message of the wrong kind.
    #[error("unexpected {actual} message, expected {expected}")]
    UnexpectedMessage {
        /// Kind the profile expects.
        expected: MessageKind,
        /// Kind received.
        actual: MessageKind,
    },

    /// A validated subject was already committed to this exchange.
    #[error("a validated subject is already committed to this exchange")]
    SubjectAlreadyCommitted,

    /// The exchange's request ID was already assigned.
    #[error("request id already set to {current}, refusing {attempted}")]
    RequestIdAlreadySet {
        /// Current request ID.
        current: String,
        /// Rejected request ID.
        attempted: String,
    },

    /// The metadata resolver knows no such entity.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Message storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Context tree misuse.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BrokerError {
    /// Returns the SAML status code to report for this error, if the
    /// caller answers a peer with a status.
    #[must_use]
    pub const fn status_code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::UnexpectedMessage { .. } => {
                "urn:oasis:names:tc:SAML:2.0:status:Requester"
            }
            Self::UnknownEntity(_) => "urn:oasis:names:tc:SAML:2.0:status:Requester",
            _ => "urn:oasis:names:tc:SAML:2.0:status:Responder",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Validation(ValidationError::SignatureInvalid(_))
            | Self::Validation(ValidationError::MissingSignature(_)) => 401,
            Self::Validation(_) | Self::UnexpectedMessage { .. } => 400,
            Self::UnknownEntity(_) => 404,
            Self::Transport(_) => 502,
            _ => 500,
        }
    }

    /// Returns true if the error came from checking an inbound message.
    #[must_use]
    pub const fn is_validation_failure(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::UnexpectedMessage { .. })
    }
}

/// One variant per inbound check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Structurally invalid message.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The peer reported a non-success status.
    #[error("peer returned status {code}{}", sub_code.as_deref().map(|s| format!(" ({s})")).unwrap_or_default())]
    StatusNotSuccess {
        /// Top-level status code.
        code: String,
        /// Second-level status code.
        sub_code: Option<String>,
        /// Status message.
        message: Option<String>,
    },

    /// The message or assertion issuer is not the peer.
    #[error("invalid issuer: expected {expected}, got {actual}")]
    InvalidIssuer {
        /// Peer entity ID.
        expected: String,
        /// Issuer found.
        actual: String,
    },

    /// The message was sent to a location this SP does not serve.
    #[error("invalid destination {actual}, expected one of [{expected}]")]
    InvalidDestination {
        /// Acceptable locations, comma separated.
        expected: String,
        /// Destination found.
        actual: String,
    },

    /// `InResponseTo` does not match the exchange's request.
    #[error("InResponseTo mismatch: expected {expected}, got {actual:?}")]
    InResponseToMismatch {
        /// Request ID of this exchange.
        expected: String,
        /// Value found.
        actual: Option<String>,
    },

    /// `InResponseTo` names no outstanding request (unknown or replayed).
    #[error("response to unknown or already consumed request {0}")]
    UnknownRequest(String),

    /// A signature failed verification.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// A required signature is absent.
    #[error("missing required signature on {0}")]
    MissingSignature(&'static str),

    /// Assertion or confirmation is past its `NotOnOrAfter`.
    #[error("assertion expired at {not_on_or_after}")]
    AssertionExpired {
        /// The expiry instant.
        not_on_or_after: DateTime<Utc>,
    },

    /// Assertion or confirmation is before its `NotBefore`.
    #[error("assertion not valid before {not_before}")]
    AssertionNotYetValid {
        /// The start instant.
        not_before: DateTime<Utc>,
    },

    /// No audience restriction admits this SP.
    #[error("invalid audience: expected {expected}, got [{}]", actual.join(", "))]
    InvalidAudience {
        /// SP entity ID.
        expected: String,
        /// Audiences listed by the failing restriction.
        actual: Vec<String>,
    },

    /// The response carries no assertion.
    #[error("response contains no assertion")]
    MissingAssertion,

    /// The assertion has no subject.
    #[error("assertion has no subject")]
    MissingSubject,

    /// No subject confirmation passed validation.
    #[error("no valid subject confirmation")]
    NoValidSubjectConfirmation,

    /// The assertion has no authentication statement.
    #[error("assertion has no authentication statement")]
    MissingAuthnStatement,

    /// The subject authenticated too long ago.
    #[error("authentication at {authn_instant} exceeds the allowed lifetime")]
    AuthnInstantTooOld {
        /// When the subject authenticated.
        authn_instant: DateTime<Utc>,
    },
}

/// Context tree misuse.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The node was removed from its tree.
    #[error("context node {0} is detached")]
    DetachedNode(usize),

    /// A node id from another tree, or a stale one, was used.
    #[error("context node {0} does not hold the requested subcontext")]
    KindMismatch(usize),
}
