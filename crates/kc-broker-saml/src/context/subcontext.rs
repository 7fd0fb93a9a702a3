//! The closed set of subcontext kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metadata::{Endpoint, RoleDescriptor};
use crate::types::{NameId, SamlBinding};

/// Discriminant of a context node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextKind {
    /// The exchange root.
    Root,
    /// The local entity (this SP).
    SelfEntity,
    /// The remote entity (the IdP).
    PeerEntity,
    /// Role metadata of an entity.
    Metadata,
    /// Selected endpoint of an entity.
    Endpoint,
    /// Protocol spoken by an entity.
    Protocol,
    /// Binding and relay state of the message.
    Binding,
    /// Outbound signing parameters.
    SecurityParameters,
    /// Name identifier requested or received.
    SubjectNameIdentifier,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Root => "root",
            Self::SelfEntity => "self-entity",
            Self::PeerEntity => "peer-entity",
            Self::Metadata => "metadata",
            Self::Endpoint => "endpoint",
            Self::Protocol => "protocol",
            Self::Binding => "binding",
            Self::SecurityParameters => "security-parameters",
            Self::SubjectNameIdentifier => "subject-name-identifier",
        };
        f.write_str(name)
    }
}

/// Local entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelfEntityContext {
    /// Entity ID of this SP.
    pub entity_id: Option<String>,
}

/// Remote entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerEntityContext {
    /// Entity ID of the IdP.
    pub entity_id: Option<String>,
}

/// Metadata attached to an entity.
#[derive(Debug, Clone, Default)]
pub struct MetadataContext {
    /// The entity's role descriptor.
    pub role_descriptor: Option<RoleDescriptor>,
}

/// Endpoint selected for an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointContext {
    /// Selected endpoint.
    pub endpoint: Option<Endpoint>,
}

/// Protocol spoken by an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolContext {
    /// Protocol namespace URI.
    pub protocol: Option<String>,
}

/// Binding state of the current message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingContext {
    /// Binding the message travels over.
    pub binding: Option<SamlBinding>,
    /// Opaque relay state.
    pub relay_state: Option<String>,
    /// Whether the binding itself carried a signature (e.g. Redirect query signing).
    pub has_binding_signature: bool,
}

/// Outbound signing parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityParametersContext {
    /// Sign outbound messages.
    pub sign_outbound: bool,
    /// Signature algorithm URI.
    pub signature_algorithm: Option<String>,
}

/// Name identifier of the exchange's subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectNameIdentifierContext {
    /// The name ID.
    pub name_id: Option<NameId>,
}

/// Payload of a context node.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum ContextData {
    Root,
    SelfEntity(SelfEntityContext),
    PeerEntity(PeerEntityContext),
    Metadata(MetadataContext),
    Endpoint(EndpointContext),
    Protocol(ProtocolContext),
    Binding(BindingContext),
    SecurityParameters(SecurityParametersContext),
    SubjectNameIdentifier(SubjectNameIdentifierContext),
}

impl ContextData {
    /// Returns the kind of this payload.
    #[must_use]
    pub const fn kind(&self) -> ContextKind {
        match self {
            Self::Root => ContextKind::Root,
            Self::SelfEntity(_) => ContextKind::SelfEntity,
            Self::PeerEntity(_) => ContextKind::PeerEntity,
            Self::Metadata(_) => ContextKind::Metadata,
            Self::Endpoint(_) => ContextKind::Endpoint,
            Self::Protocol(_) => ContextKind::Protocol,
            Self::Binding(_) => ContextKind::Binding,
            Self::SecurityParameters(_) => ContextKind::SecurityParameters,
            Self::SubjectNameIdentifier(_) => ContextKind::SubjectNameIdentifier,
        }
    }
}

/// A typed subcontext that can be attached to a [`ContextTree`](super::ContextTree).
///
/// Implemented for each payload struct in this module; the set is closed.
pub trait Subcontext: Default + Send + Sync + 'static {
    /// Node kind holding this payload.
    const KIND: ContextKind;

    /// Wraps the payload.
    fn into_data(self) -> ContextData;

    /// Borrows the payload if `data` is of this kind.
    fn from_data(data: &ContextData) -> Option<&Self>;

    /// Mutably borrows the payload if `data` is of this kind.
    fn from_data_mut(data: &mut ContextData) -> Option<&mut Self>;
}

macro_rules! subcontext {
    ($ty:ty, $variant:ident) => {
        impl Subcontext for $ty {
            const KIND: ContextKind = ContextKind::$variant;

            fn into_data(self) -> ContextData {
                ContextData::$variant(self)
            }

            fn from_data(data: &ContextData) -> Option<&Self> {
                match data {
                    ContextData::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_data_mut(data: &mut ContextData) -> Option<&mut Self> {
                match data {
                    ContextData::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

subcontext!(SelfEntityContext, SelfEntity);
subcontext!(PeerEntityContext, PeerEntity);
subcontext!(MetadataContext, Metadata);
subcontext!(EndpointContext, Endpoint);
subcontext!(ProtocolContext, Protocol);
subcontext!(BindingContext, Binding);
subcontext!(SecurityParametersContext, SecurityParameters);
subcontext!(SubjectNameIdentifierContext, SubjectNameIdentifier);
