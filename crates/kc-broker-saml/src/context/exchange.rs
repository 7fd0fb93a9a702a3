//! Per-exchange state.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, BrokerResult};
use crate::metadata::{
    resolve_assertion_consumer_service, resolve_single_logout_service, resolve_single_sign_on_service,
    Endpoint, IdpSsoDescriptor, IndexedEndpoint, MetadataResolver, RoleDescriptor, RoleKind, SpSsoDescriptor,
};
use crate::storage::MessageStorage;
use crate::types::{Assertion, SubjectConfirmation, SubjectIdentifier};

use super::subcontext::{
    BindingContext, EndpointContext, MetadataContext, PeerEntityContext, ProtocolContext,
    SecurityParametersContext, SelfEntityContext, Subcontext, SubjectNameIdentifierContext,
};
use super::tree::{ContextTree, NodeId};

/// Which side of the exchange an entity is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntitySide {
    /// This SP.
    Local,
    /// The IdP.
    Peer,
}

impl fmt::Display for EntitySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("self"),
            Self::Peer => f.write_str("peer"),
        }
    }
}

/// Outcome of a fully validated authentication response.
#[derive(Debug, Clone)]
pub struct ValidatedSubject {
    /// The assertion that passed every check.
    pub assertion: Assertion,
    /// Subject identifier taken from the assertion subject, or from a
    /// confirmation when the subject names none.
    pub base_subject_id: SubjectIdentifier,
    /// Confirmations that passed validation, in document order.
    pub confirmations: Vec<SubjectConfirmation>,
}

/// State of one SAML exchange leg.
///
/// Owned by the request handling the leg. Not shared; mutation goes
/// through `&mut self`.
#[derive(Debug)]
pub struct ExchangeContext {
    tree: ContextTree,
    request_id: Option<String>,
    trusted_assertion: Option<Assertion>,
    base_subject_id: Option<SubjectIdentifier>,
    subject_confirmations: Vec<SubjectConfirmation>,
    message_storage: Option<Arc<dyn MessageStorage>>,
    subject_committed: bool,
}

impl Default for ExchangeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: ContextTree::new(),
            request_id: None,
            trusted_assertion: None,
            base_subject_id: None,
            subject_confirmations: Vec::new(),
            message_storage: None,
            subject_committed: false,
        }
    }

    /// Attaches shared message storage.
    #[must_use]
    pub fn with_message_storage(mut self, storage: Arc<dyn MessageStorage>) -> Self {
        self.message_storage = Some(storage);
        self
    }

    /// Returns the message storage, if attached.
    #[must_use]
    pub fn message_storage(&self) -> Option<&Arc<dyn MessageStorage>> {
        self.message_storage.as_ref()
    }

    /// Replaces the message storage.
    pub fn set_message_storage(&mut self, storage: Option<Arc<dyn MessageStorage>>) {
        self.message_storage = storage;
    }

    /// The subcontext tree.
    #[must_use]
    pub const fn tree(&self) -> &ContextTree {
        &self.tree
    }

    /// The subcontext tree, mutably.
    pub fn tree_mut(&mut self) -> &mut ContextTree {
        &mut self.tree
    }

    /// ID of the request this exchange sent or answers.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Records the request ID. Setting the same value again is a no-op.
    ///
    /// ## Errors
    ///
    /// `RequestIdAlreadySet` if a different ID is already recorded.
    pub fn set_request_id(&mut self, request_id: impl Into<String>) -> BrokerResult<()> {
        let request_id = request_id.into();
        match &self.request_id {
            Some(current) if *current != request_id => Err(BrokerError::RequestIdAlreadySet {
                current: current.clone(),
                attempted: request_id,
            }),
            Some(_) => Ok(()),
            None => {
                self.request_id = Some(request_id);
                Ok(())
            }
        }
    }

    /// Returns the local entity node, creating it on first use.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn self_entity(&mut self) -> BrokerResult<NodeId> {
        let root = self.tree.root();
        Ok(self.tree.ensure_child::<SelfEntityContext>(root)?)
    }

    /// Returns the peer entity node, creating it on first use.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn peer_entity(&mut self) -> BrokerResult<NodeId> {
        let root = self.tree.root();
        Ok(self.tree.ensure_child::<PeerEntityContext>(root)?)
    }

    fn entity(&mut self, side: EntitySide) -> BrokerResult<NodeId> {
        match side {
            EntitySide::Local => self.self_entity(),
            EntitySide::Peer => self.peer_entity(),
        }
    }

    fn find_entity(&self, side: EntitySide) -> BrokerResult<Option<NodeId>> {
        let root = self.tree.root();
        let found = match side {
            EntitySide::Local => self.tree.find_child::<SelfEntityContext>(root)?,
            EntitySide::Peer => self.tree.find_child::<PeerEntityContext>(root)?,
        };
        Ok(found)
    }

    fn entity_child<T: Subcontext>(&self, side: EntitySide) -> BrokerResult<Option<&T>> {
        let Some(entity) = self.find_entity(side)? else {
            return Ok(None);
        };
        match self.tree.find_child::<T>(entity)? {
            Some(id) => Ok(Some(self.tree.get::<T>(id)?)),
            None => Ok(None),
        }
    }

    fn entity_child_mut<T: Subcontext>(&mut self, side: EntitySide) -> BrokerResult<&mut T> {
        let entity = self.entity(side)?;
        let id = self.tree.ensure_child::<T>(entity)?;
        Ok(self.tree.get_mut::<T>(id)?)
    }

    /// Entity ID of this SP, if known.
    #[must_use]
    pub fn self_entity_id(&self) -> Option<&str> {
        let root = self.tree.root();
        let id = self.tree.find_child::<SelfEntityContext>(root).ok().flatten()?;
        self.tree.get::<SelfEntityContext>(id).ok()?.entity_id.as_deref()
    }

    /// Entity ID of the IdP, if known.
    #[must_use]
    pub fn peer_entity_id(&self) -> Option<&str> {
        let root = self.tree.root();
        let id = self.tree.find_child::<PeerEntityContext>(root).ok().flatten()?;
        self.tree.get::<PeerEntityContext>(id).ok()?.entity_id.as_deref()
    }

    /// Sets the entity ID of this SP.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn set_self_entity_id(&mut self, entity_id: impl Into<String>) -> BrokerResult<()> {
        let id = self.self_entity()?;
        self.tree.get_mut::<SelfEntityContext>(id)?.entity_id = Some(entity_id.into());
        Ok(())
    }

    /// Sets the entity ID of the IdP.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn set_peer_entity_id(&mut self, entity_id: impl Into<String>) -> BrokerResult<()> {
        let id = self.peer_entity()?;
        self.tree.get_mut::<PeerEntityContext>(id)?.entity_id = Some(entity_id.into());
        Ok(())
    }

    fn set_role_descriptor(&mut self, side: EntitySide, descriptor: RoleDescriptor) -> BrokerResult<()> {
        let entity_id = descriptor.entity_id().to_string();
        self.entity_child_mut::<MetadataContext>(side)?.role_descriptor = Some(descriptor);

        let known = match side {
            EntitySide::Local => self.self_entity_id().is_some(),
            EntitySide::Peer => self.peer_entity_id().is_some(),
        };
        if !known {
            match side {
                EntitySide::Local => self.set_self_entity_id(entity_id)?,
                EntitySide::Peer => self.set_peer_entity_id(entity_id)?,
            }
        }
        Ok(())
    }

    /// Attaches this SP's role descriptor. Also records its entity ID when
    /// none is set.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn set_self_role_descriptor(&mut self, descriptor: impl Into<RoleDescriptor>) -> BrokerResult<()> {
        self.set_role_descriptor(EntitySide::Local, descriptor.into())
    }

    /// Attaches the IdP's role descriptor. Also records its entity ID when
    /// none is set.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn set_peer_role_descriptor(&mut self, descriptor: impl Into<RoleDescriptor>) -> BrokerResult<()> {
        self.set_role_descriptor(EntitySide::Peer, descriptor.into())
    }

    /// Returns the role descriptor attached to `side`.
    ///
    /// ## Errors
    ///
    /// `MissingRoleDescriptor` when none is attached.
    pub fn role_descriptor(&self, side: EntitySide) -> BrokerResult<&RoleDescriptor> {
        self.entity_child::<MetadataContext>(side)?
            .and_then(|md| md.role_descriptor.as_ref())
            .ok_or(BrokerError::MissingRoleDescriptor { side })
    }

    /// Returns this SP's descriptor.
    ///
    /// ## Errors
    ///
    /// `MissingRoleDescriptor` when none is attached, `RoleMismatch` when
    /// the attached descriptor is IdP-shaped.
    pub fn sp_role_descriptor(&self) -> BrokerResult<&SpSsoDescriptor> {
        let descriptor = self.role_descriptor(EntitySide::Local)?;
        descriptor.as_service_provider().ok_or(BrokerError::RoleMismatch {
            side: EntitySide::Local,
            expected: RoleKind::ServiceProvider,
            actual: descriptor.kind(),
        })
    }

    /// Returns the IdP's descriptor.
    ///
    /// ## Errors
    ///
    /// `MissingRoleDescriptor` when none is attached, `RoleMismatch` when
    /// the attached descriptor is SP-shaped.
    pub fn idp_role_descriptor(&self) -> BrokerResult<&IdpSsoDescriptor> {
        let descriptor = self.role_descriptor(EntitySide::Peer)?;
        descriptor.as_identity_provider().ok_or(BrokerError::RoleMismatch {
            side: EntitySide::Peer,
            expected: RoleKind::IdentityProvider,
            actual: descriptor.kind(),
        })
    }

    /// Resolves the IdP's descriptor of `entity_id` and attaches it to the
    /// peer entity.
    ///
    /// ## Errors
    ///
    /// `UnknownEntity` when the resolver has no IdP descriptor for it.
    pub async fn load_peer_metadata(&mut self, resolver: &dyn MetadataResolver, entity_id: &str) -> BrokerResult<()> {
        let descriptor = resolver
            .resolve(entity_id, RoleKind::IdentityProvider)
            .await?
            .ok_or_else(|| BrokerError::UnknownEntity(entity_id.to_string()))?;
        self.set_peer_entity_id(entity_id)?;
        self.set_peer_role_descriptor(descriptor)?;
        tracing::debug!(entity_id = %entity_id, "Loaded peer metadata");
        Ok(())
    }

    /// Resolves this SP's descriptor of `entity_id` and attaches it to the
    /// local entity.
    ///
    /// ## Errors
    ///
    /// `UnknownEntity` when the resolver has no SP descriptor for it.
    pub async fn load_self_metadata(&mut self, resolver: &dyn MetadataResolver, entity_id: &str) -> BrokerResult<()> {
        let descriptor = resolver
            .resolve(entity_id, RoleKind::ServiceProvider)
            .await?
            .ok_or_else(|| BrokerError::UnknownEntity(entity_id.to_string()))?;
        self.set_self_entity_id(entity_id)?;
        self.set_self_role_descriptor(descriptor)?;
        tracing::debug!(entity_id = %entity_id, "Loaded self metadata");
        Ok(())
    }

    /// Records the endpoint selected on this SP.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn set_self_endpoint(&mut self, endpoint: Endpoint) -> BrokerResult<()> {
        self.entity_child_mut::<EndpointContext>(EntitySide::Local)?.endpoint = Some(endpoint);
        Ok(())
    }

    /// Records the endpoint selected on the IdP.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn set_peer_endpoint(&mut self, endpoint: Endpoint) -> BrokerResult<()> {
        self.entity_child_mut::<EndpointContext>(EntitySide::Peer)?.endpoint = Some(endpoint);
        Ok(())
    }

    /// Endpoint selected on this SP.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn self_endpoint(&self) -> BrokerResult<Option<&Endpoint>> {
        Ok(self
            .entity_child::<EndpointContext>(EntitySide::Local)?
            .and_then(|ep| ep.endpoint.as_ref()))
    }

    /// Endpoint selected on the IdP.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn peer_endpoint(&self) -> BrokerResult<Option<&Endpoint>> {
        Ok(self
            .entity_child::<EndpointContext>(EntitySide::Peer)?
            .and_then(|ep| ep.endpoint.as_ref()))
    }

    /// Records the protocol spoken by this SP.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn set_self_protocol(&mut self, protocol: impl Into<String>) -> BrokerResult<()> {
        self.entity_child_mut::<ProtocolContext>(EntitySide::Local)?.protocol = Some(protocol.into());
        Ok(())
    }

    /// Records the protocol spoken by the IdP.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn set_peer_protocol(&mut self, protocol: impl Into<String>) -> BrokerResult<()> {
        self.entity_child_mut::<ProtocolContext>(EntitySide::Peer)?.protocol = Some(protocol.into());
        Ok(())
    }

    /// Protocol spoken by this SP.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn self_protocol(&self) -> BrokerResult<Option<&str>> {
        Ok(self
            .entity_child::<ProtocolContext>(EntitySide::Local)?
            .and_then(|p| p.protocol.as_deref()))
    }

    /// Protocol spoken by the IdP.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn peer_protocol(&self) -> BrokerResult<Option<&str>> {
        Ok(self
            .entity_child::<ProtocolContext>(EntitySide::Peer)?
            .and_then(|p| p.protocol.as_deref()))
    }

    /// First SSO service of the IdP using `binding`.
    ///
    /// ## Errors
    ///
    /// Descriptor lookup errors, or `NoMatchingEndpoint`.
    pub fn idp_single_sign_on_service(&self, binding: &str) -> BrokerResult<&Endpoint> {
        resolve_single_sign_on_service(self.idp_role_descriptor()?, binding)
    }

    /// Assertion consumer service of this SP, by index or default.
    ///
    /// ## Errors
    ///
    /// Descriptor lookup errors, `NoMatchingEndpoint` or
    /// `NoAssertionConsumerService`.
    pub fn sp_assertion_consumer_service(&self, index: Option<&str>) -> BrokerResult<&IndexedEndpoint> {
        resolve_assertion_consumer_service(self.sp_role_descriptor()?, index)
    }

    /// First single logout service of the IdP using `binding`.
    ///
    /// ## Errors
    ///
    /// Descriptor lookup errors, or `NoMatchingEndpoint`.
    pub fn idp_single_logout_service(&self, binding: &str) -> BrokerResult<&Endpoint> {
        resolve_single_logout_service(self.role_descriptor(EntitySide::Peer)?, binding)
    }

    fn root_child<T: Subcontext>(&self) -> BrokerResult<Option<&T>> {
        let root = self.tree.root();
        match self.tree.find_child::<T>(root)? {
            Some(id) => Ok(Some(self.tree.get::<T>(id)?)),
            None => Ok(None),
        }
    }

    fn root_child_mut<T: Subcontext>(&mut self) -> BrokerResult<&mut T> {
        let root = self.tree.root();
        let id = self.tree.ensure_child::<T>(root)?;
        Ok(self.tree.get_mut::<T>(id)?)
    }

    /// Binding state, if any was recorded.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn binding(&self) -> BrokerResult<Option<&BindingContext>> {
        self.root_child::<BindingContext>()
    }

    /// Binding state, created on first use.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn binding_mut(&mut self) -> BrokerResult<&mut BindingContext> {
        self.root_child_mut::<BindingContext>()
    }

    /// Signing parameters, if any were recorded.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn security_parameters(&self) -> BrokerResult<Option<&SecurityParametersContext>> {
        self.root_child::<SecurityParametersContext>()
    }

    /// Signing parameters, created on first use.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn security_parameters_mut(&mut self) -> BrokerResult<&mut SecurityParametersContext> {
        self.root_child_mut::<SecurityParametersContext>()
    }

    /// Subject name identifier, if any was recorded.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn subject_name_identifier(&self) -> BrokerResult<Option<&SubjectNameIdentifierContext>> {
        self.root_child::<SubjectNameIdentifierContext>()
    }

    /// Subject name identifier, created on first use.
    ///
    /// ## Errors
    ///
    /// Fails only on a corrupted tree.
    pub fn subject_name_identifier_mut(&mut self) -> BrokerResult<&mut SubjectNameIdentifierContext> {
        self.root_child_mut::<SubjectNameIdentifierContext>()
    }

    /// The assertion accepted for this exchange.
    #[must_use]
    pub const fn trusted_assertion(&self) -> Option<&Assertion> {
        self.trusted_assertion.as_ref()
    }

    /// Replaces the trusted assertion.
    pub fn set_trusted_assertion(&mut self, assertion: Option<Assertion>) {
        self.trusted_assertion = assertion;
    }

    /// Identifier of the authenticated subject.
    #[must_use]
    pub const fn base_subject_id(&self) -> Option<&SubjectIdentifier> {
        self.base_subject_id.as_ref()
    }

    /// Replaces the subject identifier.
    pub fn set_base_subject_id(&mut self, id: Option<SubjectIdentifier>) {
        self.base_subject_id = id;
    }

    /// Validated subject confirmations; empty until set.
    #[must_use]
    pub fn subject_confirmations(&self) -> &[SubjectConfirmation] {
        &self.subject_confirmations
    }

    /// Mutable access to the confirmations list.
    pub fn subject_confirmations_mut(&mut self) -> &mut Vec<SubjectConfirmation> {
        &mut self.subject_confirmations
    }

    /// Replaces the confirmations list.
    pub fn set_subject_confirmations(&mut self, confirmations: Vec<SubjectConfirmation>) {
        self.subject_confirmations = confirmations;
    }

    /// Returns true once a validated subject was committed.
    #[must_use]
    pub const fn is_subject_committed(&self) -> bool {
        self.subject_committed
    }

    /// Stores a validated subject in one step.
    ///
    /// ## Errors
    ///
    /// `SubjectAlreadyCommitted` on a second commit; the first one stays.
    pub fn commit_validated_subject(&mut self, subject: ValidatedSubject) -> BrokerResult<()> {
        if self.subject_committed {
            return Err(BrokerError::SubjectAlreadyCommitted);
        }
        let ValidatedSubject {
            assertion,
            base_subject_id,
            confirmations,
        } = subject;

        tracing::debug!(
            subject = %base_subject_id,
            assertion_id = %assertion.id,
            confirmations = confirmations.len(),
            "Committed validated subject"
        );

        self.trusted_assertion = Some(assertion);
        self.base_subject_id = Some(base_subject_id);
        self.subject_confirmations = confirmations;
        self.subject_committed = true;
        Ok(())
    }
}
