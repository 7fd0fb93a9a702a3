//! SAML metadata model and endpoint resolution.
//!
//! Fetching, parsing and refreshing metadata happens elsewhere; the broker
//! only sees resolved [`RoleDescriptor`]s through a [`MetadataResolver`].

mod descriptor;
mod resolve;

pub use descriptor::*;
pub use resolve::*;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::BrokerResult;

/// Source of role descriptors.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Resolves the descriptor of `entity_id` in `role`.
    ///
    /// Returns `Ok(None)` when the entity or role is unknown.
    ///
    /// ## Errors
    ///
    /// Returns an error if the metadata source fails.
    async fn resolve(&self, entity_id: &str, role: RoleKind) -> BrokerResult<Option<RoleDescriptor>>;
}

/// Resolver over descriptors registered in memory.
#[derive(Debug, Default)]
pub struct InMemoryMetadataResolver {
    descriptors: DashMap<(String, RoleKind), RoleDescriptor>,
}

impl InMemoryMetadataResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor, replacing any previous one for the same
    /// entity and role.
    pub fn register(&self, descriptor: impl Into<RoleDescriptor>) {
        let descriptor = descriptor.into();
        let key = (descriptor.entity_id().to_string(), descriptor.kind());
        self.descriptors.insert(key, descriptor);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(self, descriptor: impl Into<RoleDescriptor>) -> Self {
        self.register(descriptor);
        self
    }

    /// Number of registered descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[async_trait]
impl MetadataResolver for InMemoryMetadataResolver {
    async fn resolve(&self, entity_id: &str, role: RoleKind) -> BrokerResult<Option<RoleDescriptor>> {
        Ok(self
            .descriptors
            .get(&(entity_id.to_string(), role))
            .map(|entry| entry.value().clone()))
    }
}
