//! Outbound message storage.
//!
//! Sent requests are kept under their ID until the matching response
//! arrives. Removing an entry on a successful receive is what makes a
//! replayed response fail: its `InResponseTo` no longer names anything.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProfileMessage;
use crate::validation::{Clock, SystemClock};

/// Errors from a message storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A message is already stored under this key.
    #[error("message already stored under key {0}")]
    DuplicateKey(String),

    /// Backend failure.
    #[error("message storage backend error: {0}")]
    Backend(String),
}

/// A sent message kept for correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// The message as sent.
    pub message: ProfileMessage,

    /// Relay state sent with it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_state: Option<String>,

    /// When it was stored.
    pub stored_at: DateTime<Utc>,

    /// When it stops being a valid correlation target.
    pub expires_at: DateTime<Utc>,
}

impl StoredMessage {
    /// Wraps `message`, valid for `ttl` from `now`.
    #[must_use]
    pub fn new(message: ProfileMessage, relay_state: Option<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            message,
            relay_state,
            stored_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Returns true once `now` reaches the expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Keyed store of sent messages.
///
/// Shared between exchanges through `Arc`; implementations synchronize
/// internally.
#[async_trait]
pub trait MessageStorage: Send + Sync + Debug {
    /// Stores `message` under `key`.
    ///
    /// ## Errors
    ///
    /// Fails if the key is taken or the backend fails.
    async fn store(&self, key: &str, message: StoredMessage) -> Result<(), StorageError>;

    /// Returns the unexpired message under `key` without removing it.
    ///
    /// ## Errors
    ///
    /// Fails if the backend fails.
    async fn retrieve(&self, key: &str) -> Result<Option<StoredMessage>, StorageError>;

    /// Removes and returns the unexpired message under `key`.
    ///
    /// ## Errors
    ///
    /// Fails if the backend fails.
    async fn remove(&self, key: &str) -> Result<Option<StoredMessage>, StorageError>;

    /// Drops expired entries and returns how many were dropped.
    ///
    /// ## Errors
    ///
    /// Fails if the backend fails.
    async fn purge_expired(&self) -> Result<usize, StorageError> {
        Ok(0)
    }
}

/// Process-local [`MessageStorage`].
#[derive(Debug)]
pub struct InMemoryMessageStorage {
    messages: DashMap<String, StoredMessage>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryMessageStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageStorage {
    /// Creates an empty store on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store on the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            messages: DashMap::new(),
            clock,
        }
    }

    /// Number of entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[async_trait]
impl MessageStorage for InMemoryMessageStorage {
    async fn store(&self, key: &str, message: StoredMessage) -> Result<(), StorageError> {
        use dashmap::mapref::entry::Entry;

        match self.messages.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired(self.clock.now()) {
                    return Err(StorageError::DuplicateKey(key.to_string()));
                }
                occupied.insert(message);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(message);
            }
        }
        tracing::debug!(key = %key, "Stored outbound message");
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<StoredMessage>, StorageError> {
        let now = self.clock.now();
        let found = self.messages.get(key).map(|entry| entry.value().clone());
        match found {
            Some(message) if message.is_expired(now) => {
                self.messages.remove_if(key, |_, m| m.is_expired(now));
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn remove(&self, key: &str) -> Result<Option<StoredMessage>, StorageError> {
        let now = self.clock.now();
        Ok(self
            .messages
            .remove(key)
            .map(|(_, message)| message)
            .filter(|message| !message.is_expired(now)))
    }

    async fn purge_expired(&self) -> Result<usize, StorageError> {
        let now = self.clock.now();
        let before = self.messages.len();
        self.messages.retain(|_, message| !message.is_expired(now));
        let purged = before.saturating_sub(self.messages.len());
        if purged > 0 {
            tracing::debug!(purged, "Purged expired outbound messages");
        }
        Ok(purged)
    }
}
