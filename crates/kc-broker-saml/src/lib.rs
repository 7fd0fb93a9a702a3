//! SAML 2.0 identity brokering for Keycloak Rust.
//!
//! This crate holds the Service Provider side of a SAML exchange with an
//! external Identity Provider:
//!
//! - **Exchange context** - A per-exchange tree of typed subcontexts (entities,
//!   metadata, endpoints, binding, security parameters) plus the subject state
//!   accumulated while validating a response
//! - **Endpoint resolution** - SSO, ACS and SLO selection over role descriptors
//! - **Profile handlers** - Web Browser SSO and Single Logout send/receive legs
//! - **Validation** - Status, issuer, destination, `InResponseTo`, signature,
//!   conditions and subject confirmation checks
//!
//! XML, signatures and HTTP bindings are left to the transport adapters and
//! the [`SignatureVerifier`](validation::SignatureVerifier) plugged in by the
//! caller.
//!
//! # Architecture
//!
//! - [`context`] - Context tree and [`ExchangeContext`]
//! - [`metadata`] - Role descriptors, endpoint resolution, metadata resolver
//! - [`profile`] - [`ProfileHandler`] contract and the SSO/SLO handlers
//! - [`storage`] - Outbound message storage for correlation and replay checks
//! - [`transport`] - Inbound/outbound adapter contracts
//! - [`validation`] - Response validation, clocks and signature verification
//! - [`types`] - SAML protocol object model
//! - [`config`] - Broker settings
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kc_broker_saml::{
//!     AuthnRequest, BrokerConfig, ExchangeContext, InMemoryMessageStorage, ProfileHandler,
//!     ProfileServices, WebSsoProfileHandler,
//! };
//!
//! let services = Arc::new(ProfileServices::new(BrokerConfig::from_env()?, outbound, inbound));
//! let sso = WebSsoProfileHandler::new(services);
//!
//! let mut ctx = ExchangeContext::new().with_message_storage(Arc::new(InMemoryMessageStorage::new()));
//! ctx.load_self_metadata(&resolver, "https://kc.example.com/realms/acme").await?;
//! ctx.load_peer_metadata(&resolver, "https://idp.example.com").await?;
//! sso.send(&mut ctx, AuthnRequest::new("https://kc.example.com/realms/acme"), None).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod metadata;
pub mod profile;
pub mod storage;
pub mod transport;
pub mod types;
pub mod validation;

pub use config::{BrokerConfig, ConfigError};
pub use context::{EntitySide, ExchangeContext, ValidatedSubject};
pub use credentials::Credentials;
pub use error::{BrokerError, BrokerResult, ContextError, ValidationError};
pub use metadata::{InMemoryMetadataResolver, MetadataResolver};
pub use profile::{ProfileHandler, ProfileServices, SingleLogoutProfileHandler, WebSsoProfileHandler};
pub use storage::{InMemoryMessageStorage, MessageStorage, StorageError, StoredMessage};
pub use transport::{InboundTransport, OutboundTransport, TransportError};
pub use types::*;
