//! Profile handlers.
//!
//! A handler drives one leg of one SAML profile against an
//! [`ExchangeContext`]: `send` builds state and dispatches an outbound
//! message, `receive` validates an inbound one and yields [`Credentials`].

mod logout;
mod web_sso;

pub use logout::SingleLogoutProfileHandler;
pub use web_sso::WebSsoProfileHandler;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::BrokerConfig;
use crate::context::ExchangeContext;
use crate::credentials::Credentials;
use crate::error::{BrokerError, BrokerResult};
use crate::metadata::Endpoint;
use crate::storage::StoredMessage;
use crate::transport::{InboundMessage, InboundTransport, OutboundMessage, OutboundTransport};
use crate::types::{MessageKind, ProfileMessage, SamlBinding, SamlProfile, SAML20P_NS};
use crate::validation::{AcceptSignedFlag, Clock, SignatureVerifier, SystemClock};

/// Contract shared by all profile handlers.
#[async_trait]
pub trait ProfileHandler: Send + Sync {
    /// Outbound message type.
    type Message: Send + 'static;

    /// Profile this handler implements.
    fn profile(&self) -> SamlProfile;

    /// Records exchange state for `message` and dispatches it.
    ///
    /// ## Errors
    ///
    /// Endpoint resolution, storage or transport failures.
    async fn send(
        &self,
        ctx: &mut ExchangeContext,
        message: Self::Message,
        relay_state: Option<String>,
    ) -> BrokerResult<()>;

    /// Reads, validates and accepts the inbound message of this leg.
    ///
    /// ## Errors
    ///
    /// Any validation failure; the context's subject state is left as it was.
    async fn receive(&self, ctx: &mut ExchangeContext) -> BrokerResult<Credentials>;
}

/// Collaborators shared by the handlers.
pub struct ProfileServices {
    /// Broker settings.
    pub config: BrokerConfig,
    /// Outbound adapter.
    pub outbound: Arc<dyn OutboundTransport>,
    /// Inbound adapter.
    pub inbound: Arc<dyn InboundTransport>,
    /// Signature verifier.
    pub verifier: Arc<dyn SignatureVerifier>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for ProfileServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileServices")
            .field("config", &self.config)
            .field("verifier", &self.verifier)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl ProfileServices {
    /// Services over the given transports, trusting adapter signature flags
    /// and reading the system clock.
    #[must_use]
    pub fn new(config: BrokerConfig, outbound: Arc<dyn OutboundTransport>, inbound: Arc<dyn InboundTransport>) -> Self {
        Self {
            config,
            outbound,
            inbound,
            verifier: Arc::new(AcceptSignedFlag),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the signature verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Stores `message` for correlation, records binding state and hands
    /// the message to the outbound adapter. The stored copy is dropped
    /// again if dispatch fails.
    async fn send_message(
        &self,
        ctx: &mut ExchangeContext,
        message: ProfileMessage,
        endpoint: &Endpoint,
        default_binding: SamlBinding,
        relay_state: Option<String>,
        sign: bool,
    ) -> BrokerResult<()> {
        let id = message.id().to_string();
        let kind = message.kind();
        let binding = endpoint.saml_binding().unwrap_or(default_binding);

        ctx.set_self_protocol(SAML20P_NS)?;
        ctx.set_peer_protocol(SAML20P_NS)?;

        let storage = ctx.message_storage().cloned();
        if let Some(storage) = &storage {
            let stored = StoredMessage::new(
                message.clone(),
                relay_state.clone(),
                self.clock.now(),
                self.config.message_ttl(),
            );
            storage.store(&id, stored).await?;
        }

        let binding_ctx = ctx.binding_mut()?;
        binding_ctx.binding = Some(binding);
        binding_ctx.relay_state.clone_from(&relay_state);
        binding_ctx.has_binding_signature = false;
        ctx.security_parameters_mut()?.sign_outbound = sign;

        let outbound = OutboundMessage {
            message,
            binding,
            destination: endpoint.location.clone(),
            relay_state,
            sign,
        };
        if let Err(err) = self.outbound.dispatch(outbound).await {
            tracing::warn!(error = %err, message_id = %id, "Failed to dispatch SAML message");
            if let Some(storage) = &storage {
                if let Err(cleanup) = storage.remove(&id).await {
                    tracing::warn!(error = %cleanup, message_id = %id, "Failed to drop undelivered message");
                }
            }
            return Err(err.into());
        }

        tracing::info!(
            message_id = %id,
            kind = %kind,
            destination = %endpoint.location,
            binding = binding.uri(),
            "Dispatched SAML message"
        );
        Ok(())
    }

    async fn receive_message(&self) -> BrokerResult<InboundMessage> {
        Ok(self.inbound.receive().await?)
    }
}

fn unexpected(expected: MessageKind, actual: &ProfileMessage) -> BrokerError {
    BrokerError::UnexpectedMessage {
        expected,
        actual: actual.kind(),
    }
}

/// Records the binding state of an accepted inbound message.
fn record_inbound_binding(ctx: &mut ExchangeContext, inbound: &InboundMessage, relay_state: Option<String>) -> BrokerResult<()> {
    let binding_ctx = ctx.binding_mut()?;
    binding_ctx.binding = inbound.binding;
    binding_ctx.relay_state = relay_state;
    binding_ctx.has_binding_signature = inbound.has_binding_signature;
    Ok(())
}
