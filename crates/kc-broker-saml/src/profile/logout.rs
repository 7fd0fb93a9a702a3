//! Single Logout: `LogoutRequest` out, `LogoutResponse` in.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ExchangeContext;
use crate::credentials::Credentials;
use crate::error::{BrokerResult, ValidationError};
use crate::storage::StoredMessage;
use crate::types::{LogoutRequest, LogoutResponse, MessageKind, ProfileMessage, SamlProfile};
use crate::validation::{check_issuer, check_status};

use super::{record_inbound_binding, unexpected, ProfileHandler, ProfileServices};

/// SP-initiated side of the Single Logout profile.
#[derive(Debug, Clone)]
pub struct SingleLogoutProfileHandler {
    services: Arc<ProfileServices>,
}

impl SingleLogoutProfileHandler {
    /// Creates a handler over shared services.
    #[must_use]
    pub const fn new(services: Arc<ProfileServices>) -> Self {
        Self { services }
    }

    /// Checks `response` and returns the logout request it answers, if
    /// message storage holds it.
    async fn validate(&self, ctx: &ExchangeContext, response: &LogoutResponse) -> BrokerResult<Option<LogoutRequest>> {
        check_status(&response.status)?;
        let idp = ctx.idp_role_descriptor()?;
        check_issuer(&idp.entity_id, response.issuer.as_deref())?;

        let Some(request_id) = response.in_response_to.as_deref() else {
            return Err(ValidationError::Malformed("LogoutResponse without InResponseTo".to_string()).into());
        };
        if let Some(expected) = ctx.request_id() {
            if expected != request_id {
                return Err(ValidationError::InResponseToMismatch {
                    expected: expected.to_string(),
                    actual: Some(request_id.to_string()),
                }
                .into());
            }
        }

        let Some(storage) = ctx.message_storage() else {
            return Ok(None);
        };
        match storage.retrieve(request_id).await? {
            Some(StoredMessage {
                message: ProfileMessage::LogoutRequest(request),
                ..
            }) => Ok(Some(request)),
            _ => Err(ValidationError::UnknownRequest(request_id.to_string()).into()),
        }
    }
}

#[async_trait]
impl ProfileHandler for SingleLogoutProfileHandler {
    type Message = LogoutRequest;

    fn profile(&self) -> SamlProfile {
        SamlProfile::SingleLogout
    }

    async fn send(
        &self,
        ctx: &mut ExchangeContext,
        mut request: LogoutRequest,
        relay_state: Option<String>,
    ) -> BrokerResult<()> {
        let config = &self.services.config;
        let endpoint = ctx.idp_single_logout_service(config.slo_binding.uri())?.clone();
        ctx.set_request_id(request.id.clone())?;
        ctx.set_peer_endpoint(endpoint.clone())?;
        tracing::debug!(
            request_id = %request.id,
            location = %endpoint.location,
            "Resolved IdP SLO endpoint"
        );

        request.destination = Some(endpoint.location.clone());
        let sign = ctx.security_parameters()?.is_some_and(|s| s.sign_outbound);

        self.services
            .send_message(
                ctx,
                ProfileMessage::LogoutRequest(request),
                &endpoint,
                config.slo_binding,
                relay_state,
                sign,
            )
            .await
    }

    async fn receive(&self, ctx: &mut ExchangeContext) -> BrokerResult<Credentials> {
        let inbound = self.services.receive_message().await?;
        let response = match &inbound.message {
            ProfileMessage::LogoutResponse(response) => response,
            other => return Err(unexpected(MessageKind::LogoutResponse, other)),
        };

        let request = match self.validate(ctx, response).await {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(error = %err, response_id = %response.id, "Rejected SAML logout response");
                return Err(err);
            }
        };

        let subject = request
            .as_ref()
            .map(|r| r.subject.clone())
            .or_else(|| ctx.base_subject_id().cloned())
            .ok_or_else(|| {
                ValidationError::UnknownRequest(response.in_response_to.clone().unwrap_or_default())
            })?;

        // Consuming the stored request is what rejects a replayed response.
        let mut stored_relay_state = None;
        if let (Some(storage), Some(request_id)) = (ctx.message_storage().cloned(), response.in_response_to.as_deref()) {
            let stored = storage
                .remove(request_id)
                .await?
                .ok_or_else(|| ValidationError::UnknownRequest(request_id.to_string()))?;
            stored_relay_state = stored.relay_state;
        }

        let issuer = response.issuer.clone().unwrap_or_else(|| {
            ctx.peer_entity_id().unwrap_or_default().to_string()
        });
        let relay_state = inbound.relay_state.clone().or(stored_relay_state);
        record_inbound_binding(ctx, &inbound, relay_state.clone())?;

        let mut credentials = Credentials::for_subject(subject, issuer);
        credentials.session_index = request.and_then(|r| r.session_indexes.into_iter().next());
        credentials.relay_state = relay_state;

        tracing::info!(subject = %credentials.subject, "Completed SAML logout");
        Ok(credentials)
    }
}
