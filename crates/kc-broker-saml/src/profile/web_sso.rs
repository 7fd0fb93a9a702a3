//! Web Browser SSO: `AuthnRequest` out, `Response` in.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{ExchangeContext, ValidatedSubject};
use crate::credentials::Credentials;
use crate::error::{BrokerError, BrokerResult, ValidationError};
use crate::metadata::Endpoint;
use crate::storage::StoredMessage;
use crate::types::{AuthnRequest, MessageKind, ProfileMessage, Response, SamlProfile};
use crate::validation::ResponseValidator;

use super::{record_inbound_binding, unexpected, ProfileHandler, ProfileServices};

/// SP side of the Web Browser SSO profile.
#[derive(Debug, Clone)]
pub struct WebSsoProfileHandler {
    services: Arc<ProfileServices>,
}

impl WebSsoProfileHandler {
    /// Creates a handler over shared services.
    #[must_use]
    pub const fn new(services: Arc<ProfileServices>) -> Self {
        Self { services }
    }

    /// This SP's default ACS when the request names none. Without SP
    /// metadata the request is left as is.
    fn default_assertion_consumer_service(
        ctx: &ExchangeContext,
        request: &AuthnRequest,
    ) -> BrokerResult<Option<Endpoint>> {
        if request.assertion_consumer_service_url.is_some() || request.assertion_consumer_service_index.is_some() {
            return Ok(None);
        }
        match ctx.sp_assertion_consumer_service(None) {
            Ok(acs) => Ok(Some(acs.endpoint.clone())),
            Err(BrokerError::MissingRoleDescriptor { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Runs every check against `response` without touching `ctx`.
    async fn validate(&self, ctx: &ExchangeContext, response: &Response) -> BrokerResult<ValidatedSubject> {
        let config = &self.services.config;
        let validator = ResponseValidator {
            sp: ctx.sp_role_descriptor()?,
            idp: ctx.idp_role_descriptor()?,
            verifier: self.services.verifier.as_ref(),
            now: self.services.clock.now(),
            skew: config.accepted_skew(),
            max_authentication_lifetime: config.max_authentication_lifetime(),
            require_signed_assertions: config.require_signed_assertions,
            request_id: ctx.request_id(),
        };

        validator.validate_envelope(response)?;

        if let (Some(storage), Some(request_id)) = (ctx.message_storage(), response.in_response_to.as_deref()) {
            let outstanding = storage.retrieve(request_id).await?;
            if !matches!(
                outstanding,
                Some(StoredMessage {
                    message: ProfileMessage::AuthnRequest(_),
                    ..
                })
            ) {
                return Err(ValidationError::UnknownRequest(request_id.to_string()).into());
            }
        }

        Ok(validator.validate_assertions(response)?)
    }
}

#[async_trait]
impl ProfileHandler for WebSsoProfileHandler {
    type Message = AuthnRequest;

    fn profile(&self) -> SamlProfile {
        SamlProfile::WebBrowserSso
    }

    async fn send(
        &self,
        ctx: &mut ExchangeContext,
        mut request: AuthnRequest,
        relay_state: Option<String>,
    ) -> BrokerResult<()> {
        let config = &self.services.config;

        // Lookups run before any context write.
        let (endpoint, preset) = match ctx.peer_endpoint()? {
            Some(endpoint) => (endpoint.clone(), true),
            None => (ctx.idp_single_sign_on_service(config.sso_binding.uri())?.clone(), false),
        };
        let acs = Self::default_assertion_consumer_service(ctx, &request)?;

        ctx.set_request_id(request.id.clone())?;
        if !preset {
            ctx.set_peer_endpoint(endpoint.clone())?;
        }
        tracing::debug!(
            request_id = %request.id,
            location = %endpoint.location,
            binding = %endpoint.binding,
            "Resolved IdP SSO endpoint"
        );

        if let Some(acs) = acs {
            request.assertion_consumer_service_url = Some(acs.location.clone());
            request.protocol_binding = Some(acs.binding.clone());
            ctx.set_self_endpoint(acs)?;
        }
        request.destination = Some(endpoint.location.clone());

        let sign = config.sign_authn_requests
            || ctx.idp_role_descriptor().is_ok_and(|idp| idp.want_authn_requests_signed)
            || ctx.sp_role_descriptor().is_ok_and(|sp| sp.authn_requests_signed);

        self.services
            .send_message(
                ctx,
                ProfileMessage::AuthnRequest(request),
                &endpoint,
                config.sso_binding,
                relay_state,
                sign,
            )
            .await
    }

    async fn receive(&self, ctx: &mut ExchangeContext) -> BrokerResult<Credentials> {
        if ctx.is_subject_committed() {
            return Err(BrokerError::SubjectAlreadyCommitted);
        }

        let inbound = self.services.receive_message().await?;
        let response = match &inbound.message {
            ProfileMessage::Response(response) => response,
            other => return Err(unexpected(MessageKind::Response, other)),
        };

        let validated = match self.validate(ctx, response).await {
            Ok(validated) => validated,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    response_id = %response.id,
                    in_response_to = ?response.in_response_to,
                    "Rejected SAML response"
                );
                return Err(err);
            }
        };

        // Consume the outstanding request; a concurrent receive of the
        // same response loses here.
        let mut stored_relay_state = None;
        if let (Some(storage), Some(request_id)) = (ctx.message_storage().cloned(), response.in_response_to.as_deref()) {
            let stored = storage
                .remove(request_id)
                .await?
                .ok_or_else(|| ValidationError::UnknownRequest(request_id.to_string()))?;
            stored_relay_state = stored.relay_state;
        }
        if let Some(request_id) = response.in_response_to.as_deref() {
            ctx.set_request_id(request_id)?;
        }

        let relay_state = inbound.relay_state.clone().or(stored_relay_state);
        let credentials = Credentials::from_validated(&validated, relay_state.clone());

        record_inbound_binding(ctx, &inbound, relay_state)?;
        ctx.subject_name_identifier_mut()?.name_id = validated.base_subject_id.as_name_id().cloned();
        ctx.commit_validated_subject(validated)?;

        tracing::info!(
            subject = %credentials.subject,
            issuer = %credentials.issuer,
            session_index = ?credentials.session_index,
            "Accepted SAML response"
        );
        Ok(credentials)
    }
}
