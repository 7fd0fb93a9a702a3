//! Single Logout integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use kc_broker_saml::metadata::{Endpoint, IdpSsoDescriptor};
use kc_broker_saml::{
    BrokerError, InMemoryMessageStorage, LogoutRequest, LogoutResponse, MessageStorage, NameId, ProfileHandler,
    ProfileMessage, SamlBinding, SamlProfile, Status, StorageError, StoredMessage, ValidationError,
};

use crate::common::{TestEnv, IDP_ENTITY_ID, IDP_SLO_REDIRECT, IDP_SSO_POST, SP_ENTITY_ID};

async fn send_logout(env: &TestEnv, ctx: &mut kc_broker_saml::ExchangeContext) -> anyhow::Result<String> {
    let request = LogoutRequest::new(SP_ENTITY_ID, NameId::new("alice")).with_session_index("idp-session-1");
    let id = request.id.clone();
    env.slo().send(ctx, request, Some("logout-state".to_string())).await?;
    Ok(id)
}

/// Tests a complete SP-initiated logout.
#[tokio::test]
async fn test_slo_round_trip() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    assert_eq!(env.slo().profile(), SamlProfile::SingleLogout);

    let request_id = send_logout(&env, &mut ctx).await?;

    let sent = env.transport.last_sent().expect("logout request dispatched");
    assert_eq!(sent.binding, SamlBinding::HttpRedirect);
    assert_eq!(sent.destination, IDP_SLO_REDIRECT);
    let ProfileMessage::LogoutRequest(request) = &sent.message else {
        panic!("expected LogoutRequest, got {:?}", sent.message.kind());
    };
    assert_eq!(request.destination.as_deref(), Some(IDP_SLO_REDIRECT));
    assert_eq!(ctx.peer_endpoint()?.map(|e| e.location.as_str()), Some(IDP_SLO_REDIRECT));

    env.deliver(
        ProfileMessage::LogoutResponse(LogoutResponse::success(IDP_ENTITY_ID, &request_id)),
        SamlBinding::HttpRedirect,
    );
    let credentials = env.slo().receive(&mut ctx).await?;

    assert_eq!(credentials.subject.value(), "alice");
    assert_eq!(credentials.issuer, IDP_ENTITY_ID);
    assert_eq!(credentials.session_index.as_deref(), Some("idp-session-1"));
    assert_eq!(credentials.relay_state.as_deref(), Some("logout-state"));
    assert!(env.storage.retrieve(&request_id).await?.is_none());

    // Logout never establishes a subject.
    assert!(!ctx.is_subject_committed());

    Ok(())
}

/// Tests that a non-success logout status is reported as a requester-side
/// validation failure and keeps the request outstanding.
#[tokio::test]
async fn test_slo_failure_status() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    let request_id = send_logout(&env, &mut ctx).await?;

    let mut response = LogoutResponse::success(IDP_ENTITY_ID, &request_id);
    response.status = Status::responder("session store unavailable");
    env.deliver(ProfileMessage::LogoutResponse(response), SamlBinding::HttpRedirect);

    let err = env.slo().receive(&mut ctx).await.unwrap_err();
    assert!(
        matches!(err, BrokerError::Validation(ValidationError::StatusNotSuccess { .. })),
        "got {err:?}"
    );
    assert!(err.is_validation_failure());
    assert!(env.storage.retrieve(&request_id).await?.is_some());

    Ok(())
}

/// Tests that an IdP without a logout service for the configured binding
/// cannot be logged out of.
#[tokio::test]
async fn test_slo_no_endpoint() -> anyhow::Result<()> {
    let idp = IdpSsoDescriptor::new(IDP_ENTITY_ID).with_sso(Endpoint::new(SamlBinding::HttpPost, IDP_SSO_POST));
    let env = TestEnv::with_idp(idp);
    let mut ctx = env.context().await?;

    let err = send_logout(&env, &mut ctx).await.unwrap_err().downcast::<BrokerError>()?;
    assert!(matches!(err, BrokerError::NoMatchingEndpoint { .. }), "got {err:?}");
    assert!(env.transport.sent().is_empty());
    assert!(ctx.request_id().is_none());

    Ok(())
}

/// Tests that a logout response answering some other request is refused.
#[tokio::test]
async fn test_slo_wrong_in_response_to() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    let request_id = send_logout(&env, &mut ctx).await?;

    env.deliver(
        ProfileMessage::LogoutResponse(LogoutResponse::success(IDP_ENTITY_ID, "_id-other")),
        SamlBinding::HttpRedirect,
    );
    let err = env.slo().receive(&mut ctx).await.unwrap_err();
    match err {
        BrokerError::Validation(ValidationError::InResponseToMismatch { expected, actual }) => {
            assert_eq!(expected, request_id);
            assert_eq!(actual.as_deref(), Some("_id-other"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    Ok(())
}

/// Tests that a logout response from an unexpected issuer is refused.
#[tokio::test]
async fn test_slo_wrong_issuer() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    let request_id = send_logout(&env, &mut ctx).await?;

    env.deliver(
        ProfileMessage::LogoutResponse(LogoutResponse::success("https://other-idp.example.com", &request_id)),
        SamlBinding::HttpRedirect,
    );
    let err = env.slo().receive(&mut ctx).await.unwrap_err();
    assert!(
        matches!(err, BrokerError::Validation(ValidationError::InvalidIssuer { .. })),
        "got {err:?}"
    );

    Ok(())
}

/// Tests that the same logout response is accepted only once.
#[tokio::test]
async fn test_slo_replay_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    let request_id = send_logout(&env, &mut ctx).await?;

    let response = LogoutResponse::success(IDP_ENTITY_ID, &request_id);
    env.deliver(ProfileMessage::LogoutResponse(response.clone()), SamlBinding::HttpRedirect);
    env.slo().receive(&mut ctx).await?;

    env.deliver(ProfileMessage::LogoutResponse(response.clone()), SamlBinding::HttpRedirect);
    let err = env.slo().receive(&mut ctx).await.unwrap_err();
    assert!(
        matches!(err, BrokerError::Validation(ValidationError::UnknownRequest(ref id)) if *id == request_id),
        "got {err:?}"
    );

    let mut replay_ctx = env.context().await?;
    env.deliver(ProfileMessage::LogoutResponse(response), SamlBinding::HttpRedirect);
    let err = env.slo().receive(&mut replay_ctx).await.unwrap_err();
    assert!(
        matches!(err, BrokerError::Validation(ValidationError::UnknownRequest(_))),
        "got {err:?}"
    );

    Ok(())
}

/// Storage whose entries are gone by the time they are removed, as when
/// a concurrent receive consumed them first.
#[derive(Debug, Default)]
struct ConsumedElsewhere(InMemoryMessageStorage);

#[async_trait]
impl MessageStorage for ConsumedElsewhere {
    async fn store(&self, key: &str, message: StoredMessage) -> Result<(), StorageError> {
        self.0.store(key, message).await
    }

    async fn retrieve(&self, key: &str) -> Result<Option<StoredMessage>, StorageError> {
        self.0.retrieve(key).await
    }

    async fn remove(&self, key: &str) -> Result<Option<StoredMessage>, StorageError> {
        self.0.remove(key).await?;
        Ok(None)
    }
}

/// Tests that a receive losing the race to consume the stored request is
/// refused.
#[tokio::test]
async fn test_slo_concurrent_consumption_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    ctx.set_message_storage(Some(Arc::new(ConsumedElsewhere::default())));
    let request_id = send_logout(&env, &mut ctx).await?;

    env.deliver(
        ProfileMessage::LogoutResponse(LogoutResponse::success(IDP_ENTITY_ID, &request_id)),
        SamlBinding::HttpRedirect,
    );
    let err = env.slo().receive(&mut ctx).await.unwrap_err();
    assert!(
        matches!(err, BrokerError::Validation(ValidationError::UnknownRequest(ref id)) if *id == request_id),
        "got {err:?}"
    );
    // The failed receive did not record inbound binding state.
    assert_eq!(ctx.binding()?.and_then(|b| b.relay_state.as_deref()), Some("logout-state"));

    Ok(())
}
