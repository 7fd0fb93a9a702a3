//! Web Browser SSO integration tests.
//!
//! Each test sends an `AuthnRequest` through the handler, then feeds the
//! IdP's answer back through the inbound transport.

use chrono::Duration;
use kc_broker_saml::metadata::Endpoint;
use kc_broker_saml::transport::{InboundMessage, TransportError};
use kc_broker_saml::{
    AuthnRequest, BrokerError, LogoutResponse, MessageKind, MessageStorage, ProfileHandler, ProfileMessage,
    SamlBinding, SamlProfile, ValidationError,
};

use crate::common::{self, TestEnv, ACS_URL, IDP_ENTITY_ID, IDP_SSO_POST, SP_ENTITY_ID};

/// Sends a fresh request on `ctx` and returns its ID.
async fn send_request(
    env: &TestEnv,
    ctx: &mut kc_broker_saml::ExchangeContext,
    relay_state: Option<&str>,
) -> anyhow::Result<String> {
    let request = AuthnRequest::new(SP_ENTITY_ID);
    let id = request.id.clone();
    env.sso().send(ctx, request, relay_state.map(str::to_string)).await?;
    Ok(id)
}

/// Tests a complete SP-initiated login.
#[tokio::test]
async fn test_sso_round_trip() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    assert_eq!(env.sso().profile(), SamlProfile::WebBrowserSso);

    let request_id = send_request(&env, &mut ctx, Some("state-1")).await?;
    assert_eq!(ctx.request_id(), Some(request_id.as_str()));

    // The request went to the POST SSO endpoint with the default ACS filled in.
    let sent = env.transport.last_sent().expect("request dispatched");
    assert_eq!(sent.binding, SamlBinding::HttpPost);
    assert_eq!(sent.destination, IDP_SSO_POST);
    assert_eq!(sent.relay_state.as_deref(), Some("state-1"));
    let ProfileMessage::AuthnRequest(request) = &sent.message else {
        panic!("expected AuthnRequest, got {:?}", sent.message.kind());
    };
    assert_eq!(request.destination.as_deref(), Some(IDP_SSO_POST));
    assert_eq!(request.assertion_consumer_service_url.as_deref(), Some(ACS_URL));
    assert_eq!(ctx.peer_endpoint()?.map(|e| e.location.as_str()), Some(IDP_SSO_POST));
    assert_eq!(ctx.self_endpoint()?.map(|e| e.location.as_str()), Some(ACS_URL));
    assert!(env.storage.retrieve(&request_id).await?.is_some());

    env.deliver(
        ProfileMessage::Response(env.response_to(&request_id, "alice")),
        SamlBinding::HttpPost,
    );
    let credentials = env.sso().receive(&mut ctx).await?;

    assert_eq!(credentials.subject.value(), "alice");
    assert_eq!(credentials.issuer, IDP_ENTITY_ID);
    assert_eq!(credentials.session_index.as_deref(), Some("idp-session-1"));
    assert_eq!(credentials.relay_state.as_deref(), Some("state-1"));
    assert_eq!(credentials.attribute("email"), Some("alice@example.com"));
    assert_eq!(credentials.attributes["groups"], vec!["staff", "ops"]);

    assert!(ctx.is_subject_committed());
    assert_eq!(ctx.base_subject_id().map(|s| s.value()), Some("alice"));
    assert!(ctx.trusted_assertion().is_some());
    assert_eq!(ctx.subject_confirmations().len(), 1);
    assert_eq!(
        ctx.subject_name_identifier()?.and_then(|s| s.name_id.as_ref()).map(|n| n.value.as_str()),
        Some("alice")
    );
    assert_eq!(ctx.binding()?.and_then(|b| b.binding), Some(SamlBinding::HttpPost));

    // The outstanding request is consumed.
    assert!(env.storage.retrieve(&request_id).await?.is_none());

    Ok(())
}

/// Tests that an endpoint already chosen by the caller is not re-resolved.
#[tokio::test]
async fn test_sso_uses_preset_peer_endpoint() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    ctx.set_peer_endpoint(Endpoint::new(SamlBinding::HttpRedirect, "https://idp.example.com/custom"))?;

    send_request(&env, &mut ctx, None).await?;

    let sent = env.transport.last_sent().expect("request dispatched");
    assert_eq!(sent.destination, "https://idp.example.com/custom");
    assert_eq!(sent.binding, SamlBinding::HttpRedirect);

    Ok(())
}

/// Tests that an IdP without an SSO endpoint for the configured binding is
/// reported before anything is dispatched.
#[tokio::test]
async fn test_sso_no_matching_binding() -> anyhow::Result<()> {
    let idp = kc_broker_saml::metadata::IdpSsoDescriptor::new(IDP_ENTITY_ID)
        .with_sso(Endpoint::new(SamlBinding::HttpRedirect, common::IDP_SSO_REDIRECT));
    let env = TestEnv::with_idp(idp);
    let mut ctx = env.context().await?;

    let err = send_request(&env, &mut ctx, None).await.unwrap_err();
    let err = err.downcast::<BrokerError>()?;
    assert!(matches!(err, BrokerError::NoMatchingEndpoint { .. }), "got {err:?}");
    assert!(env.transport.sent().is_empty());
    assert!(env.storage.is_empty());
    assert!(ctx.request_id().is_none());
    assert!(ctx.peer_endpoint()?.is_none());

    // A fresh request on the same context goes through once an endpoint is chosen.
    ctx.set_peer_endpoint(Endpoint::new(SamlBinding::HttpRedirect, common::IDP_SSO_REDIRECT))?;
    let request_id = send_request(&env, &mut ctx, None).await?;
    assert_eq!(ctx.request_id(), Some(request_id.as_str()));

    Ok(())
}

/// Tests that an SP without any consumer service fails before the request
/// ID or the IdP endpoint are recorded.
#[tokio::test]
async fn test_sso_no_assertion_consumer_service() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    ctx.set_self_role_descriptor(kc_broker_saml::metadata::SpSsoDescriptor::new(SP_ENTITY_ID))?;

    let err = send_request(&env, &mut ctx, None).await.unwrap_err().downcast::<BrokerError>()?;
    assert!(matches!(err, BrokerError::NoAssertionConsumerService { .. }), "got {err:?}");
    assert!(ctx.request_id().is_none());
    assert!(ctx.peer_endpoint()?.is_none());
    assert!(env.transport.sent().is_empty());

    Ok(())
}

/// Tests that a rejected response leaves the subject state untouched and
/// the outstanding request in storage.
#[tokio::test]
async fn test_sso_rejected_response_leaves_context_untouched() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    let request_id = send_request(&env, &mut ctx, None).await?;

    let mut response = env.response_to(&request_id, "alice");
    response.assertions[0].issuer = "https://evil.example.com".to_string();
    env.deliver(ProfileMessage::Response(response), SamlBinding::HttpPost);

    let err = env.sso().receive(&mut ctx).await.unwrap_err();
    assert!(
        matches!(err, BrokerError::Validation(ValidationError::InvalidIssuer { .. })),
        "got {err:?}"
    );
    assert_eq!(err.http_status(), 400);
    assert!(!ctx.is_subject_committed());
    assert!(ctx.base_subject_id().is_none());
    assert!(ctx.trusted_assertion().is_none());
    assert!(env.storage.retrieve(&request_id).await?.is_some());

    Ok(())
}

/// Tests that an unsigned response is refused as unauthenticated.
#[tokio::test]
async fn test_sso_unsigned_response_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    let request_id = send_request(&env, &mut ctx, None).await?;

    let mut response = env.response_to(&request_id, "alice");
    response.assertions[0].signed = false;
    env.deliver(ProfileMessage::Response(response), SamlBinding::HttpPost);

    let err = env.sso().receive(&mut ctx).await.unwrap_err();
    assert!(
        matches!(err, BrokerError::Validation(ValidationError::MissingSignature(_))),
        "got {err:?}"
    );
    assert_eq!(err.http_status(), 401);

    Ok(())
}

/// Tests that a response to an already consumed request is refused, even
/// in a fresh context.
#[tokio::test]
async fn test_sso_replay_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    let request_id = send_request(&env, &mut ctx, None).await?;

    let response = env.response_to(&request_id, "alice");
    env.deliver(ProfileMessage::Response(response.clone()), SamlBinding::HttpPost);
    env.sso().receive(&mut ctx).await?;

    let mut replay_ctx = env.context().await?;
    env.deliver(ProfileMessage::Response(response), SamlBinding::HttpPost);
    let err = env.sso().receive(&mut replay_ctx).await.unwrap_err();
    assert!(
        matches!(err, BrokerError::Validation(ValidationError::UnknownRequest(ref id)) if *id == request_id),
        "got {err:?}"
    );
    assert!(!replay_ctx.is_subject_committed());

    Ok(())
}

/// Tests that a second receive on a completed exchange is refused.
#[tokio::test]
async fn test_sso_second_receive_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    let request_id = send_request(&env, &mut ctx, None).await?;

    env.deliver(
        ProfileMessage::Response(env.response_to(&request_id, "alice")),
        SamlBinding::HttpPost,
    );
    env.sso().receive(&mut ctx).await?;

    env.deliver(
        ProfileMessage::Response(env.response_to(&request_id, "mallory")),
        SamlBinding::HttpPost,
    );
    let err = env.sso().receive(&mut ctx).await.unwrap_err();
    assert!(matches!(err, BrokerError::SubjectAlreadyCommitted), "got {err:?}");
    assert_eq!(ctx.base_subject_id().map(|s| s.value()), Some("alice"));

    Ok(())
}

/// Tests that the response can be received in a context other than the one
/// that sent the request; correlation goes through storage.
#[tokio::test]
async fn test_sso_receive_in_fresh_context() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut send_ctx = env.context().await?;
    let request_id = send_request(&env, &mut send_ctx, Some("state-2")).await?;

    let mut ctx = env.context().await?;
    env.deliver(
        ProfileMessage::Response(env.response_to(&request_id, "bob")),
        SamlBinding::HttpPost,
    );
    let credentials = env.sso().receive(&mut ctx).await?;

    assert_eq!(credentials.subject.value(), "bob");
    // Relay state falls back to the stored one.
    assert_eq!(credentials.relay_state.as_deref(), Some("state-2"));
    assert_eq!(ctx.request_id(), Some(request_id.as_str()));

    Ok(())
}

/// Tests that the relay state carried by the inbound binding wins over the
/// stored one.
#[tokio::test]
async fn test_sso_inbound_relay_state_preferred() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    let request_id = send_request(&env, &mut ctx, Some("stored")).await?;

    env.transport.deliver(
        InboundMessage::new(
            ProfileMessage::Response(env.response_to(&request_id, "alice")),
            SamlBinding::HttpPost,
        )
        .with_relay_state("inbound"),
    );
    let credentials = env.sso().receive(&mut ctx).await?;
    assert_eq!(credentials.relay_state.as_deref(), Some("inbound"));
    assert_eq!(ctx.binding()?.and_then(|b| b.relay_state.as_deref()), Some("inbound"));

    Ok(())
}

/// Tests that a request past its storage lifetime can no longer be
/// answered.
#[tokio::test]
async fn test_sso_expired_request_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    let request_id = send_request(&env, &mut ctx, None).await?;

    env.clock.advance(Duration::seconds(301));
    env.deliver(
        ProfileMessage::Response(env.response_to(&request_id, "alice")),
        SamlBinding::HttpPost,
    );
    let err = env.sso().receive(&mut ctx).await.unwrap_err();
    assert!(
        matches!(err, BrokerError::Validation(ValidationError::UnknownRequest(_))),
        "got {err:?}"
    );

    Ok(())
}

/// Tests that a message of the wrong kind is refused.
#[tokio::test]
async fn test_sso_unexpected_message_kind() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    let request_id = send_request(&env, &mut ctx, None).await?;

    env.deliver(
        ProfileMessage::LogoutResponse(LogoutResponse::success(IDP_ENTITY_ID, request_id)),
        SamlBinding::HttpRedirect,
    );
    let err = env.sso().receive(&mut ctx).await.unwrap_err();
    assert!(
        matches!(
            err,
            BrokerError::UnexpectedMessage {
                expected: MessageKind::Response,
                actual: MessageKind::LogoutResponse,
            }
        ),
        "got {err:?}"
    );

    Ok(())
}

/// Tests that a dispatch failure surfaces as a transport error and drops the
/// stored request.
#[tokio::test]
async fn test_sso_transport_failure() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    env.transport.fail_dispatch_with("connection reset");

    let request = AuthnRequest::new(SP_ENTITY_ID);
    let err = env.sso().send(&mut ctx, request, None).await.unwrap_err();
    assert!(
        matches!(err, BrokerError::Transport(TransportError::Dispatch(_))),
        "got {err:?}"
    );
    assert_eq!(err.http_status(), 502);
    assert!(env.storage.is_empty());

    Ok(())
}

/// Tests that receiving with nothing queued reports the transport.
#[tokio::test]
async fn test_sso_receive_without_message() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;

    let err = env.sso().receive(&mut ctx).await.unwrap_err();
    assert!(
        matches!(err, BrokerError::Transport(TransportError::NoMessage)),
        "got {err:?}"
    );
    assert!(ctx.binding()?.is_none());

    Ok(())
}
