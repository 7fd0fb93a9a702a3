//! Entity, role and endpoint resolution through a loaded exchange context.

use kc_broker_saml::context::{MetadataContext, SelfEntityContext};
use kc_broker_saml::metadata::{Endpoint, IndexedEndpoint, RoleKind, SpSsoDescriptor};
use kc_broker_saml::{BrokerError, EntitySide, ExchangeContext, SamlBinding};

use crate::common::{
    idp_descriptor, sp_descriptor, TestEnv, ACS_URL, ACS_URL_LEGACY, IDP_ENTITY_ID, IDP_SSO_POST, IDP_SSO_REDIRECT,
    SP_ENTITY_ID,
};

/// Tests ACS selection: default without an index, exact index otherwise,
/// and no fallback for an unknown index.
#[tokio::test]
async fn test_assertion_consumer_service_selection() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let ctx = env.context().await?;

    let default = ctx.sp_assertion_consumer_service(None)?;
    assert_eq!(default.index, Some(2));
    assert_eq!(default.endpoint.location, ACS_URL);

    let first = ctx.sp_assertion_consumer_service(Some("1"))?;
    assert_eq!(first.index, Some(1));
    assert_eq!(first.endpoint.location, ACS_URL_LEGACY);

    let err = ctx.sp_assertion_consumer_service(Some("9")).unwrap_err();
    match err {
        BrokerError::NoMatchingEndpoint { requested, descriptor } => {
            assert_eq!(requested.to_string(), "index 9");
            assert!(descriptor.contains(SP_ENTITY_ID), "descriptor: {descriptor}");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    Ok(())
}

/// Tests that ACS indices are matched against declared values, not list
/// positions, and only in canonical decimal form.
#[tokio::test]
async fn test_assertion_consumer_service_declared_index() -> anyhow::Result<()> {
    let acs = |index: u16| {
        IndexedEndpoint::new(
            Endpoint::new(SamlBinding::HttpPost, format!("{SP_ENTITY_ID}/acs/{index}")),
            index,
        )
    };
    let mut ctx = ExchangeContext::new();
    ctx.set_self_role_descriptor(
        SpSsoDescriptor::new(SP_ENTITY_ID)
            .with_acs(acs(7).as_default())
            .with_acs(acs(0))
            .with_acs(acs(3)),
    )?;

    let third = ctx.sp_assertion_consumer_service(Some("3"))?;
    assert_eq!(third.index, Some(3));
    assert_eq!(third.endpoint.location, format!("{SP_ENTITY_ID}/acs/3"));

    let zero = ctx.sp_assertion_consumer_service(Some("0"))?;
    assert_eq!(zero.endpoint.location, format!("{SP_ENTITY_ID}/acs/0"));

    assert_eq!(ctx.sp_assertion_consumer_service(None)?.index, Some(7));

    for index in ["1", "2", "03", "+3", " 3"] {
        assert!(
            matches!(
                ctx.sp_assertion_consumer_service(Some(index)),
                Err(BrokerError::NoMatchingEndpoint { .. })
            ),
            "index {index:?} resolved"
        );
    }

    Ok(())
}

/// Tests SSO selection by exact binding in document order.
#[tokio::test]
async fn test_single_sign_on_service_selection() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let ctx = env.context().await?;

    assert_eq!(ctx.idp_single_sign_on_service(SamlBinding::HttpPost.uri())?.location, IDP_SSO_POST);
    assert_eq!(
        ctx.idp_single_sign_on_service(SamlBinding::HttpRedirect.uri())?.location,
        IDP_SSO_REDIRECT
    );
    assert!(matches!(
        ctx.idp_single_sign_on_service(SamlBinding::Soap.uri()),
        Err(BrokerError::NoMatchingEndpoint { .. })
    ));

    Ok(())
}

/// Tests that entity and role subcontexts are created once and then reused.
#[tokio::test]
async fn test_entity_creation_is_idempotent() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = env.context().await?;
    let nodes = ctx.tree().len();

    let local = ctx.self_entity()?;
    assert_eq!(ctx.self_entity()?, local);
    let peer = ctx.peer_entity()?;
    assert_eq!(ctx.peer_entity()?, peer);
    assert_ne!(local, peer);

    let metadata = ctx.tree_mut().get_or_create_child::<MetadataContext>(local, true)?;
    assert_eq!(ctx.tree_mut().get_or_create_child::<MetadataContext>(local, true)?, metadata);
    assert_eq!(ctx.tree().len(), nodes);

    assert_eq!(ctx.sp_role_descriptor()?.entity_id, SP_ENTITY_ID);
    assert_eq!(ctx.idp_role_descriptor()?.entity_id, IDP_ENTITY_ID);
    assert_eq!(ctx.tree().len(), nodes);

    Ok(())
}

/// Tests that a fresh context starts empty apart from its root.
#[tokio::test]
async fn test_fresh_context_state() -> anyhow::Result<()> {
    let mut ctx = ExchangeContext::new();
    assert!(ctx.subject_confirmations().is_empty());
    assert!(ctx.trusted_assertion().is_none());
    assert!(ctx.base_subject_id().is_none());
    assert!(ctx.request_id().is_none());

    let root = ctx.tree().root();
    assert_eq!(ctx.tree_mut().get_or_create_child::<SelfEntityContext>(root, false)?, None);
    assert!(matches!(
        ctx.sp_role_descriptor(),
        Err(BrokerError::MissingRoleDescriptor {
            side: EntitySide::Local
        })
    ));

    Ok(())
}

/// Tests that descriptors on the wrong side are reported, not coerced.
#[tokio::test]
async fn test_role_mismatch() -> anyhow::Result<()> {
    let mut ctx = ExchangeContext::new();
    ctx.set_self_role_descriptor(idp_descriptor())?;
    ctx.set_peer_role_descriptor(sp_descriptor())?;

    match ctx.sp_role_descriptor() {
        Err(BrokerError::RoleMismatch { side, expected, actual }) => {
            assert_eq!(side, EntitySide::Local);
            assert_eq!(expected, RoleKind::ServiceProvider);
            assert_eq!(actual, RoleKind::IdentityProvider);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(matches!(
        ctx.idp_role_descriptor(),
        Err(BrokerError::RoleMismatch {
            side: EntitySide::Peer,
            ..
        })
    ));

    Ok(())
}

/// Tests that an entity the resolver does not know is surfaced.
#[tokio::test]
async fn test_unknown_peer_entity() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mut ctx = ExchangeContext::new();

    let err = ctx
        .load_peer_metadata(&env.resolver, "https://unknown.example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::UnknownEntity(ref id) if id == "https://unknown.example.com"));
    assert_eq!(err.http_status(), 404);
    assert!(ctx.peer_entity_id().is_none());

    Ok(())
}
