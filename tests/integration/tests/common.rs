//! Common test utilities and fixtures.

use std::sync::Arc;

use chrono::Duration;
use kc_broker_saml::metadata::{Endpoint, IdpSsoDescriptor, IndexedEndpoint, SpSsoDescriptor};
use kc_broker_saml::transport::{InMemoryTransport, InboundMessage};
use kc_broker_saml::validation::{Clock, FixedClock};
use kc_broker_saml::{
    Assertion, Attribute, AttributeStatement, AuthnStatement, BrokerConfig, Conditions, ExchangeContext,
    InMemoryMessageStorage, InMemoryMetadataResolver, NameId, NameIdFormat, ProfileMessage, ProfileServices,
    Response, SamlBinding, SingleLogoutProfileHandler, Subject, SubjectConfirmation, SubjectConfirmationData,
    WebSsoProfileHandler,
};

pub const SP_ENTITY_ID: &str = "https://kc.example.com/realms/acme";
pub const IDP_ENTITY_ID: &str = "https://idp.example.com/saml";
pub const ACS_URL: &str = "https://kc.example.com/realms/acme/broker/idp/endpoint";
pub const ACS_URL_LEGACY: &str = "https://kc.example.com/realms/acme/broker/idp/endpoint/legacy";
pub const IDP_SSO_REDIRECT: &str = "https://idp.example.com/saml/sso/redirect";
pub const IDP_SSO_POST: &str = "https://idp.example.com/saml/sso/post";
pub const IDP_SLO_REDIRECT: &str = "https://idp.example.com/saml/slo";

/// Test environment wiring in-memory collaborators around the handlers.
pub struct TestEnv {
    /// Transport shared by both directions.
    pub transport: Arc<InMemoryTransport>,
    /// Outbound message storage.
    pub storage: Arc<InMemoryMessageStorage>,
    /// Clock driving validation and storage expiry.
    pub clock: Arc<FixedClock>,
    /// Metadata for the SP and the IdP.
    pub resolver: InMemoryMetadataResolver,
    /// Services handed to the handlers.
    pub services: Arc<ProfileServices>,
}

impl TestEnv {
    /// Creates an environment with default configuration.
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    /// Creates an environment with the given configuration and the default
    /// IdP metadata.
    pub fn with_config(config: BrokerConfig) -> Self {
        Self::build(config, idp_descriptor())
    }

    /// Creates an environment with custom IdP metadata.
    pub fn with_idp(idp: IdpSsoDescriptor) -> Self {
        Self::build(BrokerConfig::default(), idp)
    }

    fn build(config: BrokerConfig, idp: IdpSsoDescriptor) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("kc_broker_saml=debug")
            .with_test_writer()
            .try_init();

        let clock = Arc::new(FixedClock::new(chrono::Utc::now()));
        let transport = Arc::new(InMemoryTransport::new());
        let storage = Arc::new(InMemoryMessageStorage::with_clock(clock.clone()));
        let resolver = InMemoryMetadataResolver::new().with(sp_descriptor()).with(idp);
        let services = Arc::new(
            ProfileServices::new(config, transport.clone(), transport.clone()).with_clock(clock.clone()),
        );

        Self {
            transport,
            storage,
            clock,
            resolver,
            services,
        }
    }

    /// A context with both descriptors loaded and storage attached.
    pub async fn context(&self) -> anyhow::Result<ExchangeContext> {
        let mut ctx = ExchangeContext::new().with_message_storage(self.storage.clone());
        ctx.load_self_metadata(&self.resolver, SP_ENTITY_ID).await?;
        ctx.load_peer_metadata(&self.resolver, IDP_ENTITY_ID).await?;
        Ok(ctx)
    }

    pub fn sso(&self) -> WebSsoProfileHandler {
        WebSsoProfileHandler::new(self.services.clone())
    }

    pub fn slo(&self) -> SingleLogoutProfileHandler {
        SingleLogoutProfileHandler::new(self.services.clone())
    }

    /// Queues `message` as if posted by the IdP.
    pub fn deliver(&self, message: ProfileMessage, binding: SamlBinding) {
        self.transport.deliver(InboundMessage::new(message, binding));
    }

    /// A signed success response for `request_id` asserting `subject`.
    pub fn response_to(&self, request_id: &str, subject: &str) -> Response {
        let now = self.clock.now();
        let confirmation = SubjectConfirmation::bearer(SubjectConfirmationData {
            in_response_to: Some(request_id.to_string()),
            not_on_or_after: Some(now + Duration::minutes(5)),
            recipient: Some(ACS_URL.to_string()),
            ..SubjectConfirmationData::default()
        });
        let assertion = Assertion::new(IDP_ENTITY_ID)
            .with_subject(
                Subject::new(NameId::with_format(subject, NameIdFormat::Persistent)).with_confirmation(confirmation),
            )
            .with_conditions(
                Conditions::between(now - Duration::seconds(30), now + Duration::minutes(5)).with_audience(SP_ENTITY_ID),
            )
            .with_authn_statement(AuthnStatement::at(now - Duration::seconds(10)).with_session_index("idp-session-1"))
            .with_attribute_statement(AttributeStatement {
                attributes: vec![
                    Attribute::new("email", [format!("{subject}@example.com")]),
                    Attribute::new("groups", ["staff", "ops"]),
                ],
            })
            .signed();

        Response::success(IDP_ENTITY_ID)
            .in_response_to(request_id)
            .with_destination(ACS_URL)
            .with_assertion(assertion)
    }
}

/// SP metadata: two POST consumers, the second one default.
pub fn sp_descriptor() -> SpSsoDescriptor {
    SpSsoDescriptor::new(SP_ENTITY_ID)
        .with_acs(IndexedEndpoint::new(Endpoint::new(SamlBinding::HttpPost, ACS_URL_LEGACY), 1))
        .with_acs(IndexedEndpoint::new(Endpoint::new(SamlBinding::HttpPost, ACS_URL), 2).as_default())
        .with_slo(Endpoint::new(SamlBinding::HttpRedirect, format!("{SP_ENTITY_ID}/broker/idp/slo")))
}

/// IdP metadata: redirect SSO listed before POST SSO, redirect SLO.
pub fn idp_descriptor() -> IdpSsoDescriptor {
    IdpSsoDescriptor::new(IDP_ENTITY_ID)
        .with_sso(Endpoint::new(SamlBinding::HttpRedirect, IDP_SSO_REDIRECT))
        .with_sso(Endpoint::new(SamlBinding::HttpPost, IDP_SSO_POST))
        .with_slo(Endpoint::new(SamlBinding::HttpRedirect, IDP_SLO_REDIRECT))
}
