//! Endpoint selection over role descriptors.
//!
//! Pure functions: they read a descriptor and either return a borrowed
//! endpoint or fail. No fallback is ever substituted for a failed lookup.

use std::fmt;

use crate::error::{BrokerError, BrokerResult};

use super::{Endpoint, IdpSsoDescriptor, IndexedEndpoint, RoleDescriptor, SpSsoDescriptor};

/// What an endpoint lookup asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSelector {
    /// Exact binding URI.
    Binding(String),
    /// Declared ACS index, as received.
    Index(String),
}

impl fmt::Display for EndpointSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binding(uri) => write!(f, "binding {uri}"),
            Self::Index(index) => write!(f, "index {index}"),
        }
    }
}

/// Returns the first SSO service of `idp` whose binding equals `binding`.
///
/// ## Errors
///
/// `NoMatchingEndpoint` when no service uses the binding.
pub fn resolve_single_sign_on_service<'a>(
    idp: &'a IdpSsoDescriptor,
    binding: &str,
) -> BrokerResult<&'a Endpoint> {
    idp.single_sign_on_services
        .iter()
        .find(|ep| ep.binding == binding)
        .ok_or_else(|| BrokerError::NoMatchingEndpoint {
            requested: EndpointSelector::Binding(binding.to_string()),
            descriptor: format!("IDPSSODescriptor of {}", idp.entity_id),
        })
}

/// Selects an assertion consumer service of `sp`.
///
/// With an index, only the endpoint declaring that index qualifies. The
/// index is compared against the declared `index` attribute, never the
/// list position, and must be written in canonical decimal form.
/// Without one, the first default endpoint wins, then the first endpoint.
///
/// ## Errors
///
/// `NoAssertionConsumerService` when the list is empty, whatever the
/// index. `NoMatchingEndpoint` when an index is given and nothing declares
/// it, even if a default exists.
pub fn resolve_assertion_consumer_service<'a>(
    sp: &'a SpSsoDescriptor,
    index: Option<&str>,
) -> BrokerResult<&'a IndexedEndpoint> {
    let services = &sp.assertion_consumer_services;
    if services.is_empty() {
        return Err(BrokerError::NoAssertionConsumerService {
            descriptor: format!("SPSSODescriptor of {}", sp.entity_id),
        });
    }

    if let Some(index) = index {
        // Only the canonical decimal form names a declared index; anything
        // else ("01", "+1", " 1", "one") matches nothing.
        let wanted = index.parse::<u16>().ok().filter(|n| n.to_string() == index);
        return services
            .iter()
            .find(|acs| wanted.is_some() && acs.index == wanted)
            .ok_or_else(|| BrokerError::NoMatchingEndpoint {
                requested: EndpointSelector::Index(index.to_string()),
                descriptor: format!("SPSSODescriptor of {}", sp.entity_id),
            });
    }

    Ok(services
        .iter()
        .find(|acs| acs.is_default)
        .unwrap_or(&services[0]))
}

/// Returns the first single logout service of `descriptor` with the given
/// binding.
///
/// ## Errors
///
/// `NoMatchingEndpoint` when no logout service uses the binding.
pub fn resolve_single_logout_service<'a>(
    descriptor: &'a RoleDescriptor,
    binding: &str,
) -> BrokerResult<&'a Endpoint> {
    descriptor
        .single_logout_services()
        .iter()
        .find(|ep| ep.binding == binding)
        .ok_or_else(|| BrokerError::NoMatchingEndpoint {
            requested: EndpointSelector::Binding(binding.to_string()),
            descriptor: descriptor.summary(),
        })
}
