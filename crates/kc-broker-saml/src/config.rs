//! Broker configuration.
//!
//! Loaded from `KC_SAML_BROKER_*` environment variables with defaults.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SamlBinding;

/// Upper bound for every duration setting: one year.
pub const MAX_DURATION_SECS: i64 = 365 * 24 * 60 * 60;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable holds a value that cannot be used.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable or field name.
        key: String,
        /// Offending value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: impl ToString, reason: &str) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Settings shared by the profile handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Accepted clock skew in seconds.
    pub accepted_skew_secs: i64,

    /// Maximum age of the IdP authentication event in seconds.
    pub max_authentication_lifetime_secs: i64,

    /// How long sent messages stay correlatable, in seconds.
    pub message_ttl_secs: i64,

    /// Binding used for `AuthnRequest`s.
    pub sso_binding: SamlBinding,

    /// Binding used for `LogoutRequest`s.
    pub slo_binding: SamlBinding,

    /// Require signed assertions regardless of SP metadata.
    pub require_signed_assertions: bool,

    /// Ask the outbound adapter to sign `AuthnRequest`s.
    pub sign_authn_requests: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            accepted_skew_secs: 120,
            max_authentication_lifetime_secs: 3600,
            message_ttl_secs: 300,
            sso_binding: SamlBinding::HttpPost,
            slo_binding: SamlBinding::HttpRedirect,
            require_signed_assertions: false,
            sign_authn_requests: false,
        }
    }
}

impl BrokerConfig {
    /// Loads configuration from environment variables.
    ///
    /// ## Errors
    ///
    /// `ConfigError::Invalid` for unparseable or out-of-range values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps variable names to
    /// values.
    ///
    /// ## Errors
    ///
    /// `ConfigError::Invalid` for unparseable or out-of-range values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let secs = |key: &str, default: i64| -> Result<i64, ConfigError> {
            lookup(key).map_or(Ok(default), |v| {
                v.trim()
                    .parse()
                    .map_err(|_| ConfigError::invalid(key, &v, "expected a number of seconds"))
            })
        };
        let binding = |key: &str, default: SamlBinding| -> Result<SamlBinding, ConfigError> {
            lookup(key).map_or(Ok(default), |v| {
                SamlBinding::from_short_name(v.trim())
                    .or_else(|| SamlBinding::from_uri(v.trim()))
                    .ok_or_else(|| ConfigError::invalid(key, &v, "expected post, redirect, artifact or soap"))
            })
        };
        let flag = |key: &str, default: bool| -> Result<bool, ConfigError> {
            lookup(key).map_or(Ok(default), |v| match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::invalid(key, &v, "expected true or false")),
            })
        };

        let config = Self {
            accepted_skew_secs: secs("KC_SAML_BROKER_ACCEPTED_SKEW", defaults.accepted_skew_secs)?,
            max_authentication_lifetime_secs: secs(
                "KC_SAML_BROKER_MAX_AUTHENTICATION_LIFETIME",
                defaults.max_authentication_lifetime_secs,
            )?,
            message_ttl_secs: secs("KC_SAML_BROKER_MESSAGE_TTL", defaults.message_ttl_secs)?,
            sso_binding: binding("KC_SAML_BROKER_SSO_BINDING", defaults.sso_binding)?,
            slo_binding: binding("KC_SAML_BROKER_SLO_BINDING", defaults.slo_binding)?,
            require_signed_assertions: flag(
                "KC_SAML_BROKER_REQUIRE_SIGNED_ASSERTIONS",
                defaults.require_signed_assertions,
            )?,
            sign_authn_requests: flag("KC_SAML_BROKER_SIGN_AUTHN_REQUESTS", defaults.sign_authn_requests)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// ## Errors
    ///
    /// `ConfigError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accepted_skew_secs < 0 {
            return Err(ConfigError::invalid("accepted_skew_secs", self.accepted_skew_secs, "must not be negative"));
        }
        if self.max_authentication_lifetime_secs <= 0 {
            return Err(ConfigError::invalid(
                "max_authentication_lifetime_secs",
                self.max_authentication_lifetime_secs,
                "must be positive",
            ));
        }
        if self.message_ttl_secs <= 0 {
            return Err(ConfigError::invalid("message_ttl_secs", self.message_ttl_secs, "must be positive"));
        }
        for (key, value) in [
            ("accepted_skew_secs", self.accepted_skew_secs),
            ("max_authentication_lifetime_secs", self.max_authentication_lifetime_secs),
            ("message_ttl_secs", self.message_ttl_secs),
        ] {
            if value > MAX_DURATION_SECS {
                return Err(ConfigError::invalid(key, value, "must not exceed one year"));
            }
        }
        Ok(())
    }

    /// Accepted clock skew.
    ///
    /// Values outside `0..=MAX_DURATION_SECS` are clamped; only
    /// [`validate`](Self::validate) reports them.
    #[must_use]
    pub fn accepted_skew(&self) -> Duration {
        bounded_seconds(self.accepted_skew_secs)
    }

    /// Maximum authentication age.
    #[must_use]
    pub fn max_authentication_lifetime(&self) -> Duration {
        bounded_seconds(self.max_authentication_lifetime_secs)
    }

    /// Stored message lifetime.
    #[must_use]
    pub fn message_ttl(&self) -> Duration {
        bounded_seconds(self.message_ttl_secs)
    }
}

fn bounded_seconds(secs: i64) -> Duration {
    Duration::seconds(secs.clamp(0, MAX_DURATION_SECS))
}
