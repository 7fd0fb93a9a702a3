//! Inbound message validation.
//!
//! Checks run in a fixed order and stop at the first failure. Nothing here
//! touches the exchange context; the profile handler commits the result
//! only when every check passed.

use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::context::ValidatedSubject;
use crate::error::ValidationError;
use crate::metadata::{IdpSsoDescriptor, SpSsoDescriptor};
use crate::types::{Assertion, Response, Status, SubjectConfirmation};

/// Source of the current time.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Creates a clock stopped at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Verifies XML signatures against the IdP's metadata.
///
/// Returns `Ok(true)` for a present and valid signature, `Ok(false)` when
/// the element is unsigned.
pub trait SignatureVerifier: Send + Sync + Debug {
    /// Verifies the signature on the response element.
    ///
    /// ## Errors
    ///
    /// `SignatureInvalid` if a signature is present but does not verify.
    fn verify_response(&self, response: &Response, idp: &IdpSsoDescriptor) -> Result<bool, ValidationError>;

    /// Verifies the signature on an assertion.
    ///
    /// ## Errors
    ///
    /// `SignatureInvalid` if a signature is present but does not verify.
    fn verify_assertion(&self, assertion: &Assertion, idp: &IdpSsoDescriptor) -> Result<bool, ValidationError>;
}

/// Trusts the `signed` flags set by an inbound adapter that already
/// verified the XML signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptSignedFlag;

impl SignatureVerifier for AcceptSignedFlag {
    fn verify_response(&self, response: &Response, _idp: &IdpSsoDescriptor) -> Result<bool, ValidationError> {
        Ok(response.signed)
    }

    fn verify_assertion(&self, assertion: &Assertion, _idp: &IdpSsoDescriptor) -> Result<bool, ValidationError> {
        Ok(assertion.signed)
    }
}

/// Fails unless `status` is success.
///
/// ## Errors
///
/// `StatusNotSuccess` carrying the peer's codes.
pub fn check_status(status: &Status) -> Result<(), ValidationError> {
    if status.is_success() {
        return Ok(());
    }
    Err(ValidationError::StatusNotSuccess {
        code: status.code.clone(),
        sub_code: status.sub_code.clone(),
        message: status.message.clone(),
    })
}

/// Fails if a present issuer differs from `expected`.
///
/// ## Errors
///
/// `InvalidIssuer`.
pub fn check_issuer(expected: &str, actual: Option<&str>) -> Result<(), ValidationError> {
    match actual {
        Some(actual) if actual != expected => Err(ValidationError::InvalidIssuer {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Validates an authentication `Response` for one exchange.
#[derive(Debug, Clone, Copy)]
pub struct ResponseValidator<'a> {
    /// Local SP descriptor.
    pub sp: &'a SpSsoDescriptor,
    /// Peer IdP descriptor.
    pub idp: &'a IdpSsoDescriptor,
    /// Signature verifier.
    pub verifier: &'a dyn SignatureVerifier,
    /// Evaluation instant.
    pub now: DateTime<Utc>,
    /// Accepted clock skew.
    pub skew: Duration,
    /// Maximum age of the authentication event.
    pub max_authentication_lifetime: Duration,
    /// Require signed assertions even when the SP descriptor does not ask.
    pub require_signed_assertions: bool,
    /// Request ID recorded in the exchange, if any.
    pub request_id: Option<&'a str>,
}

impl<'a> ResponseValidator<'a> {
    /// Structure, status, issuer, destination and `InResponseTo` against
    /// the exchange's own request ID.
    ///
    /// ## Errors
    ///
    /// The first failing check.
    pub fn validate_envelope(&self, response: &Response) -> Result<(), ValidationError> {
        response.check_structure().map_err(ValidationError::Malformed)?;
        check_status(&response.status)?;
        check_issuer(&self.idp.entity_id, response.issuer.as_deref())?;
        if let Some(destination) = response.destination.as_deref() {
            self.check_destination(destination)?;
        }
        if let Some(expected) = self.request_id {
            if response.in_response_to.as_deref() != Some(expected) {
                return Err(ValidationError::InResponseToMismatch {
                    expected: expected.to_string(),
                    actual: response.in_response_to.clone(),
                });
            }
        }
        Ok(())
    }

    /// Signatures, then the single assertion's issuer, conditions,
    /// authentication lifetime and subject confirmations.
    ///
    /// ## Errors
    ///
    /// The first failing check.
    pub fn validate_assertions(&self, response: &Response) -> Result<ValidatedSubject, ValidationError> {
        let response_signed = self.verifier.verify_response(response, self.idp)?;

        let assertion = match response.assertions.as_slice() {
            [] => return Err(ValidationError::MissingAssertion),
            [one] => one,
            _ => return Err(ValidationError::Malformed("multiple assertions".to_string())),
        };

        check_issuer(&self.idp.entity_id, Some(&assertion.issuer))?;

        let assertion_signed = self.verifier.verify_assertion(assertion, self.idp)?;
        if (self.require_signed_assertions || self.sp.want_assertions_signed) && !assertion_signed {
            return Err(ValidationError::MissingSignature("assertion"));
        }
        if !response_signed && !assertion_signed {
            return Err(ValidationError::MissingSignature("response or assertion"));
        }

        self.check_conditions(assertion)?;
        self.check_authn_lifetime(assertion)?;

        let subject = assertion.subject.as_ref().ok_or(ValidationError::MissingSubject)?;
        let confirmations: Vec<SubjectConfirmation> = subject
            .confirmations
            .iter()
            .filter(|c| self.confirmation_is_valid(c, response.in_response_to.as_deref()))
            .cloned()
            .collect();
        if confirmations.is_empty() {
            return Err(ValidationError::NoValidSubjectConfirmation);
        }

        let base_subject_id = subject
            .identifier
            .clone()
            .or_else(|| confirmations.iter().find_map(|c| c.identifier.clone()))
            .ok_or(ValidationError::MissingSubject)?;

        Ok(ValidatedSubject {
            assertion: assertion.clone(),
            base_subject_id,
            confirmations,
        })
    }

    fn acs_locations(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.sp
            .assertion_consumer_services
            .iter()
            .map(|acs| acs.endpoint.location.as_str())
    }

    fn check_destination(&self, destination: &str) -> Result<(), ValidationError> {
        if self.acs_locations().any(|l| l == destination) {
            return Ok(());
        }
        Err(ValidationError::InvalidDestination {
            expected: self.acs_locations().collect::<Vec<_>>().join(", "),
            actual: destination.to_string(),
        })
    }

    fn check_window(
        &self,
        not_before: Option<DateTime<Utc>>,
        not_on_or_after: Option<DateTime<Utc>>,
    ) -> Result<(), ValidationError> {
        // Skew is applied to `now` so IdP-supplied instants never overflow.
        // A shifted `now` outside chrono's range lies beyond every bound.
        if let Some(not_before) = not_before {
            if self.now.checked_add_signed(self.skew).is_some_and(|latest| latest < not_before) {
                return Err(ValidationError::AssertionNotYetValid { not_before });
            }
        }
        if let Some(not_on_or_after) = not_on_or_after {
            if self.now.checked_sub_signed(self.skew).is_some_and(|earliest| earliest >= not_on_or_after) {
                return Err(ValidationError::AssertionExpired { not_on_or_after });
            }
        }
        Ok(())
    }

    fn check_conditions(&self, assertion: &Assertion) -> Result<(), ValidationError> {
        let Some(conditions) = &assertion.conditions else {
            return Ok(());
        };
        self.check_window(conditions.not_before, conditions.not_on_or_after)?;

        let audience = self.sp.entity_id.as_str();
        for restriction in &conditions.audience_restrictions {
            if !restriction.audiences.iter().any(|a| a == audience) {
                return Err(ValidationError::InvalidAudience {
                    expected: audience.to_string(),
                    actual: restriction.audiences.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_authn_lifetime(&self, assertion: &Assertion) -> Result<(), ValidationError> {
        if assertion.authn_statements.is_empty() {
            return Err(ValidationError::MissingAuthnStatement);
        }
        let oldest_accepted = self
            .now
            .checked_sub_signed(self.max_authentication_lifetime)
            .and_then(|t| t.checked_sub_signed(self.skew));
        for statement in &assertion.authn_statements {
            if oldest_accepted.is_some_and(|oldest| oldest >= statement.authn_instant) {
                return Err(ValidationError::AuthnInstantTooOld {
                    authn_instant: statement.authn_instant,
                });
            }
        }
        Ok(())
    }

    fn confirmation_is_valid(&self, confirmation: &SubjectConfirmation, response_in_response_to: Option<&str>) -> bool {
        if !confirmation.is_bearer() {
            tracing::debug!(method = %confirmation.method, "Skipping non-bearer subject confirmation");
            return false;
        }
        let Some(data) = &confirmation.data else {
            return false;
        };
        // Bearer data must bound its own lifetime.
        if data.not_on_or_after.is_none() || self.check_window(data.not_before, data.not_on_or_after).is_err() {
            return false;
        }
        let recipient_ok = data
            .recipient
            .as_deref()
            .is_some_and(|r| self.acs_locations().any(|l| l == r));
        if !recipient_ok {
            return false;
        }
        match (self.request_id, data.in_response_to.as_deref()) {
            (Some(expected), actual) => actual == Some(expected),
            (None, None) => true,
            (None, actual) => actual == response_in_response_to,
        }
    }
}
