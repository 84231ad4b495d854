//! Token claims and their validation
//!
//! Validation runs after signature verification and checks the claim set
//! against an injected clock, so expiry boundaries are testable without
//! racing the wall clock.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Source of "now" for claims validation.
///
/// Injected rather than read from the system clock directly; tests pin a
/// fixed instant to exercise expiry boundaries deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, the default outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a fixed Unix timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }
}

/// Decoded token payload.
///
/// String fields default to empty on absence so that a missing `sub` or
/// `iss` surfaces as the precise validation error instead of a generic
/// parse failure. The `scope` claim is a space-delimited string of granted
/// scope names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, the caller identity bound into the request context
    #[serde(default)]
    pub sub: String,

    /// Issuer
    #[serde(default)]
    pub iss: String,

    /// Expiry, Unix seconds; must be strictly after "now"
    #[serde(default)]
    pub exp: i64,

    /// Not-before, Unix seconds; must be at or before "now" when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Granted scopes, space-delimited
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
}

impl Claims {
    /// The granted scope set.
    pub fn scopes(&self) -> HashSet<String> {
        self.scope.split_whitespace().map(str::to_owned).collect()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

/// Validates a claim set, short-circuiting on the first failure.
///
/// Check order: subject, issuer, expiry, not-before. A claim set is valid
/// iff every check passes; there is no partial validity.
#[derive(Clone)]
pub struct ClaimsValidator {
    clock: Arc<dyn Clock>,
}

impl Default for ClaimsValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimsValidator {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
        }
    }

    pub fn validate(&self, claims: &Claims) -> Result<(), AuthError> {
        if claims.sub.is_empty() {
            return Err(AuthError::MissingSubject);
        }
        if claims.iss.is_empty() {
            return Err(AuthError::MissingIssuer);
        }

        let now = self.clock.now().timestamp();
        if claims.exp <= now {
            return Err(AuthError::TokenExpired);
        }
        if let Some(nbf) = claims.nbf {
            if nbf > now {
                return Err(AuthError::TokenNotYetValid);
            }
        }

        Ok(())
    }
}
