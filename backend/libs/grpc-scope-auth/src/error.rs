//! Error types for the authorization layer

use thiserror::Error;
use tonic::{Code, Status};

/// Result type for per-call authorization decisions
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors from resolving a verification key from its configured source.
///
/// Fatal when raised during `Authorizer` construction; logged and swallowed
/// (previous key retained) when raised by a background refresh.
#[derive(Debug, Error)]
pub enum KeyResolutionError {
    /// Key material exists but cannot be decoded into an RSA public key
    #[error("invalid key material: {0}")]
    Format(String),

    /// The key set contains no entry with the configured key id
    #[error("no key with id {0:?} in key set")]
    NotFound(String),

    /// Fetching the key set failed
    #[error("key fetch failed: {0}")]
    Network(String),

    /// Resolution did not complete within the configured timeout
    #[error("key resolution timed out")]
    Timeout,
}

/// Errors produced while authorizing a single inbound call.
///
/// Every variant maps onto exactly one of two wire signals via
/// [`AuthError::to_status`]: `PermissionDenied` for missing scopes (the
/// caller's identity is already proven at that point), `Unauthenticated`
/// for everything else. Validation detail stays in the logs.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization metadata")]
    MissingCredential,

    #[error("malformed authorization metadata")]
    MalformedCredential,

    /// Signature mismatch or structurally unparseable token
    #[error("token verification failed: {0}")]
    InvalidSignature(String),

    #[error("token missing subject claim")]
    MissingSubject,

    #[error("token missing issuer claim")]
    MissingIssuer,

    #[error("token expired")]
    TokenExpired,

    #[error("token not yet valid")]
    TokenNotYetValid,

    /// Required scopes absent from the token's granted set, in policy order
    #[error("missing required scopes: {}", .0.join(", "))]
    MissingScopes(Vec<String>),

    #[error(transparent)]
    KeyResolution(#[from] KeyResolutionError),
}

impl AuthError {
    /// Convert to gRPC Status for the wire protocol.
    ///
    /// Missing/malformed credentials get their own messages (nothing
    /// internal to leak there); signature and claims failures collapse to a
    /// generic message so callers cannot probe validation internals.
    pub fn to_status(&self) -> Status {
        match self {
            AuthError::MissingCredential => {
                Status::new(Code::Unauthenticated, "missing authorization metadata")
            }
            AuthError::MalformedCredential => {
                Status::new(Code::Unauthenticated, "invalid authorization format")
            }
            AuthError::MissingScopes(scopes) => Status::new(
                Code::PermissionDenied,
                format!("missing required scopes: {}", scopes.join(", ")),
            ),
            AuthError::InvalidSignature(_)
            | AuthError::MissingSubject
            | AuthError::MissingIssuer
            | AuthError::TokenExpired
            | AuthError::TokenNotYetValid
            | AuthError::KeyResolution(_) => {
                Status::new(Code::Unauthenticated, "invalid credentials")
            }
        }
    }
}

impl From<AuthError> for Status {
    fn from(err: AuthError) -> Self {
        err.to_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_scopes_maps_to_permission_denied() {
        let err = AuthError::MissingScopes(vec!["required1".to_string(), "required2".to_string()]);
        let status = err.to_status();

        assert_eq!(status.code(), Code::PermissionDenied);
        assert!(status.message().contains("required1, required2"));
    }

    #[test]
    fn test_claims_failures_do_not_leak_detail() {
        for err in [
            AuthError::InvalidSignature("InvalidSignature".to_string()),
            AuthError::MissingSubject,
            AuthError::MissingIssuer,
            AuthError::TokenExpired,
            AuthError::TokenNotYetValid,
        ] {
            let status = err.to_status();
            assert_eq!(status.code(), Code::Unauthenticated);
            assert_eq!(status.message(), "invalid credentials");
        }
    }

    #[test]
    fn test_credential_errors_are_unauthenticated() {
        assert_eq!(
            AuthError::MissingCredential.to_status().code(),
            Code::Unauthenticated
        );
        assert_eq!(
            AuthError::MalformedCredential.to_status().code(),
            Code::Unauthenticated
        );
    }
}
