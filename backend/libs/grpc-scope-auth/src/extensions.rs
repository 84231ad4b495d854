//! Verified caller identity and its request-scoped propagation
//!
//! The owner travels in the request's extensions: explicit bind and lookup
//! with an explicit absent signal, no ambient "current user" state.

use serde::{Deserialize, Serialize};
use tonic::{Request, Status};

/// Opaque identifier of the authenticated caller (the token's `sub`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner(String);

impl Owner {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for Owner {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Owner {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bind the verified owner into a request's extensions.
pub fn bind_owner(extensions: &mut http::Extensions, owner: Owner) {
    extensions.insert(owner);
}

/// Pure lookup; `None` when no owner was bound.
pub fn owner_from(extensions: &http::Extensions) -> Option<&Owner> {
    extensions.get::<Owner>()
}

/// Extension trait for reading the verified owner from gRPC requests.
///
/// The owner is stored by the auth middleware before the handler runs;
/// `owner()` failing therefore means the middleware was not attached.
pub trait OwnerExt {
    /// The verified owner, or `Status::unauthenticated` if absent.
    fn owner(&self) -> Result<&Owner, Status>;

    /// Pure lookup with an explicit absent signal.
    fn owner_opt(&self) -> Option<&Owner>;
}

impl<T> OwnerExt for Request<T> {
    fn owner(&self) -> Result<&Owner, Status> {
        self.owner_opt().ok_or_else(|| {
            Status::unauthenticated("no verified owner bound; is the auth layer attached?")
        })
    }

    fn owner_opt(&self) -> Option<&Owner> {
        self.extensions().get::<Owner>()
    }
}
