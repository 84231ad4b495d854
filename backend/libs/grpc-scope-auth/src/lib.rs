//! Bearer-token authorization for gRPC services
//!
//! This library guards a tonic server: every inbound unary call passes
//! through one pipeline that verifies an RS256-signed bearer token against
//! a dynamically resolved public key, validates its claims, enforces a
//! per-method required-scope policy, and binds the verified caller
//! identity into the request for downstream handlers.
//!
//! ## Core Components
//!
//! - **KeyResolver**: pluggable key origin (local PEM file, in-memory key,
//!   or remote JWKS endpoint by key id)
//! - **KeyRefresher**: holds the current key and re-resolves it in the
//!   background, so the per-call path never touches the network
//! - **ClaimsValidator**: subject/issuer/validity-window checks against an
//!   injectable clock
//! - **ScopePolicy**: static method → required-scopes table
//! - **Authorizer** / **AuthLayer**: the per-call pipeline and the tower
//!   middleware that attaches it to a server
//! - **Owner** / **OwnerExt**: verified identity carried in request
//!   extensions, with explicit bind and lookup
//!
//! ## Usage
//!
//! ```rust,no_run
//! use grpc_scope_auth::{AuthLayer, Authorizer, Configuration, FromFileKeyResolver, ScopePolicy};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = ScopePolicy::builder()
//!     .require("PutFoo", ["sync.write"])
//!     .require("DeleteFoo", ["sync.write", "sync.admin"])
//!     .build();
//!
//! let config = Configuration::new(
//!     Arc::new(FromFileKeyResolver::new("/etc/keys/oauth_public.pem")),
//!     policy,
//! );
//!
//! let authorizer = Authorizer::new(config).await?;
//! let layer = AuthLayer::new(Arc::new(authorizer));
//!
//! // tonic::transport::Server::builder()
//! //     .layer(layer)
//! //     .add_service(SyncServiceServer::new(service))
//! //     .serve(addr)
//! //     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! In a handler, read the verified identity through the extension trait:
//!
//! ```rust,no_run
//! use grpc_scope_auth::OwnerExt;
//! use tonic::{Request, Status};
//!
//! fn handler<T>(request: Request<T>) -> Result<(), Status> {
//!     let owner = request.owner()?;
//!     tracing::info!(%owner, "handling call");
//!     Ok(())
//! }
//! ```
//!
//! ## Security Guarantees
//!
//! - RS256 only; the caller cannot negotiate the algorithm
//! - No token, invalid token, or invalid claims = `unauthenticated`
//! - Insufficient scopes = `permission_denied`, naming the missing scopes
//! - Construction fails outright when no key can be resolved; a failing
//!   background refresh keeps serving the previous key

mod claims;
mod config;
mod error;
mod extensions;
mod refresher;
mod resolver;
mod scopes;
mod server;

pub use claims::{Claims, ClaimsValidator, Clock, FixedClock, SystemClock};
pub use config::{Configuration, KeySourceSettings, Settings};
pub use error::{AuthError, KeyResolutionError, Result};
pub use extensions::{bind_owner, owner_from, Owner, OwnerExt};
pub use refresher::KeyRefresher;
pub use resolver::{
    key_from_jwks, FromFileKeyResolver, FromMemoryKeyResolver, Jwk, Jwks, JwksResolver,
    KeyResolver,
};
pub use scopes::{ScopePolicy, ScopePolicyBuilder};
pub use server::{AuthLayer, AuthService, Authorizer};

// Re-export tonic Status for convenience
pub use tonic::Status;
