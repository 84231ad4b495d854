//! Per-call authorization pipeline and its tower middleware
//!
//! The [`Authorizer`] makes the decision; [`AuthLayer`] attaches it in
//! front of a tonic server so every inbound call passes through the same
//! path with no bypass.
//!
//! ## Pipeline
//!
//! Per call, in order, short-circuiting to rejection:
//! 1. Extract `Bearer <token>` from the `authorization` metadata.
//! 2. Verify the RS256 signature against the refresher's current key. A
//!    token that fails to parse structurally is rejected here, before any
//!    claims check runs.
//! 3. Validate the claim set (subject, issuer, validity window).
//! 4. Check the method's required scopes against the granted set.
//! 5. Bind the verified owner into the request extensions and delegate.
//!
//! There is no per-call network I/O: the key is always pre-resolved by the
//! [`KeyRefresher`], so latency is dominated by local signature
//! cryptography.
//!
//! ## Security
//!
//! - RS256 only, no algorithm negotiation with the caller.
//! - Signature and claims failures all collapse to `unauthenticated` on
//!   the wire; the underlying reason is logged at WARN.
//! - Missing scope names are disclosed in the `permission_denied` message;
//!   the caller's identity is already proven at that point.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use jsonwebtoken::{decode, Algorithm, Validation};
use tonic::body::BoxBody;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::claims::{Claims, ClaimsValidator, Clock};
use crate::config::Configuration;
use crate::error::{AuthError, KeyResolutionError};
use crate::extensions::{bind_owner, Owner};
use crate::refresher::KeyRefresher;
use crate::scopes::ScopePolicy;

/// Orchestrates the full authorization decision for one inbound call.
///
/// Construction resolves the initial verification key and fails if that
/// resolution fails; see [`KeyRefresher::new`].
pub struct Authorizer {
    refresher: KeyRefresher,
    validator: ClaimsValidator,
    policy: ScopePolicy,
}

impl Authorizer {
    pub async fn new(config: Configuration) -> Result<Self, KeyResolutionError> {
        let Configuration {
            key_resolver,
            refresh_interval,
            resolve_timeout,
            policy,
        } = config;

        if policy.is_empty() {
            warn!("scope policy is empty; every method is default-permitted");
        }

        let refresher = KeyRefresher::new(key_resolver, refresh_interval, resolve_timeout).await?;

        Ok(Self {
            refresher,
            validator: ClaimsValidator::new(),
            policy,
        })
    }

    /// Replace the validation clock. Test hook for pinning "now".
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.validator = ClaimsValidator::with_clock(clock);
        self
    }

    /// Run the pipeline against a call's headers and full method path.
    ///
    /// Returns the verified claims on success so the caller can bind the
    /// owner and pass scope data along.
    pub fn authorize(
        &self,
        headers: &http::HeaderMap,
        method: &str,
    ) -> Result<Claims, AuthError> {
        let token = extract_bearer(headers)?;
        let claims = self.verify_signature(token)?;
        self.validator.validate(&claims)?;

        let missing = self.policy.missing_scopes(method, &claims.scopes());
        if !missing.is_empty() {
            return Err(AuthError::MissingScopes(missing));
        }

        Ok(claims)
    }

    /// Verify the token's RS256 signature and decode its payload.
    ///
    /// Temporal checks are disabled here on purpose: expiry and not-before
    /// are the [`ClaimsValidator`]'s job, against the injected clock.
    fn verify_signature(&self, token: &str) -> Result<Claims, AuthError> {
        let key = self.refresher.current_key();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = Default::default();

        decode::<Claims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidSignature(e.to_string()))
    }
}

/// Extract the token from an `authorization: Bearer <token>` header.
fn extract_bearer(headers: &http::HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;

    let value = value.to_str().map_err(|_| AuthError::MalformedCredential)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedCredential)?;

    if token.is_empty() {
        return Err(AuthError::MalformedCredential);
    }

    Ok(token)
}

/// Tower layer attaching an [`Authorizer`] in front of a tonic server.
///
/// A plain tonic interceptor never sees the RPC path, so the per-method
/// scope policy lives in a `tower::Layer` instead, where the URI carries
/// the full `/package.Service/Method` name.
///
/// ```rust,no_run
/// # async fn example(authorizer: grpc_scope_auth::Authorizer) {
/// use grpc_scope_auth::AuthLayer;
/// use std::sync::Arc;
///
/// let layer = AuthLayer::new(Arc::new(authorizer));
///
/// // tonic::transport::Server::builder()
/// //     .layer(layer)
/// //     .add_service(SyncServiceServer::new(service))
/// # }
/// ```
#[derive(Clone)]
pub struct AuthLayer {
    authorizer: Arc<Authorizer>,
}

impl AuthLayer {
    pub fn new(authorizer: Arc<Authorizer>) -> Self {
        Self { authorizer }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            authorizer: Arc::clone(&self.authorizer),
        }
    }
}

/// The service produced by [`AuthLayer`].
///
/// Rejections never surface as service errors; they become gRPC status
/// responses so the transport stays healthy.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    authorizer: Arc<Authorizer>,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for AuthService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let authorizer = Arc::clone(&self.authorizer);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let method = req.uri().path().to_owned();

            let claims = match authorizer.authorize(req.headers(), &method) {
                Ok(claims) => claims,
                Err(err) => {
                    warn!(method = %method, error = %err, "request rejected");
                    return Ok(err.to_status().into_http());
                }
            };

            debug!(method = %method, owner = %claims.sub, "request authorized");

            let (mut parts, body) = req.into_parts();
            bind_owner(&mut parts.extensions, Owner::from(claims.sub.clone()));
            parts.extensions.insert(claims);

            inner.call(http::Request::from_parts(parts, body)).await
        })
    }
}
