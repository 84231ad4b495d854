//! Integration tests for the authorization layer
//!
//! These drive the full pipeline the way a tonic server would:
//! HTTP request → AuthService → signature/claims/scope checks → inner
//! service, asserting on the gRPC status headers of rejections and on the
//! owner bound into delegated requests.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use grpc_scope_auth::{
    owner_from, AuthLayer, AuthService, Authorizer, Claims, Configuration, FromFileKeyResolver,
    FromMemoryKeyResolver, JwksResolver, KeyResolutionError, ScopePolicy,
};
use http::{Request, Response};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use tonic::body::BoxBody;
use tower::{Layer, Service};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_PRIVATE_KEY: &str = include_str!("test_private_key.pem");
const TEST_PUBLIC_KEY: &str = include_str!("test_public_key.pem");
const UNTRUSTED_PRIVATE_KEY: &str = include_str!("untrusted_private_key.pem");

/// base64url modulus of tests/test_public_key.pem
const TEST_MODULUS: &str = "ummITcSuOp55akPFaI167KSypG38bLH2ic8JZyu09PGt7TxgeAh-M4fx1nbJlYJkp-MrgoCkhM3HD0kgx2qnkjMqC4XBbfdhyk2HrWz2rPU7W9bHP9bpM0mXy_0qkBxcWGM4rBEQYkSXqBbof6EGC3dJT-zn2C9ipvYR6CYgT0znaj0peSQfUSpZGMYG4uSvvaXTMas17MKijdYw_GYbwWOL5Fy7_2y0ijW39i1bjObN7_34ytgAL-hw5_8MYvVN7pdrm687VUBZjqBOZAcS4ILyYL6CyreV_Zn_Xix3X260F6zVRk6f9gfFPwQ0SmP5F-_E9vkxoAfrDnid251Nmw";

/// Marker header set by the inner service when it is reached.
const INNER_SERVICE_REACHED: &str = "x-inner-service-reached";
/// Header echoing the owner the inner service observed in extensions.
const VERIFIED_OWNER: &str = "x-verified-owner";

fn sign(private_key_pem: &str, claims: &Claims) -> String {
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).expect("test key");
    encode(&Header::new(Algorithm::RS256), claims, &key).expect("sign test token")
}

/// A token valid right now for the given scope string.
fn live_token(private_key_pem: &str, scope: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    sign(
        private_key_pem,
        &Claims {
            sub: "real_owner".to_string(),
            iss: "real_issuer".to_string(),
            exp: now + 3600,
            nbf: Some(now - 10),
            scope: scope.to_string(),
        },
    )
}

/// Inner service standing in for the real gRPC handler stack.
///
/// Echoes the owner it finds in the request extensions so tests can prove
/// identity propagation, and marks that it was reached at all.
#[derive(Clone)]
struct MockInnerService;

impl Service<Request<()>> for MockInnerService {
    type Response = Response<BoxBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<()>) -> Self::Future {
        let owner = owner_from(req.extensions()).map(|o| o.as_str().to_string());

        Box::pin(async move {
            let mut builder = Response::builder()
                .status(200)
                .header(INNER_SERVICE_REACHED, "true");
            if let Some(owner) = owner {
                builder = builder.header(VERIFIED_OWNER, owner);
            }
            Ok(builder.body(BoxBody::default()).expect("build response"))
        })
    }
}

async fn auth_service(policy: ScopePolicy) -> AuthService<MockInnerService> {
    let key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).expect("test key");
    let config = Configuration::new(Arc::new(FromMemoryKeyResolver::new(key)), policy)
        .refresh_interval(Duration::from_secs(3600));

    let authorizer = Authorizer::new(config).await.expect("construct authorizer");
    AuthLayer::new(Arc::new(authorizer)).layer(MockInnerService)
}

fn put_foo_policy() -> ScopePolicy {
    ScopePolicy::builder()
        .require("PutFoo", ["required1"])
        .build()
}

fn request(auth: Option<&str>, rpc_path: &str) -> Request<()> {
    let mut builder = Request::builder().uri(rpc_path);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(()).expect("build request")
}

fn grpc_status(response: &Response<BoxBody>) -> Option<&str> {
    response
        .headers()
        .get("grpc-status")
        .and_then(|v| v.to_str().ok())
}

fn reached_inner(response: &Response<BoxBody>) -> bool {
    response.headers().get(INNER_SERVICE_REACHED).is_some()
}

#[tokio::test]
async fn test_missing_credential_is_unauthenticated() {
    let mut service = auth_service(put_foo_policy()).await;

    let response = service
        .call(request(None, "/syncservice.SyncService/PutFoo"))
        .await
        .expect("service should not error");

    assert!(!reached_inner(&response));
    // tonic::Code::Unauthenticated
    assert_eq!(grpc_status(&response), Some("16"));
}

#[tokio::test]
async fn test_malformed_credential_is_unauthenticated() {
    let mut service = auth_service(put_foo_policy()).await;

    let response = service
        .call(request(
            Some("Basic dXNlcjpwYXNz"),
            "/syncservice.SyncService/PutFoo",
        ))
        .await
        .expect("service should not error");

    assert!(!reached_inner(&response));
    assert_eq!(grpc_status(&response), Some("16"));
}

#[tokio::test]
async fn test_untrusted_key_is_unauthenticated() {
    let mut service = auth_service(put_foo_policy()).await;
    let token = live_token(UNTRUSTED_PRIVATE_KEY, "required1");

    let response = service
        .call(request(
            Some(&format!("Bearer {}", token)),
            "/syncservice.SyncService/PutFoo",
        ))
        .await
        .expect("service should not error");

    assert!(!reached_inner(&response));
    assert_eq!(grpc_status(&response), Some("16"));
}

#[tokio::test]
async fn test_expired_token_is_unauthenticated() {
    let mut service = auth_service(put_foo_policy()).await;
    let now = chrono::Utc::now().timestamp();
    let token = sign(
        TEST_PRIVATE_KEY,
        &Claims {
            sub: "real_owner".to_string(),
            iss: "real_issuer".to_string(),
            exp: now - 60,
            nbf: None,
            scope: "required1".to_string(),
        },
    );

    let response = service
        .call(request(
            Some(&format!("Bearer {}", token)),
            "/syncservice.SyncService/PutFoo",
        ))
        .await
        .expect("service should not error");

    assert!(!reached_inner(&response));
    assert_eq!(grpc_status(&response), Some("16"));
}

#[tokio::test]
async fn test_missing_scope_is_permission_denied_naming_the_scope() {
    let mut service = auth_service(put_foo_policy()).await;
    // Valid identity, wrong grant.
    let token = live_token(TEST_PRIVATE_KEY, "required2");

    let response = service
        .call(request(
            Some(&format!("Bearer {}", token)),
            "/syncservice.SyncService/PutFoo",
        ))
        .await
        .expect("service should not error");

    assert!(!reached_inner(&response));
    // tonic::Code::PermissionDenied
    assert_eq!(grpc_status(&response), Some("7"));

    let message = response
        .headers()
        .get("grpc-message")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(message.contains("required1"), "message was: {}", message);
}

#[tokio::test]
async fn test_full_grant_delegates_with_owner_bound() {
    let mut service = auth_service(put_foo_policy()).await;
    let token = live_token(TEST_PRIVATE_KEY, "required1 required2");

    let response = service
        .call(request(
            Some(&format!("Bearer {}", token)),
            "/syncservice.SyncService/PutFoo",
        ))
        .await
        .expect("service should not error");

    assert!(reached_inner(&response));
    assert_eq!(grpc_status(&response), None);
    assert_eq!(
        response
            .headers()
            .get(VERIFIED_OWNER)
            .and_then(|v| v.to_str().ok()),
        Some("real_owner")
    );
}

#[tokio::test]
async fn test_unlisted_method_needs_no_scopes() {
    let mut service = auth_service(put_foo_policy()).await;
    let token = live_token(TEST_PRIVATE_KEY, "");

    let response = service
        .call(request(
            Some(&format!("Bearer {}", token)),
            "/syncservice.SyncService/GetFoo",
        ))
        .await
        .expect("service should not error");

    assert!(reached_inner(&response));
}

#[tokio::test]
async fn test_jwks_resolver_end_to_end() {
    let mock_server = MockServer::start().await;
    let jwks_body = serde_json::json!({
        "keys": [{
            "kty": "RSA",
            "kid": "key-1",
            "use": "sig",
            "alg": "RS256",
            "n": TEST_MODULUS,
            "e": "AQAB"
        }]
    });
    Mock::given(method("GET"))
        .and(path("/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&jwks_body))
        .mount(&mock_server)
        .await;

    let endpoint = format!("{}/jwks.json", mock_server.uri())
        .parse()
        .expect("endpoint url");
    let resolver = JwksResolver::new(endpoint, "key-1", Duration::from_secs(5)).expect("resolver");

    let config = Configuration::new(Arc::new(resolver), put_foo_policy())
        .refresh_interval(Duration::from_secs(3600));
    let authorizer = Authorizer::new(config).await.expect("construct authorizer");
    let mut service = AuthLayer::new(Arc::new(authorizer)).layer(MockInnerService);

    let token = live_token(TEST_PRIVATE_KEY, "required1");
    let response = service
        .call(request(
            Some(&format!("Bearer {}", token)),
            "/syncservice.SyncService/PutFoo",
        ))
        .await
        .expect("service should not error");

    assert!(reached_inner(&response));
}

#[tokio::test]
async fn test_jwks_unknown_kid_fails_construction() {
    let mock_server = MockServer::start().await;
    let jwks_body = serde_json::json!({
        "keys": [{
            "kty": "RSA",
            "kid": "key-1",
            "n": TEST_MODULUS,
            "e": "AQAB"
        }]
    });
    Mock::given(method("GET"))
        .and(path("/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&jwks_body))
        .mount(&mock_server)
        .await;

    let endpoint = format!("{}/jwks.json", mock_server.uri())
        .parse()
        .expect("endpoint url");
    let resolver =
        JwksResolver::new(endpoint, "absent-key", Duration::from_secs(5)).expect("resolver");

    let result = Authorizer::new(Configuration::new(Arc::new(resolver), ScopePolicy::default()))
        .await;

    assert!(matches!(
        result.err(),
        Some(KeyResolutionError::NotFound(kid)) if kid == "absent-key"
    ));
}

#[tokio::test]
async fn test_jwks_unreachable_endpoint_fails_construction() {
    // Nothing listens on port 1.
    let endpoint = "http://127.0.0.1:1/jwks.json".parse().expect("url");
    let resolver = JwksResolver::new(endpoint, "key-1", Duration::from_secs(1)).expect("resolver");

    let result = Authorizer::new(Configuration::new(Arc::new(resolver), ScopePolicy::default()))
        .await;

    assert!(matches!(result.err(), Some(KeyResolutionError::Network(_))));
}

#[tokio::test]
async fn test_bad_key_file_fails_construction_without_crashing() {
    let dir = std::env::temp_dir().join("grpc-scope-auth-integration");
    tokio::fs::create_dir_all(&dir).await.expect("temp dir");
    let path = dir.join("bad.pem");
    tokio::fs::write(&path, b"").await.expect("write bad pem");

    let resolver = FromFileKeyResolver::new(&path);
    let result = Authorizer::new(
        Configuration::new(Arc::new(resolver), ScopePolicy::default())
            .resolve_timeout(Duration::from_secs(1)),
    )
    .await;

    assert!(matches!(result.err(), Some(KeyResolutionError::Format(_))));
    tokio::fs::remove_file(&path).await.expect("cleanup");
}

#[tokio::test]
async fn test_key_file_end_to_end() {
    let dir = std::env::temp_dir().join("grpc-scope-auth-integration");
    tokio::fs::create_dir_all(&dir).await.expect("temp dir");
    let path = dir.join("good.pem");
    tokio::fs::write(&path, TEST_PUBLIC_KEY).await.expect("write pem");

    let config = Configuration::new(
        Arc::new(FromFileKeyResolver::new(&path)),
        put_foo_policy(),
    );
    let authorizer = Authorizer::new(config).await.expect("construct authorizer");
    let mut service = AuthLayer::new(Arc::new(authorizer)).layer(MockInnerService);

    let token = live_token(TEST_PRIVATE_KEY, "required1");
    let response = service
        .call(request(
            Some(&format!("Bearer {}", token)),
            "/syncservice.SyncService/PutFoo",
        ))
        .await
        .expect("service should not error");

    assert!(reached_inner(&response));
}
