//! Basic usage example of grpc-scope-auth
//!
//! This example demonstrates how to:
//! 1. Build a scope policy for your service's methods
//! 2. Construct an Authorizer from environment-driven settings
//! 3. Attach the auth layer to a tonic server
//!
//! To run this example:
//! ```bash
//! # Point the layer at a local public key...
//! export AUTH_PUBLIC_KEY_FILE=/etc/keys/oauth_public.pem
//!
//! # ...or at a remote JWKS endpoint
//! export AUTH_JWKS_ENDPOINT=https://auth.example.com/.well-known/jwks.json
//! export AUTH_JWKS_KEY_ID=key-1
//!
//! cargo run --example basic_usage
//! ```

use grpc_scope_auth::{AuthLayer, Authorizer, ScopePolicy, Settings};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Methods not listed here require no scopes at all, so keep this table
    // in sync with the service definition.
    let policy = ScopePolicy::builder()
        .require("PutFoo", ["sync.write"])
        .require("DeleteFoo", ["sync.write", "sync.admin"])
        .build();

    let settings = Settings::from_env()?;
    tracing::info!(?settings, "resolved auth settings");

    let config = settings.into_configuration(policy)?;
    let authorizer = Authorizer::new(config).await?;
    tracing::info!("✅ Authorizer constructed, initial key resolved");

    let auth_layer = AuthLayer::new(Arc::new(authorizer));

    // Attach the layer in front of your generated service:
    //
    // tonic::transport::Server::builder()
    //     .layer(auth_layer)
    //     .add_service(SyncServiceServer::new(MySyncService))
    //     .serve("0.0.0.0:50051".parse()?)
    //     .await?;
    //
    // Handlers then read the verified identity:
    //
    // let owner = request.owner()?;   // via grpc_scope_auth::OwnerExt
    let _ = auth_layer;

    tracing::info!("auth layer ready; wire it into your tonic server");
    Ok(())
}
