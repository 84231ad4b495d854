//! Background key refresh
//!
//! Keeps a fresh verification key available to concurrent verifiers without
//! per-call network I/O. One slot per `Authorizer` instance, never a
//! process-wide global, so instances in the same process (tests included)
//! cannot interfere.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use jsonwebtoken::DecodingKey;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::KeyResolutionError;
use crate::resolver::KeyResolver;

/// Owns the single mutable "current key" slot.
///
/// Construction performs one awaited resolution and fails if it fails: an
/// authorizer with no key at all must not exist. Afterwards a background
/// task re-resolves at the configured interval and swaps the slot on
/// success. Refresh failures retain the previous key (stale-but-valid
/// beats no key) and are reported through `tracing` only.
///
/// Readers and the refresh writer contend only on a `RwLock` held for the
/// duration of a clone or a swap.
pub struct KeyRefresher {
    key: Arc<RwLock<DecodingKey>>,
    task: JoinHandle<()>,
}

impl KeyRefresher {
    /// Resolve the initial key and start the refresh task.
    ///
    /// Each resolution attempt, including this first one, is bounded by
    /// `resolve_timeout`. A timeout here is a fatal construction error with
    /// no retry; in the background loop it is logged and the next attempt
    /// waits for the following tick.
    pub async fn new(
        resolver: Arc<dyn KeyResolver>,
        refresh_interval: Duration,
        resolve_timeout: Duration,
    ) -> Result<Self, KeyResolutionError> {
        let initial = resolve_with_timeout(resolver.as_ref(), resolve_timeout).await?;
        let key = Arc::new(RwLock::new(initial));

        let task = tokio::spawn(refresh_loop(
            Arc::clone(&key),
            resolver,
            refresh_interval,
            resolve_timeout,
        ));

        Ok(Self { key, task })
    }

    /// Snapshot of the currently held key.
    ///
    /// Callers always observe either the old or the new key in full; the
    /// read lock is held only long enough to clone.
    pub fn current_key(&self) -> DecodingKey {
        self.key
            .read()
            .expect("key slot RwLock poisoned")
            .clone()
    }
}

impl Drop for KeyRefresher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn resolve_with_timeout(
    resolver: &dyn KeyResolver,
    timeout: Duration,
) -> Result<DecodingKey, KeyResolutionError> {
    match tokio::time::timeout(timeout, resolver.resolve_key()).await {
        Ok(result) => result,
        Err(_) => Err(KeyResolutionError::Timeout),
    }
}

async fn refresh_loop(
    slot: Arc<RwLock<DecodingKey>>,
    resolver: Arc<dyn KeyResolver>,
    refresh_interval: Duration,
    resolve_timeout: Duration,
) {
    let mut ticker = tokio::time::interval(refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately; the construction-time resolution
    // already covered it.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        match resolve_with_timeout(resolver.as_ref(), resolve_timeout).await {
            Ok(fresh) => {
                *slot.write().expect("key slot RwLock poisoned") = fresh;
                debug!("verification key refreshed");
            }
            Err(e) => {
                warn!(error = %e, "key refresh failed, retaining previous key");
            }
        }
    }
}
