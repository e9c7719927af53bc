//! Per-viewer feed cache with coalesced generation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::event::Event;
use crate::feed::FeedNote;

/// How long a generated variant set stays servable.
pub const FEED_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Cache key for a viewer and kind.
pub fn cache_key(viewer: &str, kind: u32) -> String {
    format!("{viewer}_kind_{kind}")
}

/// One viewer's generated variants plus rotation state.
struct CachedFeeds {
    variants: Vec<Vec<FeedNote>>,
    cached_at: Instant,
    last_served: i64,
}

enum Role {
    Leader(watch::Sender<()>, watch::Receiver<()>),
    Waiter(watch::Receiver<()>),
}

/// Memoizes variant sets per `(viewer, kind)` and guarantees at most
/// one in-flight generation per key.
///
/// The pending map holds a watch receiver per key being generated;
/// waiters clone it under the lock and await outside it, so a
/// completion between the two is never missed.
pub struct FeedCache {
    entries: Mutex<HashMap<String, Arc<Mutex<CachedFeeds>>>>,
    pending: Mutex<HashMap<String, watch::Receiver<()>>>,
    ttl: Duration,
}

impl FeedCache {
    pub fn new() -> Self {
        Self::with_ttl(FEED_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Serve up to `limit` events for `key`, generating variants if the
    /// cache is stale.
    ///
    /// Generation runs on its own task so a caller that disconnects
    /// mid-request still leaves a populated cache behind.
    pub async fn serve<F, Fut>(
        self: Arc<Self>,
        key: &str,
        limit: usize,
        generate: F,
    ) -> Result<Vec<Event>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Vec<FeedNote>>>> + Send + 'static,
    {
        if let Some(events) = self.serve_cached(key, limit).await {
            return Ok(events);
        }

        let role = {
            let mut pending = self.pending.lock().await;
            match pending.get(key) {
                Some(rx) => Role::Waiter(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(());
                    pending.insert(key.to_string(), rx.clone());
                    Role::Leader(tx, rx)
                }
            }
        };

        let mut rx = match role {
            Role::Waiter(rx) => {
                debug!(key, "waiting for in-flight feed generation");
                rx
            }
            Role::Leader(tx, rx) => {
                let cache = Arc::clone(&self);
                let key_owned = key.to_string();
                let fut = generate();
                tokio::spawn(async move {
                    match fut.await {
                        Ok(variants) => {
                            let entry = Arc::new(Mutex::new(CachedFeeds {
                                variants,
                                cached_at: Instant::now(),
                                last_served: -1,
                            }));
                            cache.entries.lock().await.insert(key_owned.clone(), entry);
                        }
                        Err(e) => {
                            warn!(key = %key_owned, error = %e, "feed generation failed");
                        }
                    }
                    cache.pending.lock().await.remove(&key_owned);
                    // Dropping the sender wakes every waiter.
                    drop(tx);
                });
                rx
            }
        };

        let _ = rx.changed().await;
        self.serve_cached(key, limit)
            .await
            .ok_or_else(|| anyhow!("feed generation failed"))
    }

    /// Serve from a fresh entry, advancing the round-robin cursor.
    async fn serve_cached(&self, key: &str, limit: usize) -> Option<Vec<Event>> {
        let entry = self.entries.lock().await.get(key).cloned()?;
        let mut cached = entry.lock().await;
        if cached.cached_at.elapsed() >= self.ttl {
            return None;
        }
        if cached.variants.is_empty() {
            return Some(vec![]);
        }
        let idx = ((cached.last_served + 1) as usize) % cached.variants.len();
        cached.last_served = idx as i64;
        Some(
            cached.variants[idx]
                .iter()
                .take(limit)
                .map(|n| n.event.clone())
                .collect(),
        )
    }
}
