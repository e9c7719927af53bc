//! Process-wide pool of globally popular recent notes.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::feed::{age_hours, FeedNote};
use crate::repository::Repository;
use crate::scoring::{viral_score, Weights};

/// Maximum notes kept in the pool.
pub const VIRAL_POOL_SIZE: i64 = 100;
/// Interval between pool refreshes.
pub const VIRAL_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

struct PoolState {
    notes: Arc<Vec<FeedNote>>,
    refreshed_at: Option<Instant>,
}

/// Shared cache of high-engagement notes from the last 3 days.
///
/// Scores are computed once per refresh with the process-default
/// weights; they go stale between refreshes, which is accepted.
pub struct ViralPool {
    state: Mutex<PoolState>,
}

impl ViralPool {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PoolState {
                notes: Arc::new(vec![]),
                refreshed_at: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Snapshot the current pool; cheap Arc clone under the lock.
    pub fn snapshot(&self) -> Arc<Vec<FeedNote>> {
        self.lock().notes.clone()
    }

    /// Instant of the last successful refresh.
    pub fn refreshed_at(&self) -> Option<Instant> {
        self.lock().refreshed_at
    }

    /// Recompute the pool. A failed query leaves the previous pool in
    /// place.
    pub async fn refresh(&self, repo: &Repository, weights: &Weights) -> Result<()> {
        let rows = repo
            .viral_notes(weights.viral_threshold, VIRAL_POOL_SIZE)
            .await?;
        let now = Utc::now();
        let notes: Vec<FeedNote> = rows
            .into_iter()
            .map(|m| FeedNote {
                score: viral_score(
                    m.global_comments,
                    m.global_reactions,
                    m.global_zaps,
                    age_hours(m.created_at, now),
                    weights,
                ),
                event: m.event,
            })
            .collect();
        info!(count = notes.len(), "viral pool refreshed");
        let mut state = self.lock();
        state.notes = Arc::new(notes);
        state.refreshed_at = Some(Instant::now());
        Ok(())
    }

    /// Refresh immediately, then once per interval, forever.
    pub async fn run(self: Arc<Self>, repo: Repository, weights: Weights) {
        if let Err(e) = self.refresh(&repo, &weights).await {
            warn!(error = %e, "initial viral pool refresh failed");
        }
        let mut ticker = tokio::time::interval(VIRAL_REFRESH_INTERVAL);
        // The first tick completes immediately; the refresh above
        // already covered it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh(&repo, &weights).await {
                warn!(error = %e, "viral pool refresh failed");
            }
        }
    }
}

impl Default for ViralPool {
    fn default() -> Self {
        Self::new()
    }
}
