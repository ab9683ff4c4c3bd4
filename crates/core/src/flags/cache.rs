//! Time-bounded snapshot of every flag.
//!
//! # Refresh Strategy
//!
//! - **Fresh hit**: snapshot younger than the TTL is returned without I/O
//! - **Single flight**: at most one repository read runs at a time, guarded
//!   by an async mutex with a double-checked expiry. Callers that waited on
//!   a read take its outcome, success or failure, instead of repeating it
//! - **Non-blocking readers**: callers that find the snapshot expired while
//!   a refresh is already running get the expired snapshot immediately
//! - **Fail soft**: a failed or timed-out refresh serves the previous
//!   snapshot, or an empty list when nothing was ever loaded
//! - **Wholesale replacement**: snapshots are swapped, never patched
//!
//! Repository errors never leave this module; callers see them only as
//! [`SnapshotState::Stale`] or [`SnapshotState::Unavailable`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cortex_domain::{FeatureFlag, FlagCacheConfig};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::feature_flags_ports::FeatureFlagRepository;

/// How the returned flags relate to the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    /// Loaded within the TTL
    Fresh,
    /// Expired snapshot served because a refresh failed or is in flight
    Stale,
    /// Nothing could be loaded; the list is empty
    Unavailable,
}

/// Flags plus their freshness.
#[derive(Debug, Clone)]
pub struct CachedFlags {
    /// Every known flag, sorted as the repository returned them
    pub flags: Arc<[FeatureFlag]>,
    /// Freshness of `flags`
    pub state: SnapshotState,
}

impl CachedFlags {
    fn new(flags: Arc<[FeatureFlag]>, state: SnapshotState) -> Self {
        Self { flags, state }
    }

    fn unavailable() -> Self {
        Self { flags: Arc::from(Vec::new()), state: SnapshotState::Unavailable }
    }

    /// True unless the flags were loaded within the TTL.
    pub fn is_stale(&self) -> bool {
        self.state != SnapshotState::Fresh
    }

    /// Find a flag by id, falling back to name.
    pub fn find(&self, key: &str) -> Option<&FeatureFlag> {
        FeatureFlag::find_in(&self.flags, key)
    }
}

/// Counters describing cache behaviour since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls answered from a fresh snapshot
    pub hits: u64,
    /// Successful repository reads
    pub refreshes: u64,
    /// Repository reads that failed or timed out
    pub refresh_failures: u64,
    /// Calls answered with an expired snapshot
    pub stale_served: u64,
    /// Explicit invalidations
    pub invalidations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
    stale_served: AtomicU64,
    invalidations: AtomicU64,
}

#[derive(Debug, Clone)]
struct Snapshot {
    flags: Arc<[FeatureFlag]>,
    refreshed_at: Instant,
}

/// Result of the most recent repository read, kept for callers that queued
/// behind it.
#[derive(Debug, Clone)]
struct Attempt {
    seq: u64,
    generation: u64,
    outcome: CachedFlags,
}

/// Process-wide flag snapshot, owned and injected by the application.
pub struct FlagCache<C: Clock = SystemClock> {
    repository: Arc<dyn FeatureFlagRepository>,
    clock: C,
    ttl: Duration,
    refresh_timeout: Duration,
    snapshot: RwLock<Option<Snapshot>>,
    refresh_lock: Mutex<()>,
    /// Completed repository reads; written only with `refresh_lock` held.
    attempts: AtomicU64,
    last_attempt: RwLock<Option<Attempt>>,
    /// Bumped on invalidation so an in-flight refresh cannot install data
    /// read before the invalidation.
    generation: AtomicU64,
    counters: Counters,
}

impl FlagCache<SystemClock> {
    /// Cache driven by the system clock.
    pub fn new(repository: Arc<dyn FeatureFlagRepository>, config: FlagCacheConfig) -> Self {
        Self::with_clock(repository, config, SystemClock)
    }
}

impl<C: Clock> FlagCache<C> {
    /// Cache driven by `clock`, for tests that control expiry.
    pub fn with_clock(
        repository: Arc<dyn FeatureFlagRepository>,
        config: FlagCacheConfig,
        clock: C,
    ) -> Self {
        Self {
            repository,
            clock,
            ttl: config.ttl(),
            refresh_timeout: config.refresh_timeout(),
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
            last_attempt: RwLock::new(None),
            generation: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    /// Current flags, refreshing from the repository when expired.
    pub async fn get_all(&self) -> CachedFlags {
        if let Some(fresh) = self.fresh_snapshot() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return fresh;
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let _guard = match self.refresh_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                // Someone else is refreshing; do not wait if we have anything to serve.
                if let Some(stale) = self.any_snapshot() {
                    self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                    return CachedFlags::new(stale.flags, SnapshotState::Stale);
                }
                self.refresh_lock.lock().await
            }
        };

        if let Some(fresh) = self.fresh_snapshot() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return fresh;
        }

        if let Some(shared) = self.completed_since(seen) {
            return shared;
        }

        self.refresh().await
    }

    /// Drop the snapshot so the next [`get_all`](Self::get_all) reads the
    /// repository.
    pub fn invalidate(&self) {
        let mut slot = self.snapshot.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *slot = None;
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!("feature flag cache invalidated");
    }

    /// Counter snapshot since construction.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            refreshes: self.counters.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.counters.refresh_failures.load(Ordering::Relaxed),
            stale_served: self.counters.stale_served.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Configured snapshot time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Must be called with `refresh_lock` held.
    async fn refresh(&self) -> CachedFlags {
        let generation = self.generation.load(Ordering::Acquire);
        let outcome = self.read_repository(generation).await;

        let seq = self.attempts.load(Ordering::Acquire) + 1;
        *self.last_attempt.write() = Some(Attempt { seq, generation, outcome: outcome.clone() });
        self.attempts.store(seq, Ordering::Release);
        outcome
    }

    /// Outcome of a read that finished after the caller observed `seen`,
    /// unless the cache was invalidated since that read started.
    fn completed_since(&self, seen: u64) -> Option<CachedFlags> {
        let slot = self.last_attempt.read();
        let attempt = slot.as_ref()?;
        if attempt.seq <= seen || attempt.generation != self.generation.load(Ordering::Acquire) {
            return None;
        }

        match attempt.outcome.state {
            SnapshotState::Fresh => self.counters.hits.fetch_add(1, Ordering::Relaxed),
            SnapshotState::Stale => self.counters.stale_served.fetch_add(1, Ordering::Relaxed),
            SnapshotState::Unavailable => 0,
        };
        Some(attempt.outcome.clone())
    }

    async fn read_repository(&self, generation: u64) -> CachedFlags {
        let result = tokio::time::timeout(self.refresh_timeout, self.repository.list_flags()).await;

        let error = match result {
            Ok(Ok(flags)) => {
                let flags: Arc<[FeatureFlag]> = Arc::from(flags);
                self.install(generation, Arc::clone(&flags));
                self.counters.refreshes.fetch_add(1, Ordering::Relaxed);
                debug!(flag_count = flags.len(), "feature flag cache refreshed");
                return CachedFlags::new(flags, SnapshotState::Fresh);
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("repository read exceeded {}ms", self.refresh_timeout.as_millis()),
        };

        self.counters.refresh_failures.fetch_add(1, Ordering::Relaxed);

        match self.any_snapshot() {
            Some(stale) => {
                self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                warn!(error = %error, stale = true, "feature flag refresh failed, serving previous snapshot");
                CachedFlags::new(stale.flags, SnapshotState::Stale)
            }
            None => {
                warn!(error = %error, stale = false, "feature flag refresh failed with no snapshot, all flags off");
                CachedFlags::unavailable()
            }
        }
    }

    fn install(&self, generation: u64, flags: Arc<[FeatureFlag]>) {
        let mut slot = self.snapshot.write();
        if self.generation.load(Ordering::Acquire) != generation {
            info!("cache invalidated during refresh, discarding loaded snapshot");
            return;
        }
        *slot = Some(Snapshot { flags, refreshed_at: self.clock.now() });
    }

    fn fresh_snapshot(&self) -> Option<CachedFlags> {
        let now = self.clock.now();
        let slot = self.snapshot.read();
        slot.as_ref()
            .filter(|snapshot| now.saturating_duration_since(snapshot.refreshed_at) < self.ttl)
            .map(|snapshot| CachedFlags::new(Arc::clone(&snapshot.flags), SnapshotState::Fresh))
    }

    fn any_snapshot(&self) -> Option<Snapshot> {
        self.snapshot.read().clone()
    }
}
