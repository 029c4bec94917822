//! Persistent analysis cache: an in-memory map of combined results backed
//! by one JSON file. Writes go through a temp file in the same directory
//! and an atomic rename, serialized by an I/O lock so snapshots reach
//! disk in the order they were taken.

use crate::cache::error::CacheError;
use crate::cache::policy::ValidityPolicy;
use crate::clock::Clock;
use crate::types::area::AreaDescriptor;
use crate::types::combined::CombinedRiskResult;
use crate::types::coordinate::LatLon;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

/// Cache key for an area analysis. Every attribute that changes the
/// result participates, so editing an area's geometry or classification
/// naturally misses the old entry.
pub fn cache_key(location: LatLon, area: &AreaDescriptor) -> String {
    format!(
        "{:.4}_{:.4}_{}_{}_{}",
        location.0, location.1, area.area_ha, area.land_use, area.name
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: DateTime<Utc>,
    pub data: CombinedRiskResult,
}

/// Counts reported by [`AnalysisCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
}

/// The shared analysis cache.
///
/// During a bulk run, plain [`put`](AnalysisCache::put) calls and
/// [`sweep`](AnalysisCache::sweep) are suppressed so per-request writes
/// cannot interleave with the batch; the batch itself writes through
/// [`put_bulk`](AnalysisCache::put_bulk).
pub struct AnalysisCache {
    path: PathBuf,
    policy: ValidityPolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<HashMap<String, CacheEntry>>,
    io_lock: Mutex<()>,
    bulk_run: AtomicBool,
}

impl AnalysisCache {
    /// Opens the cache at `path`, creating the parent directory if needed
    /// and loading any existing file. A file that fails to parse is
    /// treated as empty rather than fatal; the next persist replaces it.
    pub async fn open(
        path: PathBuf,
        policy: ValidityPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::DirCreation(parent.to_path_buf(), e))?;
        }

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, CacheEntry>>(&bytes) {
                Ok(entries) => {
                    info!("loaded {} cached analyses from {}", entries.len(), path.display());
                    entries
                }
                Err(e) => {
                    warn!("cache file {} is unreadable ({e}); starting empty", path.display());
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(CacheError::Read(path, e)),
        };

        Ok(Self {
            path,
            policy,
            clock,
            state: Mutex::new(entries),
            io_lock: Mutex::new(()),
            bulk_run: AtomicBool::new(false),
        })
    }

    /// Returns the cached result for `key` if present and still valid.
    /// Expired entries are left in place for [`sweep`](Self::sweep).
    pub async fn get(&self, key: &str) -> Option<CombinedRiskResult> {
        let state = self.state.lock().await;
        let entry = state.get(key)?;
        self.policy
            .is_valid(entry.timestamp, self.clock.now_utc())
            .then(|| entry.data.clone())
    }

    /// Stores one result and persists. Suppressed while a bulk run is in
    /// progress; the run writes its own results through
    /// [`put_bulk`](Self::put_bulk).
    pub async fn put(&self, key: String, data: CombinedRiskResult) -> Result<(), CacheError> {
        if self.bulk_run.load(Ordering::Acquire) {
            debug!("bulk run in progress; dropping individual write for '{key}'");
            return Ok(());
        }
        self.insert(key, data).await
    }

    /// Stores one result on behalf of the bulk run itself.
    pub async fn put_bulk(&self, key: String, data: CombinedRiskResult) -> Result<(), CacheError> {
        self.insert(key, data).await
    }

    async fn insert(&self, key: String, data: CombinedRiskResult) -> Result<(), CacheError> {
        // Taking the I/O lock before snapshotting keeps persisted
        // snapshots in insertion order.
        let io = self.io_lock.lock().await;
        let snapshot = {
            let mut state = self.state.lock().await;
            state.insert(
                key,
                CacheEntry {
                    timestamp: self.clock.now_utc(),
                    data,
                },
            );
            state.clone()
        };
        self.persist(snapshot, &io).await
    }

    /// Drops expired entries and persists if anything was removed.
    /// Returns the number removed. A no-op during a bulk run.
    pub async fn sweep(&self) -> Result<usize, CacheError> {
        if self.bulk_run.load(Ordering::Acquire) {
            debug!("bulk run in progress; skipping cache sweep");
            return Ok(0);
        }

        let io = self.io_lock.lock().await;
        let now = self.clock.now_utc();
        let (removed, snapshot) = {
            let mut state = self.state.lock().await;
            let before = state.len();
            state.retain(|_, entry| self.policy.is_valid(entry.timestamp, now));
            (before - state.len(), state.clone())
        };

        if removed > 0 {
            info!("cache sweep removed {removed} expired analyses");
            self.persist(snapshot, &io).await?;
        }
        Ok(removed)
    }

    /// Entry counts as of now. Expired entries still count toward `total`
    /// until a sweep removes them.
    pub async fn stats(&self) -> CacheStats {
        let now = self.clock.now_utc();
        let state = self.state.lock().await;
        let valid = state
            .values()
            .filter(|entry| self.policy.is_valid(entry.timestamp, now))
            .count();
        CacheStats {
            total: state.len(),
            valid,
            expired: state.len() - valid,
        }
    }

    /// Marks the start of a bulk run. The returned guard re-enables
    /// individual writes and sweeps when dropped, including on panic.
    pub fn begin_bulk_run(&self) -> BulkRunGuard<'_> {
        if self.bulk_run.swap(true, Ordering::AcqRel) {
            warn!("bulk run flag was already set; overlapping batch runs?");
        }
        BulkRunGuard { cache: self }
    }

    async fn persist(
        &self,
        snapshot: HashMap<String, CacheEntry>,
        _io: &tokio::sync::MutexGuard<'_, ()>,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(CacheError::Serialize)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await?
            .map_err(|(path, e)| CacheError::Write(path, e))
    }
}

/// Writes via a temp file in the target's directory so the rename stays
/// on one filesystem.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), (PathBuf, std::io::Error)> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let fail = |e: std::io::Error| (path.to_path_buf(), e);

    let mut file = NamedTempFile::new_in(parent).map_err(fail)?;
    std::io::Write::write_all(&mut file, bytes).map_err(fail)?;
    file.persist(path)
        .map_err(|e| (path.to_path_buf(), e.error))?;
    Ok(())
}

/// RAII marker for an in-progress bulk run.
pub struct BulkRunGuard<'a> {
    cache: &'a AnalysisCache,
}

impl Drop for BulkRunGuard<'_> {
    fn drop(&mut self) {
        self.cache.bulk_run.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::area::LandUse;
    use crate::types::combined::{RiskLevel, RiskTiers};
    use crate::types::weather::WeatherObservation;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn result(score: f64) -> CombinedRiskResult {
        let tiers = RiskTiers::default();
        let tier = tiers.classify(score);
        CombinedRiskResult {
            combined_risk_score: score,
            combined_risk_level: tier.level,
            combined_risk_color: tier.color.clone(),
            weather_risk_score: score,
            human_risk_score: score,
            weather_weight: 60.0,
            human_weight: 40.0,
            weather_data: WeatherObservation {
                temperature_c: 25.0,
                humidity_pct: 40.0,
                wind_speed_kmh: 15.0,
                precip_mm: 0.0,
                timestamp: Utc.with_ymd_and_hms(2025, 7, 10, 12, 0, 0).unwrap(),
            },
            human_risk_factors: vec![],
            analysis: String::new(),
            distance_from_city: 12.0,
            nearest_city: "ankara".to_string(),
            area_type: LandUse::Forest,
            area_size: 250.0,
        }
    }

    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 10, 9, 0, 0).unwrap()
    }

    async fn open_cache(dir: &TempDir, clock: Arc<ManualClock>) -> AnalysisCache {
        AnalysisCache::open(
            dir.path().join("cache.json"),
            ValidityPolicy::default(),
            clock,
        )
        .await
        .expect("cache opens")
    }

    #[test]
    fn key_includes_every_identity_attribute() {
        let area = AreaDescriptor::new("Belgrad Forest", LandUse::Forest, 5500.0, None);
        let key = cache_key(LatLon(41.1858, 28.9769), &area);
        assert_eq!(key, "41.1858_28.9769_5500_forest_Belgrad Forest");
    }

    #[tokio::test]
    async fn entries_are_retrievable_until_the_boundary_never_after() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(morning()));
        let cache = open_cache(&dir, Arc::clone(&clock)).await;

        cache.put("k".to_string(), result(55.0)).await.unwrap();
        assert!(cache.get("k").await.is_some());

        clock.set(Utc.with_ymd_and_hms(2025, 7, 10, 11, 59, 59).unwrap());
        assert!(cache.get("k").await.is_some());

        clock.set(Utc.with_ymd_and_hms(2025, 7, 10, 12, 0, 0).unwrap());
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn bulk_run_suppresses_individual_writes() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(morning()));
        let cache = open_cache(&dir, clock).await;

        let guard = cache.begin_bulk_run();
        cache.put("solo".to_string(), result(30.0)).await.unwrap();
        assert!(cache.get("solo").await.is_none());

        cache.put_bulk("bulk".to_string(), result(30.0)).await.unwrap();
        assert!(cache.get("bulk").await.is_some());
        drop(guard);

        cache.put("solo".to_string(), result(30.0)).await.unwrap();
        assert!(cache.get("solo").await.is_some());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(morning()));
        let cache = open_cache(&dir, Arc::clone(&clock)).await;

        cache.put("old".to_string(), result(20.0)).await.unwrap();
        clock.set(Utc.with_ymd_and_hms(2025, 7, 10, 13, 0, 0).unwrap());
        cache.put("new".to_string(), result(20.0)).await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats, CacheStats { total: 2, valid: 1, expired: 1 });

        assert_eq!(cache.sweep().await.unwrap(), 1);
        assert_eq!(cache.stats().await.total, 1);
        assert!(cache.get("new").await.is_some());
    }

    #[tokio::test]
    async fn sweep_is_a_noop_during_a_bulk_run() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(morning()));
        let cache = open_cache(&dir, Arc::clone(&clock)).await;

        cache.put("old".to_string(), result(20.0)).await.unwrap();
        clock.set(Utc.with_ymd_and_hms(2025, 7, 11, 13, 0, 0).unwrap());

        let guard = cache.begin_bulk_run();
        assert_eq!(cache.sweep().await.unwrap(), 0);
        drop(guard);
        assert_eq!(cache.sweep().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cache_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(morning()));
        {
            let cache = open_cache(&dir, Arc::clone(&clock)).await;
            cache.put("k".to_string(), result(61.5)).await.unwrap();
        }
        let reopened = open_cache(&dir, clock).await;
        let hit = reopened.get("k").await.expect("persisted entry");
        assert_eq!(hit.combined_risk_score, 61.5);
        assert_eq!(hit.combined_risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn corrupt_cache_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let clock = Arc::new(ManualClock::new(morning()));
        let cache = AnalysisCache::open(path, ValidityPolicy::default(), clock)
            .await
            .expect("opens despite corrupt file");
        assert_eq!(cache.stats().await.total, 0);
    }

    #[tokio::test]
    async fn guard_clears_flag_when_dropped() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(morning()));
        let cache = open_cache(&dir, clock).await;

        {
            let _guard = cache.begin_bulk_run();
            assert!(cache.bulk_run.load(Ordering::Acquire));
        }
        assert!(!cache.bulk_run.load(Ordering::Acquire));
    }
}
