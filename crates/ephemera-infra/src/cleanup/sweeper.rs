use ephemera_core::{Clock, ExpiryState};
use ephemera_storage::{ObjectStore, StorageResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Outcome of one pass over the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Names returned by the listing.
    pub scanned: usize,
    /// Expired objects this pass removed.
    pub deleted: usize,
    /// Expired objects someone else removed first.
    pub already_gone: usize,
    /// Names without a decodable expiry, left alone.
    pub malformed: usize,
    pub live: usize,
    /// Expired objects whose delete failed; retried next pass.
    pub failed: usize,
}

/// Periodically removes objects whose encoded expiry has passed.
///
/// Complements the lazy expiry done on fetch: objects nobody asks for again are
/// reclaimed here.
pub struct ExpirySweeper {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    /// Held for the duration of a sweep.
    in_progress: Mutex<()>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval,
            in_progress: Mutex::new(()),
        }
    }

    /// Start the background sweep loop. The first sweep runs immediately, then one every
    /// interval until `cancel` fires.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(
                interval_secs = self.interval.as_secs(),
                "Expiry sweeper started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!("Expiry sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.try_sweep().await;
                    }
                }
            }
        })
    }

    /// Run a sweep unless one is already in progress. Returns `None` when skipped or
    /// when the store could not be listed.
    pub async fn try_sweep(&self) -> Option<SweepReport> {
        let Ok(_guard) = self.in_progress.try_lock() else {
            tracing::debug!("Previous sweep still running, skipping tick");
            return None;
        };

        match self.sweep().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Expiry sweep failed");
                None
            }
        }
    }

    /// Run one sweep now, waiting for any sweep in progress to finish first.
    pub async fn sweep_once(&self) -> StorageResult<SweepReport> {
        let _guard = self.in_progress.lock().await;
        self.sweep().await
    }

    #[tracing::instrument(skip(self), fields(cleanup.operation = "expire_all"))]
    async fn sweep(&self) -> StorageResult<SweepReport> {
        let names = self.store.list().await?;
        let now = self.clock.now();
        let mut report = SweepReport {
            scanned: names.len(),
            ..SweepReport::default()
        };

        for name in names {
            match ExpiryState::of(&name, now) {
                ExpiryState::Live { .. } => report.live += 1,
                ExpiryState::Unknown => {
                    tracing::trace!(name = %name, "Skipping name without expiry");
                    report.malformed += 1;
                }
                ExpiryState::Expired { expiry } => match self.store.delete(&name).await {
                    Ok(true) => {
                        tracing::debug!(name = %name, expiry, "Deleted expired image");
                        report.deleted += 1;
                    }
                    Ok(false) => report.already_gone += 1,
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            name = %name,
                            "Failed to delete expired image, will retry next sweep"
                        );
                        report.failed += 1;
                    }
                },
            }
        }

        tracing::info!(
            scanned = report.scanned,
            deleted = report.deleted,
            already_gone = report.already_gone,
            malformed = report.malformed,
            live = report.live,
            failed = report.failed,
            "Expiry sweep completed"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ephemera_core::ManualClock;
    use ephemera_storage::{
        LocalStorage, ObjectReader, StorageError, StoredObject,
    };
    use tempfile::TempDir;

    const NOW: i64 = 1_700_000_000;

    async fn setup() -> (TempDir, Arc<LocalStorage>, Arc<ManualClock>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        (dir, store, Arc::new(ManualClock::new(NOW)))
    }

    async fn put(store: &LocalStorage, name: &str) {
        store
            .put(name, Box::pin(std::io::Cursor::new(b"img".to_vec())))
            .await
            .unwrap();
    }

    fn sweeper(store: Arc<LocalStorage>, clock: Arc<ManualClock>) -> ExpirySweeper {
        ExpirySweeper::new(store, clock, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let (_dir, store, clock) = setup().await;
        put(&store, &format!("expired__{}.png", NOW - 1)).await;
        put(&store, &format!("boundary__{}.png", NOW)).await;
        put(&store, &format!("live__{}.png", NOW + 60)).await;
        put(&store, "legacy-upload.png").await;

        let report = sweeper(store.clone(), clock).sweep_once().await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                scanned: 4,
                deleted: 2,
                already_gone: 0,
                malformed: 1,
                live: 1,
                failed: 0,
            }
        );

        let mut remaining = store.list().await.unwrap();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "legacy-upload.png".to_string(),
                format!("live__{}.png", NOW + 60)
            ]
        );
    }

    #[tokio::test]
    async fn test_sweep_follows_clock() {
        let (_dir, store, clock) = setup().await;
        put(&store, &format!("soon__{}", NOW + 10)).await;
        let sweeper = sweeper(store.clone(), clock.clone());

        assert_eq!(sweeper.sweep_once().await.unwrap().deleted, 0);

        clock.advance(10);
        assert_eq!(sweeper.sweep_once().await.unwrap().deleted, 1);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_try_sweep_skips_while_sweep_in_progress() {
        let (_dir, store, clock) = setup().await;
        let sweeper = sweeper(store, clock);

        let guard = sweeper.in_progress.lock().await;
        assert!(sweeper.try_sweep().await.is_none());
        drop(guard);

        assert!(sweeper.try_sweep().await.is_some());
    }

    #[tokio::test]
    async fn test_start_sweeps_immediately_and_stops_on_cancel() {
        let (_dir, store, clock) = setup().await;
        put(&store, &format!("old__{}", NOW - 100)).await;

        let sweeper = Arc::new(ExpirySweeper::new(
            store.clone(),
            clock,
            Duration::from_secs(3600),
        ));
        let cancel = CancellationToken::new();
        let handle = sweeper.start(cancel.clone());

        let mut cleared = false;
        for _ in 0..100 {
            if store.list().await.unwrap().is_empty() {
                cleared = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cleared, "first sweep did not run at startup");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_races_with_fetch_delete() {
        let (_dir, store, clock) = setup().await;
        let name = format!("contested__{}.png", NOW - 1);
        put(&store, &name).await;

        let sweeper = sweeper(store.clone(), clock);
        let fetch_store = store.clone();
        let fetch_name = name.clone();

        let (sweep, fetch_delete) = tokio::join!(sweeper.sweep_once(), async move {
            fetch_store.delete(&fetch_name).await
        });

        let sweep = sweep.unwrap();
        let fetch_removed = fetch_delete.unwrap();
        assert_eq!(sweep.failed, 0);
        assert_eq!(sweep.deleted + usize::from(fetch_removed), 1);
        assert_eq!(sweep.deleted + sweep.already_gone, 1);
        assert!(store.list().await.unwrap().is_empty());
    }

    /// Store whose deletes always fail.
    struct ReadOnlyStore {
        names: Vec<String>,
    }

    #[async_trait]
    impl ObjectStore for ReadOnlyStore {
        async fn put<'a>(&self, name: &str, _reader: ObjectReader<'a>) -> StorageResult<u64> {
            Err(StorageError::UploadFailed(name.to_string()))
        }

        async fn get(&self, name: &str) -> StorageResult<StoredObject> {
            Err(StorageError::NotFound(name.to_string()))
        }

        async fn delete(&self, name: &str) -> StorageResult<bool> {
            Err(StorageError::DeleteFailed(format!("{}: permission denied", name)))
        }

        async fn list(&self) -> StorageResult<Vec<String>> {
            Ok(self.names.clone())
        }

        async fn health_check(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delete_failures_are_counted_and_skipped() {
        let store = Arc::new(ReadOnlyStore {
            names: vec![
                format!("a__{}", NOW - 5),
                format!("b__{}", NOW - 5),
                format!("c__{}", NOW + 5),
            ],
        });
        let sweeper = ExpirySweeper::new(
            store,
            Arc::new(ManualClock::new(NOW)),
            Duration::from_secs(30),
        );

        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.live, 1);
        assert_eq!(report.deleted, 0);
    }
}
