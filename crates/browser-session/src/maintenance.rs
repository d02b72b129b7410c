use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Browser cache subpaths the purge task clears, relative to the profile
/// directory.
pub const DEFAULT_CACHE_SUBPATHS: &[&str] = &[
    "Default/Cache",
    "Default/Code Cache",
    "Default/Service Worker/CacheStorage",
];

/// Periodic profile cache purge. Every `interval` the named subpaths under
/// the profile directory are removed; individual removal failures are
/// swallowed and logged at debug. Off unless explicitly spawned — clearing
/// caches under a live session is a known hazard, so the owner opts in.
pub struct ProfileMaintenance {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ProfileMaintenance {
    pub fn spawn(profile_dir: PathBuf, period: Duration, subpaths: Vec<PathBuf>) -> Self {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval(period.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick fires immediately; skip it so a purge never
            // races the launch that just populated the profile
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => purge(&profile_dir, &subpaths).await,
                }
            }
        });
        Self { cancel, task }
    }

    pub fn with_defaults(profile_dir: PathBuf, period: Duration) -> Self {
        let subpaths = DEFAULT_CACHE_SUBPATHS.iter().map(PathBuf::from).collect();
        Self::spawn(profile_dir, period, subpaths)
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn purge(profile_dir: &PathBuf, subpaths: &[PathBuf]) {
    for sub in subpaths {
        let target = profile_dir.join(sub);
        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => debug!(path = %target.display(), "cache path purged"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => debug!(path = %target.display(), error = %err, "cache purge skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::time::sleep;

    #[tokio::test(flavor = "multi_thread")]
    async fn purges_named_subpaths_and_survives_missing_ones() {
        let profile = tempdir().unwrap();
        let cache = profile.path().join("cache");
        tokio::fs::create_dir_all(&cache).await.unwrap();
        tokio::fs::write(cache.join("blob"), b"x").await.unwrap();

        let task = ProfileMaintenance::spawn(
            profile.path().to_path_buf(),
            Duration::from_millis(20),
            vec![PathBuf::from("cache"), PathBuf::from("missing")],
        );

        sleep(Duration::from_millis(120)).await;
        assert!(!cache.exists());
        task.shutdown().await;
    }
}
