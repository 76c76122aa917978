use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;
use crate::error::ConfigError;
use crate::loader;

/// Live, validated configuration backed by a YAML file. All writers go
/// through `replace`/`update`, which validate before the lock is swapped
/// and before anything is persisted — a rejected update leaves the live
/// config untouched.
pub struct ConfigStore {
    path: PathBuf,
    inner: RwLock<Arc<Config>>,
}

impl ConfigStore {
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = loader::load(&path)?;
        Ok(Self {
            path,
            inner: RwLock::new(Arc::new(config)),
        })
    }

    /// Current config snapshot. Cheap: an `Arc` clone under a read lock.
    pub async fn current(&self) -> Arc<Config> {
        self.inner.read().await.clone()
    }

    /// Re-read the config file from disk, replacing the live snapshot.
    pub async fn reload(&self) -> Result<Arc<Config>, ConfigError> {
        let config = loader::load(&self.path)?;
        let config = Arc::new(config);
        *self.inner.write().await = config.clone();
        info!(path = %self.path.display(), "config reloaded from disk");
        Ok(config)
    }

    /// Full replacement: validate, swap under the write lock, then persist.
    pub async fn replace(&self, new_config: Config) -> Result<Arc<Config>, ConfigError> {
        new_config.validate()?;
        let new_config = Arc::new(new_config);
        {
            let mut guard = self.inner.write().await;
            *guard = new_config.clone();
        }
        loader::save(&self.path, &new_config)?;
        Ok(new_config)
    }

    /// Scoped sub-update: apply `mutate` to a clone of the current config,
    /// validate the result, then swap and persist exactly like `replace`.
    pub async fn update<F>(&self, mutate: F) -> Result<Arc<Config>, ConfigError>
    where
        F: FnOnce(&mut Config),
    {
        let mut candidate = (*self.inner.read().await).as_ref().clone();
        mutate(&mut candidate);
        self.replace(candidate).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_persists_and_is_visible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk-manager.yaml");
        let store = ConfigStore::load(&path).await.unwrap();

        let mut next = (*store.current().await).clone();
        next.health.concurrency = 9;
        store.replace(next).await.unwrap();

        assert_eq!(store.current().await.health.concurrency, 9);

        let reloaded = loader::load(&path).unwrap();
        assert_eq!(reloaded.health.concurrency, 9);
    }

    #[tokio::test]
    async fn invalid_update_is_rejected_and_live_config_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk-manager.yaml");
        let store = ConfigStore::load(&path).await.unwrap();
        let before = store.current().await;

        let result = store.update(|c| c.probing.concurrency = 0).await;
        assert!(result.is_err());
        assert_eq!(*store.current().await, *before);
    }

    #[tokio::test]
    async fn scoped_update_only_touches_named_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk-manager.yaml");
        let store = ConfigStore::load(&path).await.unwrap();

        store
            .update(|c| c.performance.save_delay_seconds = 10)
            .await
            .unwrap();

        let current = store.current().await;
        assert_eq!(current.performance.save_delay_seconds, 10);
        assert_eq!(current.health.concurrency, Config::default().health.concurrency);
    }
}
