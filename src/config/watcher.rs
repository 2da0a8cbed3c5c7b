//! Environments file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::try_load_settings;
use crate::config::store::Config;

/// Watches the environments file and publishes reloaded settings into a
/// shared [`Config`].
pub struct ConfigWatcher {
    path: PathBuf,
    config: Arc<Config>,
}

impl ConfigWatcher {
    pub fn new(path: &Path, config: Arc<Config>) -> Self {
        Self {
            path: path.to_path_buf(),
            config,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive; dropping it stops the watch.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let config = self.config.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = %path.display(), "Config file change detected, reloading...");
                        reload(&path, &config);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            NotifyConfig::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Reload `path` into `config`, keeping the current snapshot on failure.
pub fn reload(path: &Path, config: &Config) -> bool {
    match try_load_settings(path, config.environment(), config.overrides()) {
        Ok(settings) => {
            config.replace(settings);
            true
        }
        Err(e) => {
            tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
            false
        }
    }
}
