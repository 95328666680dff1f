//! Permission store backends.
//!
//! A [`ConfigStore`] only knows how to load and save a whole
//! [`PermissionConfig`]. Callers that mutate should go through
//! [`ConfigTransactor`](crate::ConfigTransactor) instead of calling
//! [`ConfigStore::save`] directly.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    ops::{Deref, DerefMut},
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use {async_trait::async_trait, fd_lock::RwLock, tracing::debug};

use crate::{Error, Result, record::PermissionConfig};

/// Load/save contract for the persisted permission document.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> Result<PermissionConfig>;
    async fn save(&self, config: &PermissionConfig) -> Result<()>;
}

/// A loaded copy of the permission document bound to the store it came from.
///
/// Reads and writes go to the in-memory copy; nothing reaches the store
/// until [`ConfigHandle::save`]. Dropping an unsaved handle discards its
/// changes.
pub struct ConfigHandle {
    store: Arc<dyn ConfigStore>,
    config: PermissionConfig,
}

impl ConfigHandle {
    pub async fn load(store: Arc<dyn ConfigStore>) -> Result<Self> {
        let config = store.load().await?;
        Ok(Self { store, config })
    }

    pub async fn save(&self) -> Result<()> {
        self.store.save(&self.config).await
    }

    pub fn into_inner(self) -> PermissionConfig {
        self.config
    }
}

impl Deref for ConfigHandle {
    type Target = PermissionConfig;

    fn deref(&self) -> &Self::Target {
        &self.config
    }
}

impl DerefMut for ConfigHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.config
    }
}

// ── JSON file ───────────────────────────────────────────────────────────────

/// JSON file-backed store.
///
/// Saves write a sibling temp file under an exclusive file lock and rename
/// it over the original, so a failed save never leaves a half-written
/// document behind.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn load(&self) -> Result<PermissionConfig> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<PermissionConfig> {
            if !path.exists() {
                return Ok(PermissionConfig::default());
            }
            let data = fs::read_to_string(&path)?;
            if data.trim().is_empty() {
                return Ok(PermissionConfig::default());
            }
            Ok(serde_json::from_str(&data)?)
        })
        .await?
    }

    async fn save(&self, config: &PermissionConfig) -> Result<()> {
        let path = self.path.clone();
        let data = serde_json::to_string_pretty(config)?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            let tmp = path.with_extension("json.tmp");
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            let mut lock = RwLock::new(file);
            {
                let mut guard = lock
                    .write()
                    .map_err(|e| Error::lock_failed(e.to_string()))?;
                guard.write_all(data.as_bytes())?;
                guard.sync_all()?;
            }
            fs::rename(&tmp, &path)?;
            debug!(path = %path.display(), "saved permission store");
            Ok(())
        })
        .await?
    }
}

// ── In-memory ───────────────────────────────────────────────────────────────

/// Process-local store. Loads and saves can be made to fail, which is how
/// persistence failures are exercised.
#[derive(Default)]
pub struct MemoryStore {
    config: Mutex<PermissionConfig>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PermissionConfig) -> Self {
        Self {
            config: Mutex::new(config),
            ..Self::default()
        }
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Result<PermissionConfig> {
        self.config
            .lock()
            .map(|cfg| cfg.clone())
            .map_err(|_| Error::lock_failed("memory store poisoned"))
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load(&self) -> Result<PermissionConfig> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("injected load failure")));
        }
        self.snapshot()
    }

    async fn save(&self, config: &PermissionConfig) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("injected save failure")));
        }
        let mut current = self
            .config
            .lock()
            .map_err(|_| Error::lock_failed("memory store poisoned"))?;
        *current = config.clone();
        Ok(())
    }
}
