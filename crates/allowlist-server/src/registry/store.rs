//! Storage backends for registrations.

use super::{Admission, NewRegistration, Registration, Registry, RestStore};
use crate::error::AllowlistError;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// In-process store, optionally snapshotted to a JSON file.
pub struct MemoryStore {
    registry: RwLock<Registry>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create an empty store with no persistence.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::new()),
            snapshot_path: None,
        }
    }

    /// Open a store backed by a snapshot file.
    ///
    /// Starts empty if the file doesn't exist yet.
    pub async fn open(snapshot_path: PathBuf) -> Result<Self, AllowlistError> {
        let registry = if fs::try_exists(&snapshot_path).await? {
            let data = fs::read(&snapshot_path).await?;
            let registry: Registry = serde_json::from_slice(&data)?;
            info!(
                "Loaded {} registrations from {:?}",
                registry.count(),
                snapshot_path
            );
            registry
        } else {
            info!(
                "Snapshot not found at {:?}, starting with empty registry",
                snapshot_path
            );
            Registry::new()
        };

        Ok(Self {
            registry: RwLock::new(registry),
            snapshot_path: Some(snapshot_path),
        })
    }

    pub async fn find_by_fid(&self, fid: u64) -> Result<Option<Registration>, AllowlistError> {
        Ok(self.registry.read().await.get(fid).cloned())
    }

    pub async fn find_by_wallet(
        &self,
        wallet: &str,
    ) -> Result<Option<Registration>, AllowlistError> {
        Ok(self.registry.read().await.get_by_wallet(wallet).cloned())
    }

    pub async fn count_tier(&self, tier: &str) -> Result<u64, AllowlistError> {
        Ok(self.registry.read().await.count_tier(tier))
    }

    pub async fn count(&self) -> Result<u64, AllowlistError> {
        Ok(self.registry.read().await.count() as u64)
    }

    /// Admit under the write lock so checks and insert cannot interleave.
    pub async fn admit(
        &self,
        entry: NewRegistration,
        cap: u64,
    ) -> Result<Admission, AllowlistError> {
        let mut registry = self.registry.write().await;
        let admission = registry.admit(entry, cap);

        if let Admission::Admitted(ref row) = admission {
            if let Err(e) = self.save(&registry).await {
                // Keep memory and disk consistent: undo the insert.
                warn!(fid = row.fid, "Snapshot write failed, rolling back admission");
                registry.remove(row.fid);
                return Err(e);
            }
        }

        Ok(admission)
    }

    /// Write the registry snapshot, if persistence is enabled.
    async fn save(&self, registry: &Registry) -> Result<(), AllowlistError> {
        let Some(path) = &self.snapshot_path else {
            debug!("Memory store: no snapshot configured");
            return Ok(());
        };

        let data = serde_json::to_vec_pretty(registry)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &data).await?;
        fs::rename(&temp_path, path).await?;

        debug!("Saved registry snapshot ({} bytes) to {:?}", data.len(), path);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration storage backend.
pub enum Store {
    /// In-process registry
    Memory(MemoryStore),
    /// Hosted relational store behind a REST gateway
    Rest(RestStore),
}

impl Store {
    /// Non-persistent in-memory store.
    pub fn memory() -> Self {
        Store::Memory(MemoryStore::new())
    }

    /// Short backend name for health output.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Rest(_) => "rest",
        }
    }

    pub async fn find_by_fid(&self, fid: u64) -> Result<Option<Registration>, AllowlistError> {
        match self {
            Store::Memory(s) => s.find_by_fid(fid).await,
            Store::Rest(s) => s.find_by_fid(fid).await,
        }
    }

    pub async fn find_by_wallet(
        &self,
        wallet: &str,
    ) -> Result<Option<Registration>, AllowlistError> {
        match self {
            Store::Memory(s) => s.find_by_wallet(wallet).await,
            Store::Rest(s) => s.find_by_wallet(wallet).await,
        }
    }

    pub async fn count_tier(&self, tier: &str) -> Result<u64, AllowlistError> {
        match self {
            Store::Memory(s) => s.count_tier(tier).await,
            Store::Rest(s) => s.count_tier(tier).await,
        }
    }

    pub async fn count(&self) -> Result<u64, AllowlistError> {
        match self {
            Store::Memory(s) => s.count().await,
            Store::Rest(s) => s.count().await,
        }
    }

    /// Atomically check capacity and uniqueness, then insert.
    pub async fn admit(
        &self,
        entry: NewRegistration,
        cap: u64,
    ) -> Result<Admission, AllowlistError> {
        match self {
            Store::Memory(s) => s.admit(entry, cap).await,
            Store::Rest(s) => s.admit(entry, cap).await,
        }
    }
}
