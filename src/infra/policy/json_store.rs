// JSON-file policy store.
//
// The file is written by whoever curates the blocklists; we only ever append
// fingerprints of accepted code. A file that can't be read or compiled leaves
// the store without a snapshot, and every snapshot() call fails until a
// reload succeeds. Missing file = empty policy.

use crate::core::moderation::{
    AccountId, Fingerprint, PolicyError, PolicyFile, PolicyInputs, PolicySource,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct JsonPolicyStore {
    path: PathBuf,
    raw: RwLock<PolicyFile>,
    snapshot: RwLock<Option<Arc<PolicyInputs>>>,
}

impl JsonPolicyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (raw, snapshot) = match Self::read(&path) {
            Ok((raw, inputs)) => (raw, Some(Arc::new(inputs))),
            Err(e) => {
                tracing::warn!("Policy at {} could not be loaded: {}", path.display(), e);
                (PolicyFile::default(), None)
            }
        };

        Self {
            path,
            raw: RwLock::new(raw),
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Re-read the file. On failure the store stays unavailable until the next
    /// successful reload.
    pub async fn reload(&self) -> Result<(), PolicyError> {
        match Self::read(&self.path) {
            Ok((raw, inputs)) => {
                *self.raw.write().await = raw;
                *self.snapshot.write().await = Some(Arc::new(inputs));
                tracing::info!("Policy reloaded from {}", self.path.display());
                Ok(())
            }
            Err(e) => {
                *self.snapshot.write().await = None;
                tracing::warn!("Policy reload from {} failed: {}", self.path.display(), e);
                Err(e)
            }
        }
    }

    fn read(path: &Path) -> Result<(PolicyFile, PolicyInputs), PolicyError> {
        let raw: PolicyFile = if path.exists() {
            let file = std::fs::File::open(path)
                .map_err(|e| PolicyError::Unavailable(e.to_string()))?;
            serde_json::from_reader(file).map_err(|e| PolicyError::Unavailable(e.to_string()))?
        } else {
            PolicyFile::default()
        };

        let inputs = raw.compile()?;
        Ok((raw, inputs))
    }

    async fn persist(&self) -> Result<(), PolicyError> {
        let raw = self.raw.read().await;
        let file = std::fs::File::create(&self.path)
            .map_err(|e| PolicyError::StorageError(e.to_string()))?;
        serde_json::to_writer_pretty(file, &*raw)
            .map_err(|e| PolicyError::StorageError(e.to_string()))?;
        Ok(())
    }

    fn unavailable(&self) -> PolicyError {
        PolicyError::Unavailable(format!("no valid policy loaded from {}", self.path.display()))
    }
}

#[async_trait]
impl PolicySource for JsonPolicyStore {
    async fn snapshot(&self) -> Result<Arc<PolicyInputs>, PolicyError> {
        self.snapshot
            .read()
            .await
            .clone()
            .ok_or_else(|| self.unavailable())
    }

    async fn record_fingerprint(
        &self,
        fingerprint: Fingerprint,
        owner: AccountId,
    ) -> Result<(), PolicyError> {
        {
            let mut snapshot = self.snapshot.write().await;
            let Some(policy) = snapshot.as_mut() else {
                return Err(self.unavailable());
            };
            // Readers holding the old Arc keep their consistent snapshot.
            Arc::make_mut(policy)
                .fingerprints
                .insert(fingerprint.clone(), owner);
        }

        let mut raw = self.raw.write().await;
        raw.fingerprints.insert(fingerprint.to_string(), owner);
        drop(raw); // Release lock before persisting
        self.persist().await
    }
}
