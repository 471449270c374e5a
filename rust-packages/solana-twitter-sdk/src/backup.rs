//! Opt-in local backup of published metadata.
//!
//! The file is a single JSON object mapping the serialized signing key to the
//! serialized metadata document it published. It holds private key material
//! in plaintext and is only written when a backup path is configured.

use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::{debug, instrument};

use crate::{
    error::{Error, Result},
    key::SigningKey,
    metadata::NftMetadataDocument,
};

#[derive(Debug, Clone)]
pub struct LocalBackup {
    path: PathBuf,
}

impl LocalBackup {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `document` under `key`, replacing any earlier entry for it.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn save(&self, key: &SigningKey, document: &NftMetadataDocument) -> Result<()> {
        let mut entries = self.read_entries().await?;
        entries.insert(key.to_json()?, document.to_canonical_json()?);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&entries)?).await?;
        debug!(entries = entries.len(), "metadata backed up");
        Ok(())
    }

    pub async fn load(&self, key: &SigningKey) -> Result<Option<NftMetadataDocument>> {
        let entries = self.read_entries().await?;
        entries
            .get(&key.to_json()?)
            .map(|raw| serde_json::from_str(raw).map_err(Error::from))
            .transpose()
    }

    async fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}
