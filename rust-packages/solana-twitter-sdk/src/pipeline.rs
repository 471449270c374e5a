//! Profile picture upload pipeline.
//!
//! Image → Arweave → Metadata → Mint → Bind. Each step runs only after the
//! previous one succeeds; nothing is retried and nothing already uploaded is
//! rolled back when a later step fails. A failed metadata backup is logged
//! and does not stop the run.

use std::{path::Path, sync::Arc};

use tracing::{info, instrument, warn};

use crate::{
    backup::LocalBackup,
    error::{Error, Result},
    key::KeyFile,
    metadata::{MetadataPublisher, PublishedMetadata},
    mint::{MintInvoker, MintResult, MintService, NftHandle},
    pfp::{BindOutcome, ProfilePictureBinder},
    program::ProgramClient,
    storage::{ContentAddress, StorageNetwork},
    uploader::ContentUploader,
    workspace::Workspace,
};

/// Image bytes plus the MIME type they are uploaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read an image from disk, taking the MIME type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mime_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_for_extension)
            .ok_or_else(|| Error::InvalidFileType(path.display().to_string()))?;
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime_type, bytes))
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(mime)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub image: ContentAddress,
    pub metadata: PublishedMetadata,
    pub mint: MintResult,
    pub bind: BindOutcome,
}

#[derive(Clone)]
pub struct UploadPipeline {
    workspace: Workspace,
    uploader: ContentUploader,
    publisher: MetadataPublisher,
    minter: MintInvoker,
    binder: ProfilePictureBinder,
    backup: Option<LocalBackup>,
}

impl UploadPipeline {
    pub fn new(
        workspace: Workspace,
        storage: Arc<dyn StorageNetwork>,
        mint_service: Arc<dyn MintService>,
        program: Arc<dyn ProgramClient>,
    ) -> Self {
        Self {
            uploader: ContentUploader::new(Arc::clone(&storage)),
            publisher: MetadataPublisher::new(workspace.clone(), storage),
            minter: MintInvoker::new(workspace.clone(), mint_service),
            binder: ProfilePictureBinder::new(workspace.clone(), program),
            backup: workspace.config().backup_path.clone().map(LocalBackup::new),
            workspace,
        }
    }

    pub fn with_backup(mut self, backup: LocalBackup) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn without_backup(mut self) -> Self {
        self.backup = None;
        self
    }

    #[instrument(skip_all, fields(image = %image.name, bytes = image.bytes.len()))]
    pub async fn run(
        &self,
        image: &ImageFile,
        key_file: Option<&KeyFile>,
    ) -> Result<PipelineOutcome> {
        let key_file = key_file.ok_or(Error::MissingKeyFile)?;
        let key = key_file.load().await?;
        let gateway = self.uploader.gateway().to_string();

        let image_address = self
            .uploader
            .upload(image.bytes.clone(), &image.mime_type, &key)
            .await?;
        info!(uri = %image_address.uri(&gateway), "image stored");

        let metadata = self
            .publisher
            .publish(&image_address, &image.mime_type, &key)
            .await?;
        let metadata_uri = metadata.address.uri(&gateway);
        if let Some(backup) = &self.backup {
            if let Err(e) = backup.save(&key, &metadata.document).await {
                warn!(path = %backup.path().display(), error = %e, "metadata backup failed");
            }
        }

        let mint = self.minter.mint(&metadata_uri).await?;
        let nft = NftHandle {
            mint_address: mint.mint_address,
            name: metadata.document.name.clone(),
            uri: metadata_uri,
        };

        let bind = self.binder.bind(&nft).await?;
        info!(
            mint = %mint.mint_address,
            action = ?bind.action,
            generation = self.workspace.refresh_generation(),
            "profile picture updated"
        );

        Ok(PipelineOutcome {
            image: image_address,
            metadata,
            mint,
            bind,
        })
    }
}
