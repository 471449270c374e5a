//! # solana-twitter-sdk
//!
//! Rust SDK for the **Solana Twitter** program.
//!
//! Short messages live on-chain; a profile picture is an NFT whose image and
//! metadata are stored on Arweave and whose mint is bound to the owner's user
//! record. Image → Arweave → Metadata → Mint → Bind.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solana_twitter_sdk::{Config, ImageFile, KeyFile, UploadPipeline, Workspace};
//!
//! let workspace = Workspace::new(Config::from_env()?);
//! workspace.connect(signer);
//!
//! let pipeline = UploadPipeline::new(workspace.clone(), storage, minter, program);
//! let image = ImageFile::from_path("avatar.png").await?;
//! let key = KeyFile::from_path("arweave-key.json");
//! let outcome = pipeline.run(&image, Some(&key)).await?;
//! println!("minted {}", outcome.mint.mint_address);
//! ```
//!
//! ## Remote seams
//!
//! | Trait | Production adapter | Purpose |
//! |-------|--------------------|---------|
//! | [`StorageNetwork`] | [`ArweaveClient`] | content-addressed uploads |
//! | [`MintService`] | [`MetaplexMintService`] | NFT creation and lookup |
//! | [`ProgramClient`] | [`RpcProgramClient`] | user records and messages |
//! | [`MetadataSource`] | [`HttpMetadataSource`] | NFT display metadata |
//!
//! The `testutil` feature exposes in-memory doubles of each seam.

use solana_sdk::pubkey::Pubkey;

/// Solana Twitter program ID (devnet deployment)
pub const PROGRAM_ID: Pubkey = solana_sdk::pubkey!("DEVemLxXHPz1tbnBbTVXtvNBHupP2RCBw1jTFN8Uz3FD");

pub mod backup;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod key;
pub mod messages;
pub mod metadata;
pub mod mint;
pub mod pfp;
pub mod pipeline;
pub mod program;
pub mod storage;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod uploader;
pub mod workspace;

pub use backup::LocalBackup;
pub use cache::{
    FailurePolicy, HttpMetadataSource, MetadataCache, MetadataSource, NftDisplayMetadata,
};
pub use config::Config;
pub use error::{Error, Result};
pub use key::{KeyFile, SigningKey};
pub use messages::MessageClient;
pub use metadata::{MetadataPublisher, NftMetadataDocument, PublishedMetadata};
pub use mint::{
    CreateNftInput, MetaplexMintService, MintInvoker, MintResult, MintService, NftHandle,
};
pub use pfp::{BindAction, BindOutcome, ProfilePictureBinder, ProfilePictureReader};
pub use pipeline::{ImageFile, PipelineOutcome, UploadPipeline};
pub use program::{MessageAccount, PfpAccounts, ProgramClient, RpcProgramClient, UserProfileRecord};
pub use storage::{ArweaveClient, ContentAddress, PostResponse, StorageNetwork, StorageTransaction};
pub use uploader::ContentUploader;
pub use workspace::{WalletSigner, WalletState, Workspace};
