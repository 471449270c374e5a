//! NFT metadata documents and their publication to the storage network.
//!
//! The document follows the Metaplex off-chain JSON standard. It is built
//! once per upload and never mutated after it is published.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::{info, instrument};

use crate::{
    constants::{
        JSON_CONTENT_TYPE, PFP_METADATA_DESCRIPTION, PFP_METADATA_NAME, TOTAL_CREATOR_SHARES,
    },
    error::{Error, Result},
    key::SigningKey,
    storage::{ContentAddress, StorageNetwork},
    uploader::submit,
    workspace::Workspace,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub family: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFile {
    #[serde(rename = "type")]
    pub mime_type: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub address: String,
    pub share: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Properties {
    pub files: Vec<MetadataFile>,
    pub category: String,
    pub max_supply: u64,
    pub creators: Vec<Creator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftMetadataDocument {
    pub name: String,
    pub description: String,
    pub attributes: Vec<Attribute>,
    pub collection: Collection,
    pub image: String,
    pub properties: Properties,
}

impl NftMetadataDocument {
    /// Profile-picture document with a single creator holding every share.
    pub fn profile_picture(image_uri: &str, mime_type: &str, creator: &Pubkey) -> Self {
        Self {
            name: PFP_METADATA_NAME.to_string(),
            description: PFP_METADATA_DESCRIPTION.to_string(),
            attributes: vec![Attribute {
                trait_type: "web".into(),
                value: "yes".into(),
            }],
            collection: Collection {
                name: PFP_METADATA_NAME.to_string(),
                family: PFP_METADATA_NAME.to_string(),
            },
            image: image_uri.to_string(),
            properties: Properties {
                files: vec![MetadataFile {
                    mime_type: mime_type.to_string(),
                    uri: image_uri.to_string(),
                }],
                category: "image".to_string(),
                max_supply: 0,
                creators: vec![Creator {
                    address: creator.to_string(),
                    share: TOTAL_CREATOR_SHARES,
                }],
            },
        }
    }

    /// Creator shares must sum to 100.
    pub fn validate(&self) -> Result<()> {
        let total: u32 = self
            .properties
            .creators
            .iter()
            .map(|c| u32::from(c.share))
            .sum();
        if total != u32::from(TOTAL_CREATOR_SHARES) {
            return Err(Error::InvalidMetadata(format!("shares sum to {total}")));
        }
        Ok(())
    }

    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMetadata {
    pub address: ContentAddress,
    pub document: NftMetadataDocument,
}

#[derive(Clone)]
pub struct MetadataPublisher {
    workspace: Workspace,
    network: Arc<dyn StorageNetwork>,
}

impl MetadataPublisher {
    pub fn new(workspace: Workspace, network: Arc<dyn StorageNetwork>) -> Self {
        Self { workspace, network }
    }

    #[instrument(skip(self, key), fields(image = %image))]
    pub async fn publish(
        &self,
        image: &ContentAddress,
        mime_type: &str,
        key: &SigningKey,
    ) -> Result<PublishedMetadata> {
        let creator = self.workspace.owner().ok_or(Error::NoWalletConnected)?;
        let image_uri = image.uri(self.network.gateway());

        let document = NftMetadataDocument::profile_picture(&image_uri, mime_type, &creator);
        document.validate()?;
        let body = document.to_canonical_json()?.into_bytes();

        let address = submit(self.network.as_ref(), body, JSON_CONTENT_TYPE, key).await?;
        info!(%address, "metadata published");
        Ok(PublishedMetadata { address, document })
    }
}
