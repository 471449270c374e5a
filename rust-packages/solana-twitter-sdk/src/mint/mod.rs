//! NFT minting.

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use tracing::{info, instrument};

use crate::{
    constants::{PFP_MAX_SUPPLY, PFP_MINT_NAME, PFP_SELLER_FEE_BASIS_POINTS},
    error::Result,
    workspace::{WalletSigner, Workspace},
};

pub mod metaplex;

pub use metaplex::MetaplexMintService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateNftInput {
    pub uri: String,
    pub name: String,
    pub seller_fee_basis_points: u16,
    pub max_supply: Option<u64>,
}

/// Outcome of a successful mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintResult {
    pub mint_address: Pubkey,
    /// Owner's token account holding the single token
    pub token_address: Pubkey,
    pub metadata_address: Pubkey,
    pub master_edition_address: Pubkey,
    pub signature: Signature,
}

/// On-chain view of an NFT, enough to locate its off-chain metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftHandle {
    pub mint_address: Pubkey,
    pub name: String,
    pub uri: String,
}

#[async_trait]
pub trait MintService: Send + Sync {
    async fn create(&self, authority: &WalletSigner, input: &CreateNftInput) -> Result<MintResult>;

    async fn find_by_mint(&self, mint: &Pubkey) -> Result<NftHandle>;
}

#[derive(Clone)]
pub struct MintInvoker {
    workspace: Workspace,
    service: Arc<dyn MintService>,
}

impl MintInvoker {
    pub fn new(workspace: Workspace, service: Arc<dyn MintService>) -> Self {
        Self { workspace, service }
    }

    /// Mint a single-edition, royalty-free NFT for `metadata_uri`.
    #[instrument(skip(self))]
    pub async fn mint(&self, metadata_uri: &str) -> Result<MintResult> {
        let authority = self.workspace.require_signer()?;
        let input = CreateNftInput {
            uri: metadata_uri.to_string(),
            name: PFP_MINT_NAME.to_string(),
            seller_fee_basis_points: PFP_SELLER_FEE_BASIS_POINTS,
            max_supply: Some(PFP_MAX_SUPPLY),
        };

        let result = self.service.create(&authority, &input).await?;
        info!(mint = %result.mint_address, token = %result.token_address, "nft minted");
        Ok(result)
    }
}
