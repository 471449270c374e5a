//! Minting through the Metaplex token-metadata program.

use std::sync::Arc;

use async_trait::async_trait;
use mpl_token_metadata::{
    accounts::{MasterEdition, Metadata},
    instructions::{CreateV1Builder, MintV1Builder},
    types::{Creator, PrintSupply, TokenStandard},
};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::Transaction,
};
use spl_associated_token_account::get_associated_token_address;
use tracing::{debug, instrument};

use super::{CreateNftInput, MintResult, MintService, NftHandle};
use crate::{
    constants::{SPL_TOKEN_PROGRAM_ID, TOTAL_CREATOR_SHARES},
    error::{Error, Result},
    workspace::WalletSigner,
};

pub struct MetaplexMintService {
    rpc: Arc<RpcClient>,
}

impl MetaplexMintService {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }
}

/// Instructions that create a non-fungible mint with metadata and master
/// edition, then mint its single token to `owner`.
pub fn create_nft_instructions(
    owner: &Pubkey,
    mint: &Pubkey,
    input: &CreateNftInput,
) -> [Instruction; 2] {
    let (metadata, _) = Metadata::find_pda(mint);
    let (master_edition, _) = MasterEdition::find_pda(mint);
    let token = get_associated_token_address(owner, mint);
    let print_supply = match input.max_supply {
        Some(max) => PrintSupply::Limited(max),
        None => PrintSupply::Unlimited,
    };

    let create = CreateV1Builder::new()
        .metadata(metadata)
        .master_edition(Some(master_edition))
        .mint(*mint, true)
        .authority(*owner)
        .payer(*owner)
        .update_authority(*owner, true)
        .spl_token_program(Some(SPL_TOKEN_PROGRAM_ID))
        .name(input.name.clone())
        .uri(input.uri.clone())
        .seller_fee_basis_points(input.seller_fee_basis_points)
        .creators(vec![Creator {
            address: *owner,
            verified: true,
            share: TOTAL_CREATOR_SHARES,
        }])
        .token_standard(TokenStandard::NonFungible)
        .print_supply(print_supply)
        .instruction();

    let mint_to = MintV1Builder::new()
        .token(token)
        .token_owner(Some(*owner))
        .metadata(metadata)
        .master_edition(Some(master_edition))
        .mint(*mint)
        .authority(*owner)
        .payer(*owner)
        .spl_token_program(SPL_TOKEN_PROGRAM_ID)
        .amount(1)
        .instruction();

    [create, mint_to]
}

#[async_trait]
impl MintService for MetaplexMintService {
    #[instrument(skip_all, fields(uri = %input.uri))]
    async fn create(&self, authority: &WalletSigner, input: &CreateNftInput) -> Result<MintResult> {
        let owner = authority.pubkey();
        let mint = Keypair::new();
        let mint_address = mint.pubkey();
        let instructions = create_nft_instructions(&owner, &mint_address, input);

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let transaction = {
            let signers: Vec<&dyn Signer> = vec![authority.as_ref(), &mint];
            Transaction::new_signed_with_payer(&instructions, Some(&owner), &signers, blockhash)
        };

        let signature = self
            .rpc
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| Error::Mint(e.to_string()))?;
        debug!(%signature, mint = %mint_address, "mint transaction confirmed");

        Ok(MintResult {
            mint_address,
            token_address: get_associated_token_address(&owner, &mint_address),
            metadata_address: Metadata::find_pda(&mint_address).0,
            master_edition_address: MasterEdition::find_pda(&mint_address).0,
            signature,
        })
    }

    async fn find_by_mint(&self, mint: &Pubkey) -> Result<NftHandle> {
        let (address, _) = Metadata::find_pda(mint);
        let account = self
            .rpc
            .get_account_with_commitment(&address, self.rpc.commitment())
            .await?
            .value
            .ok_or(Error::AccountNotFound)?;

        let metadata = Metadata::from_bytes(&account.data)
            .map_err(|e| Error::InvalidAccountData(format!("{address}: {e}")))?;
        Ok(NftHandle {
            mint_address: metadata.mint,
            name: trim_padding(&metadata.name),
            uri: trim_padding(&metadata.uri),
        })
    }
}

/// Metadata strings are stored zero-padded to a fixed width.
fn trim_padding(raw: &str) -> String {
    raw.trim_end_matches('\0').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CreateNftInput {
        CreateNftInput {
            uri: "https://arweave.net/meta".into(),
            name: "Profile NFT".into(),
            seller_fee_basis_points: 0,
            max_supply: Some(1),
        }
    }

    #[test]
    fn create_and_mint_target_derived_accounts() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let [create, mint_to] = create_nft_instructions(&owner, &mint, &input());

        assert_eq!(create.program_id, mpl_token_metadata::ID);
        assert_eq!(mint_to.program_id, mpl_token_metadata::ID);

        let metadata = Metadata::find_pda(&mint).0;
        let edition = MasterEdition::find_pda(&mint).0;
        let token = get_associated_token_address(&owner, &mint);

        let create_keys: Vec<_> = create.accounts.iter().map(|a| a.pubkey).collect();
        assert!(create_keys.contains(&metadata));
        assert!(create_keys.contains(&edition));
        let mint_meta = create.accounts.iter().find(|a| a.pubkey == mint).unwrap();
        assert!(mint_meta.is_signer);

        let mint_keys: Vec<_> = mint_to.accounts.iter().map(|a| a.pubkey).collect();
        assert!(mint_keys.contains(&token));
        assert!(mint_keys.contains(&owner));
    }

    #[test]
    fn padding_is_trimmed() {
        assert_eq!(
            trim_padding("https://arweave.net/x\0\0\0"),
            "https://arweave.net/x"
        );
    }
}
