//! Binding a minted NFT to the owner's user record, and reading it back.

use std::sync::Arc;

use solana_sdk::{pubkey::Pubkey, signature::Signature, signer::Signer};
use tracing::{info, instrument, warn};

use crate::{
    cache::MetadataCache,
    error::{Error, Result},
    mint::{MintService, NftHandle},
    program::{derive_user_pda, PfpAccounts, ProgramClient},
    workspace::Workspace,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindAction {
    /// No record existed; one was created
    Initialized,
    /// The existing record now points at the new mint
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOutcome {
    pub action: BindAction,
    pub accounts: PfpAccounts,
    pub signature: Signature,
}

#[derive(Clone)]
pub struct ProfilePictureBinder {
    workspace: Workspace,
    program: Arc<dyn ProgramClient>,
}

impl ProfilePictureBinder {
    pub fn new(workspace: Workspace, program: Arc<dyn ProgramClient>) -> Self {
        Self { workspace, program }
    }

    /// Point the connected owner's record at `nft`.
    ///
    /// Creates the record when the account does not exist and updates it
    /// otherwise. A failed lookup aborts instead of guessing. On success a
    /// workspace refresh is requested.
    #[instrument(skip(self, nft), fields(mint = %nft.mint_address))]
    pub async fn bind(&self, nft: &NftHandle) -> Result<BindOutcome> {
        let owner = self.workspace.require_signer()?;
        let program_id = self.program.program_id();
        let accounts = PfpAccounts::derive(&owner.pubkey(), &nft.mint_address, &program_id);

        let action = match self.program.fetch_user(&accounts.user).await {
            Ok(Some(_)) => BindAction::Updated,
            Ok(None) => BindAction::Initialized,
            Err(e) => {
                warn!(user = %accounts.user, error = %e, "user record lookup failed");
                return Err(Error::RecordLookup(e.to_string()));
            }
        };
        let signature = match action {
            BindAction::Updated => self.program.update(&owner, &accounts).await?,
            BindAction::Initialized => self.program.initialize(&owner, &accounts).await?,
        };
        info!(?action, %signature, user = %accounts.user, "profile picture bound");

        self.workspace.request_refresh();
        Ok(BindOutcome {
            action,
            accounts,
            signature,
        })
    }
}

/// Resolves an owner's current profile picture image.
pub struct ProfilePictureReader {
    workspace: Workspace,
    program: Arc<dyn ProgramClient>,
    mint_service: Arc<dyn MintService>,
    cache: Arc<MetadataCache>,
}

impl ProfilePictureReader {
    pub fn new(
        workspace: Workspace,
        program: Arc<dyn ProgramClient>,
        mint_service: Arc<dyn MintService>,
        cache: Arc<MetadataCache>,
    ) -> Self {
        Self {
            workspace,
            program,
            mint_service,
            cache,
        }
    }

    /// Image URI for the connected owner.
    pub async fn current_image(&self) -> Result<Option<String>> {
        let owner = self.workspace.owner().ok_or(Error::NoWalletConnected)?;
        self.image_for(&owner).await
    }

    /// Image URI for `owner`, or `None` when they have no record.
    #[instrument(skip(self))]
    pub async fn image_for(&self, owner: &Pubkey) -> Result<Option<String>> {
        let (user, _) = derive_user_pda(owner, &self.program.program_id());
        let Some(record) = self.program.fetch_user(&user).await? else {
            return Ok(None);
        };

        let nft = self.mint_service.find_by_mint(&record.pfp).await?;
        let metadata = self.cache.fetch(&nft.uri).await?;
        Ok(Some(metadata.image.clone()))
    }
}
