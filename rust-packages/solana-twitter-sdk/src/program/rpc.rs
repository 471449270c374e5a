//! [`ProgramClient`] over JSON-RPC.

use std::sync::Arc;

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_sdk::{
    instruction::Instruction, pubkey::Pubkey, signature::Signature, signer::Signer,
    transaction::Transaction,
};
use tracing::{debug, instrument};

use super::{
    delete_message_instruction, derive_message_pda, initialize_instruction,
    send_message_instruction, update_instruction, update_message_instruction, MessageAccount,
    PfpAccounts, ProgramClient, UserProfileRecord,
};
use crate::{error::Result, workspace::WalletSigner};

pub struct RpcProgramClient {
    rpc: Arc<RpcClient>,
    program_id: Pubkey,
}

impl RpcProgramClient {
    pub fn new(rpc: Arc<RpcClient>, program_id: Pubkey) -> Self {
        Self { rpc, program_id }
    }

    async fn send(&self, signer: &WalletSigner, instruction: Instruction) -> Result<Signature> {
        let payer = signer.pubkey();
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let transaction = {
            let signers: Vec<&dyn Signer> = vec![signer.as_ref()];
            Transaction::new_signed_with_payer(&[instruction], Some(&payer), &signers, blockhash)
        };

        let signature = self.rpc.send_and_confirm_transaction(&transaction).await?;
        debug!(%signature, "transaction confirmed");
        Ok(signature)
    }

    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let response = self
            .rpc
            .get_account_with_commitment(address, self.rpc.commitment())
            .await?;
        Ok(response.value.map(|account| account.data))
    }
}

#[async_trait]
impl ProgramClient for RpcProgramClient {
    fn program_id(&self) -> Pubkey {
        self.program_id
    }

    async fn fetch_user(&self, user: &Pubkey) -> Result<Option<UserProfileRecord>> {
        self.get_account_data(user)
            .await?
            .map(|data| UserProfileRecord::try_from_account_data(&data))
            .transpose()
    }

    #[instrument(skip(self, owner))]
    async fn initialize(&self, owner: &WalletSigner, accounts: &PfpAccounts) -> Result<Signature> {
        let instruction = initialize_instruction(&self.program_id, accounts);
        self.send(owner, instruction).await
    }

    #[instrument(skip(self, owner))]
    async fn update(&self, owner: &WalletSigner, accounts: &PfpAccounts) -> Result<Signature> {
        let instruction = update_instruction(&self.program_id, accounts);
        self.send(owner, instruction).await
    }

    async fn send_message(
        &self,
        author: &WalletSigner,
        message_id: &str,
        topic: &str,
        content: &str,
    ) -> Result<Pubkey> {
        let author_key = author.pubkey();
        let instruction =
            send_message_instruction(&self.program_id, &author_key, message_id, topic, content)?;
        self.send(author, instruction).await?;
        let (message, _) = derive_message_pda(&author_key, message_id, &self.program_id);
        Ok(message)
    }

    async fn update_message(
        &self,
        author: &WalletSigner,
        message: &Pubkey,
        topic: &str,
        content: &str,
    ) -> Result<Signature> {
        let author_key = author.pubkey();
        let instruction =
            update_message_instruction(&self.program_id, &author_key, message, topic, content)?;
        self.send(author, instruction).await
    }

    async fn delete_message(&self, author: &WalletSigner, message: &Pubkey) -> Result<Signature> {
        let instruction = delete_message_instruction(&self.program_id, &author.pubkey(), message);
        self.send(author, instruction).await
    }

    async fn fetch_message(&self, message: &Pubkey) -> Result<Option<MessageAccount>> {
        self.get_account_data(message)
            .await?
            .map(|d| MessageAccount::try_from_account_data(*message, &d))
            .transpose()
    }

    async fn fetch_messages(&self, author: Option<&Pubkey>) -> Result<Vec<MessageAccount>> {
        let mut filters = vec![RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
            0,
            MessageAccount::discriminator().to_vec(),
        ))];
        if let Some(author) = author {
            filters.push(RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                MessageAccount::AUTHOR_OFFSET,
                author.to_bytes().to_vec(),
            )));
        }
        let config = RpcProgramAccountsConfig {
            filters: Some(filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.rpc.commitment()),
                ..RpcAccountInfoConfig::default()
            },
            ..RpcProgramAccountsConfig::default()
        };

        let accounts = self
            .rpc
            .get_program_accounts_with_config(&self.program_id, config)
            .await?;
        let mut messages = accounts
            .into_iter()
            .map(|(address, account)| {
                MessageAccount::try_from_account_data(address, &account.data)
            })
            .collect::<Result<Vec<_>>>()?;
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(messages)
    }
}
