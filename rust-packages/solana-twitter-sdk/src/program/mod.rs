//! Client side of the Solana Twitter program.
//!
//! # Features
//!
//! - PDA derivation helpers
//! - Type-safe instruction builders
//! - Account deserialization
//!
//! Instructions and accounts use Anchor's layout: an 8-byte discriminator
//! (`sha256("global:<ix>")` / `sha256("account:<Type>")`) followed by Borsh.

use async_trait::async_trait;
use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::Signature,
    system_program,
};
use spl_associated_token_account::get_associated_token_address;

use crate::{
    constants::USER_SEED,
    error::{Error, Result},
    workspace::WalletSigner,
};

pub mod rpc;

pub use rpc::RpcProgramClient;

pub const DISCRIMINATOR_LENGTH: usize = 8;

/// Compute Anchor instruction discriminator: sha256("global:{name}")[..8]
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    discriminator(&format!("global:{name}"))
}

/// Compute Anchor account discriminator: sha256("account:{name}")[..8]
pub fn account_discriminator(name: &str) -> [u8; 8] {
    discriminator(&format!("account:{name}"))
}

fn discriminator(preimage: &str) -> [u8; 8] {
    let hash = Sha256::digest(preimage.as_bytes());
    let mut disc = [0u8; 8];
    disc.copy_from_slice(&hash[..DISCRIMINATOR_LENGTH]);
    disc
}

// =============================================================================
// PDA DERIVATION
// =============================================================================

/// Derive the user record PDA: ["user", owner]
pub fn derive_user_pda(owner: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[USER_SEED, owner.as_ref()], program_id)
}

/// Derive a message PDA: [author, message_id]
pub fn derive_message_pda(author: &Pubkey, message_id: &str, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[author.as_ref(), message_id.as_bytes()], program_id)
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Per-owner record naming the mint of their profile picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserProfileRecord {
    pub pfp: Pubkey,
    pub owner: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct UserLayout {
    pfp: [u8; 32],
    owner: [u8; 32],
}

impl UserProfileRecord {
    pub fn discriminator() -> [u8; 8] {
        account_discriminator("User")
    }

    pub fn try_from_account_data(data: &[u8]) -> Result<Self> {
        let body = strip_discriminator(data, Self::discriminator(), "User")?;
        let layout = UserLayout::deserialize(&mut &body[..])
            .map_err(|e| Error::InvalidAccountData(format!("User: {e}")))?;
        Ok(Self {
            pfp: Pubkey::new_from_array(layout.pfp),
            owner: Pubkey::new_from_array(layout.owner),
        })
    }

    pub fn to_account_data(&self) -> Result<Vec<u8>> {
        let layout = UserLayout {
            pfp: self.pfp.to_bytes(),
            owner: self.owner.to_bytes(),
        };
        encode_account(Self::discriminator(), &layout)
    }
}

/// A message record. Topic and content are stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAccount {
    /// Address of the record itself
    pub address: Pubkey,
    pub author: Pubkey,
    pub timestamp: i64,
    pub topic: String,
    pub content: String,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct MessageLayout {
    author: [u8; 32],
    timestamp: i64,
    topic: String,
    content: String,
}

impl MessageAccount {
    /// On-chain account type name
    pub const ACCOUNT_NAME: &'static str = "Tweet";

    /// Offset of `author` inside the account data
    pub const AUTHOR_OFFSET: usize = DISCRIMINATOR_LENGTH;

    pub fn discriminator() -> [u8; 8] {
        account_discriminator(Self::ACCOUNT_NAME)
    }

    pub fn try_from_account_data(address: Pubkey, data: &[u8]) -> Result<Self> {
        let name = Self::ACCOUNT_NAME;
        let body = strip_discriminator(data, Self::discriminator(), name)?;
        // Accounts are allocated at maximum size; trailing bytes are padding.
        let layout = MessageLayout::deserialize(&mut &body[..])
            .map_err(|e| Error::InvalidAccountData(format!("{name}: {e}")))?;
        Ok(Self {
            address,
            author: Pubkey::new_from_array(layout.author),
            timestamp: layout.timestamp,
            topic: layout.topic,
            content: layout.content,
        })
    }

    pub fn to_account_data(&self) -> Result<Vec<u8>> {
        let layout = MessageLayout {
            author: self.author.to_bytes(),
            timestamp: self.timestamp,
            topic: self.topic.clone(),
            content: self.content.clone(),
        };
        encode_account(Self::discriminator(), &layout)
    }
}

fn strip_discriminator<'a>(data: &'a [u8], expected: [u8; 8], name: &str) -> Result<&'a [u8]> {
    if data.len() < DISCRIMINATOR_LENGTH {
        return Err(Error::InvalidAccountData(format!("{name}: too short")));
    }
    let (disc, body) = data.split_at(DISCRIMINATOR_LENGTH);
    if disc != expected {
        return Err(Error::InvalidAccountData(format!(
            "{name}: discriminator mismatch"
        )));
    }
    Ok(body)
}

fn encode_account<T: BorshSerialize>(disc: [u8; 8], layout: &T) -> Result<Vec<u8>> {
    let mut data = disc.to_vec();
    layout
        .serialize(&mut data)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(data)
}

// =============================================================================
// INSTRUCTIONS
// =============================================================================

/// Accounts for `initialize` / `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PfpAccounts {
    pub user: Pubkey,
    pub owner: Pubkey,
    /// Owner's associated token account for the NFT mint
    pub token_account: Pubkey,
    /// Mint held by `token_account`; not passed to the program
    pub mint: Pubkey,
}

impl PfpAccounts {
    pub fn derive(owner: &Pubkey, mint: &Pubkey, program_id: &Pubkey) -> Self {
        Self {
            user: derive_user_pda(owner, program_id).0,
            owner: *owner,
            token_account: get_associated_token_address(owner, mint),
            mint: *mint,
        }
    }

    fn metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.user, false),
            AccountMeta::new(self.owner, true),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new_readonly(self.token_account, false),
        ]
    }
}

pub fn initialize_instruction(program_id: &Pubkey, accounts: &PfpAccounts) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.metas(),
        data: instruction_discriminator("initialize").to_vec(),
    }
}

pub fn update_instruction(program_id: &Pubkey, accounts: &PfpAccounts) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.metas(),
        data: instruction_discriminator("update").to_vec(),
    }
}

#[derive(BorshSerialize)]
struct SendMessageArgs<'a> {
    topic: &'a str,
    content: &'a str,
    message_id: &'a str,
}

#[derive(BorshSerialize)]
struct UpdateMessageArgs<'a> {
    topic: &'a str,
    content: &'a str,
}

fn encode_args<T: BorshSerialize>(name: &str, args: &T) -> Result<Vec<u8>> {
    let mut data = instruction_discriminator(name).to_vec();
    args.serialize(&mut data)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(data)
}

pub fn send_message_instruction(
    program_id: &Pubkey,
    author: &Pubkey,
    message_id: &str,
    topic: &str,
    content: &str,
) -> Result<Instruction> {
    let (message, _) = derive_message_pda(author, message_id, program_id);
    let args = SendMessageArgs {
        topic,
        content,
        message_id,
    };
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(message, false),
            AccountMeta::new(*author, true),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: encode_args("send_tweet", &args)?,
    })
}

pub fn update_message_instruction(
    program_id: &Pubkey,
    author: &Pubkey,
    message: &Pubkey,
    topic: &str,
    content: &str,
) -> Result<Instruction> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*message, false),
            AccountMeta::new_readonly(*author, true),
        ],
        data: encode_args("update_tweet", &UpdateMessageArgs { topic, content })?,
    })
}

pub fn delete_message_instruction(
    program_id: &Pubkey,
    author: &Pubkey,
    message: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        // the closed account's lamports go back to the author
        accounts: vec![
            AccountMeta::new(*message, false),
            AccountMeta::new(*author, true),
        ],
        data: instruction_discriminator("delete_tweet").to_vec(),
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[async_trait]
pub trait ProgramClient: Send + Sync {
    fn program_id(&self) -> Pubkey;

    /// `Ok(None)` only when the account does not exist; transport and
    /// decoding failures are errors.
    async fn fetch_user(&self, user: &Pubkey) -> Result<Option<UserProfileRecord>>;

    async fn initialize(&self, owner: &WalletSigner, accounts: &PfpAccounts) -> Result<Signature>;

    async fn update(&self, owner: &WalletSigner, accounts: &PfpAccounts) -> Result<Signature>;

    async fn send_message(
        &self,
        author: &WalletSigner,
        message_id: &str,
        topic: &str,
        content: &str,
    ) -> Result<Pubkey>;

    async fn update_message(
        &self,
        author: &WalletSigner,
        message: &Pubkey,
        topic: &str,
        content: &str,
    ) -> Result<Signature>;

    async fn delete_message(&self, author: &WalletSigner, message: &Pubkey) -> Result<Signature>;

    async fn fetch_message(&self, message: &Pubkey) -> Result<Option<MessageAccount>>;

    async fn fetch_messages(&self, author: Option<&Pubkey>) -> Result<Vec<MessageAccount>>;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::PROGRAM_ID;

    fn sample_record() -> UserProfileRecord {
        UserProfileRecord {
            pfp: Pubkey::new_unique(),
            owner: Pubkey::new_unique(),
        }
    }

    #[rstest]
    #[case("initialize", [175, 175, 109, 31, 13, 152, 155, 237])]
    #[case("update", [219, 200, 88, 176, 158, 63, 253, 127])]
    #[case("send_tweet", [179, 213, 79, 165, 123, 247, 82, 109])]
    #[case("update_tweet", [244, 144, 101, 90, 185, 30, 89, 242])]
    #[case("delete_tweet", [58, 240, 206, 92, 160, 186, 211, 87])]
    fn instruction_discriminators_match_anchor(#[case] name: &str, #[case] expected: [u8; 8]) {
        assert_eq!(instruction_discriminator(name), expected);
    }

    #[test]
    fn account_discriminators_match_anchor() {
        assert_eq!(
            UserProfileRecord::discriminator(),
            [159, 117, 95, 227, 239, 151, 58, 236]
        );
        assert_eq!(
            MessageAccount::discriminator(),
            [229, 13, 110, 58, 118, 6, 20, 79]
        );
    }

    #[test]
    fn user_pda_is_deterministic() {
        let owner = Pubkey::new_unique();
        let (a, bump_a) = derive_user_pda(&owner, &PROGRAM_ID);
        let (b, bump_b) = derive_user_pda(&owner, &PROGRAM_ID);
        assert_eq!((a, bump_a), (b, bump_b));
        assert_ne!(a, derive_user_pda(&Pubkey::new_unique(), &PROGRAM_ID).0);
    }

    #[test]
    fn pfp_accounts_order() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let accounts = PfpAccounts::derive(&owner, &mint, &PROGRAM_ID);
        assert_eq!(
            accounts.token_account,
            get_associated_token_address(&owner, &mint)
        );

        let ix = initialize_instruction(&PROGRAM_ID, &accounts);
        let keys: Vec<_> = ix.accounts.iter().map(|a| a.pubkey).collect();
        assert_eq!(
            keys,
            vec![
                accounts.user,
                owner,
                system_program::ID,
                accounts.token_account,
            ]
        );
        assert!(ix.accounts[1].is_signer);
        assert_eq!(ix.data, instruction_discriminator("initialize").to_vec());
    }

    #[test]
    fn user_record_decodes() {
        let record = sample_record();
        let data = record.to_account_data().unwrap();
        assert_eq!(data.len(), 8 + 64);
        let decoded = UserProfileRecord::try_from_account_data(&data).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn wrong_discriminator_is_rejected() {
        let mut data = sample_record().to_account_data().unwrap();
        data[0] ^= 0xff;
        assert!(matches!(
            UserProfileRecord::try_from_account_data(&data),
            Err(Error::InvalidAccountData(_))
        ));
        let too_short = UserProfileRecord::try_from_account_data(&[1, 2, 3]);
        assert!(too_short.is_err());
    }

    #[test]
    fn padded_message_decodes() {
        let message = MessageAccount {
            address: Pubkey::new_unique(),
            author: Pubkey::new_unique(),
            timestamp: 1_700_000_000,
            topic: "solana".into(),
            content: "gm ☀️".into(),
        };
        let mut data = message.to_account_data().unwrap();
        data.resize(data.len() + 400, 0);
        let decoded = MessageAccount::try_from_account_data(message.address, &data).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn send_message_encodes_strings() {
        let author = Pubkey::new_unique();
        let ix = send_message_instruction(&PROGRAM_ID, &author, "42", "t", "hi").unwrap();

        let mut expected = instruction_discriminator("send_tweet").to_vec();
        for s in ["t", "hi", "42"] {
            expected.extend_from_slice(&(s.len() as u32).to_le_bytes());
            expected.extend_from_slice(s.as_bytes());
        }
        assert_eq!(ix.data, expected);
        let (message, _) = derive_message_pda(&author, "42", &PROGRAM_ID);
        assert_eq!(ix.accounts[0].pubkey, message);
    }
}
