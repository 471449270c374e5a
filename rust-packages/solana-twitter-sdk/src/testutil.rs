//! In-memory doubles of every remote seam.
//!
//! Feature-gated behind `testutil`. Enable it in `[dev-dependencies]` for
//! integration tests:
//!
//! ```toml
//! [dev-dependencies]
//! solana-twitter-sdk = { path = ".", features = ["testutil"] }
//! ```

use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicI64, AtomicU64, Ordering},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use solana_sdk::{pubkey::Pubkey, signature::Signature, signer::Signer};
use spl_associated_token_account::get_associated_token_address;

use crate::{
    cache::MetadataSource,
    constants::{DEFAULT_STORAGE_GATEWAY, MAX_CONTENT_CHARS, MAX_TOPIC_CHARS},
    error::{Error, Result},
    key::SigningKey,
    mint::{CreateNftInput, MintResult, MintService, NftHandle},
    program::{
        derive_message_pda, derive_user_pda, MessageAccount, PfpAccounts, ProgramClient,
        UserProfileRecord,
    },
    storage::{PostResponse, StorageNetwork, StorageTransaction},
    workspace::WalletSigner,
    PROGRAM_ID,
};

/// A JWK that parses and carries a private exponent. Only usable with
/// [`MemoryStorageNetwork`], which does not verify signatures.
#[must_use]
pub fn test_signing_key() -> SigningKey {
    SigningKey {
        kty: "RSA".into(),
        e: "AQAB".into(),
        n: URL_SAFE_NO_PAD.encode([0x5a; 64]),
        d: Some(URL_SAFE_NO_PAD.encode([0x11; 64])),
        p: None,
        q: None,
        dp: None,
        dq: None,
        qi: None,
    }
}

#[must_use]
pub fn test_key_json() -> Vec<u8> {
    serde_json::to_vec(&test_signing_key()).expect("test key serializes")
}

// =============================================================================
// STORAGE NETWORK
// =============================================================================

/// Storage network that answers posts from a script of status codes
/// (200 once the script runs out) and records every accepted post.
pub struct MemoryStorageNetwork {
    statuses: Mutex<VecDeque<u16>>,
    posted: Mutex<Vec<StorageTransaction>>,
    created: AtomicU64,
}

impl Default for MemoryStorageNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorageNetwork {
    pub fn new() -> Self {
        Self::with_statuses([])
    }

    pub fn with_statuses(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            posted: Mutex::new(Vec::new()),
            created: AtomicU64::new(0),
        }
    }

    /// Every transaction passed to `post`, in order.
    pub fn posted(&self) -> Vec<StorageTransaction> {
        self.posted.lock().clone()
    }

    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageNetwork for MemoryStorageNetwork {
    fn gateway(&self) -> &str {
        DEFAULT_STORAGE_GATEWAY
    }

    async fn create_transaction(
        &self,
        data: Vec<u8>,
        key: &SigningKey,
    ) -> Result<StorageTransaction> {
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(StorageTransaction {
            id: String::new(),
            last_tx: URL_SAFE_NO_PAD.encode(n.to_le_bytes()),
            owner: key.owner_bytes()?,
            tags: Vec::new(),
            data,
            reward: "0".into(),
            signature: None,
        })
    }

    async fn sign(&self, transaction: &mut StorageTransaction, _key: &SigningKey) -> Result<()> {
        let mut hasher = Sha256::new();
        hasher.update(&transaction.last_tx);
        hasher.update(&transaction.data);
        let signature = hasher.finalize().to_vec();
        transaction.id = URL_SAFE_NO_PAD.encode(Sha256::digest(&signature));
        transaction.signature = Some(signature);
        Ok(())
    }

    async fn post(&self, transaction: &StorageTransaction) -> Result<PostResponse> {
        if !transaction.is_signed() {
            return Err(Error::Signing("transaction is not signed".into()));
        }
        self.posted.lock().push(transaction.clone());
        let status = self.statuses.lock().pop_front().unwrap_or(200);
        let status_text = match status {
            200 => "OK",
            204 => "No Content",
            400 => "Bad Request",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "",
        };
        Ok(PostResponse {
            status,
            status_text: status_text.into(),
        })
    }
}

// =============================================================================
// MINT SERVICE
// =============================================================================

pub struct MemoryMintService {
    fixed_mint: Option<Pubkey>,
    failure: Option<String>,
    created: Mutex<Vec<CreateNftInput>>,
    nfts: Mutex<HashMap<Pubkey, NftHandle>>,
}

impl Default for MemoryMintService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMintService {
    pub fn new() -> Self {
        Self {
            fixed_mint: None,
            failure: None,
            created: Mutex::new(Vec::new()),
            nfts: Mutex::new(HashMap::new()),
        }
    }

    /// Every mint gets this address.
    pub fn with_mint(mint: Pubkey) -> Self {
        Self {
            fixed_mint: Some(mint),
            ..Self::new()
        }
    }

    /// Every `create` fails with [`Error::Mint`].
    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::new()
        }
    }

    pub fn created(&self) -> Vec<CreateNftInput> {
        self.created.lock().clone()
    }

    pub fn insert_nft(&self, handle: NftHandle) {
        self.nfts.lock().insert(handle.mint_address, handle);
    }
}

#[async_trait]
impl MintService for MemoryMintService {
    async fn create(&self, authority: &WalletSigner, input: &CreateNftInput) -> Result<MintResult> {
        self.created.lock().push(input.clone());
        if let Some(reason) = &self.failure {
            return Err(Error::Mint(reason.clone()));
        }

        let owner = authority.pubkey();
        let mint = self.fixed_mint.unwrap_or_else(Pubkey::new_unique);
        self.insert_nft(NftHandle {
            mint_address: mint,
            name: input.name.clone(),
            uri: input.uri.clone(),
        });

        Ok(MintResult {
            mint_address: mint,
            token_address: get_associated_token_address(&owner, &mint),
            metadata_address: Pubkey::new_unique(),
            master_edition_address: Pubkey::new_unique(),
            signature: Signature::new_unique(),
        })
    }

    async fn find_by_mint(&self, mint: &Pubkey) -> Result<NftHandle> {
        self.nfts
            .lock()
            .get(mint)
            .cloned()
            .ok_or(Error::AccountNotFound)
    }
}

// =============================================================================
// PROGRAM CLIENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramCall {
    Initialize(PfpAccounts),
    Update(PfpAccounts),
    SendMessage {
        message: Pubkey,
        topic: String,
        content: String,
    },
    UpdateMessage {
        message: Pubkey,
        topic: String,
        content: String,
    },
    DeleteMessage { message: Pubkey },
}

/// Program client holding accounts in memory and enforcing the program's
/// ownership and length rules.
pub struct MemoryProgramClient {
    program_id: Pubkey,
    users: Mutex<HashMap<Pubkey, UserProfileRecord>>,
    messages: Mutex<HashMap<Pubkey, MessageAccount>>,
    lookup_failure: Mutex<Option<String>>,
    calls: Mutex<Vec<ProgramCall>>,
    clock: AtomicI64,
}

impl Default for MemoryProgramClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProgramClient {
    pub fn new() -> Self {
        Self {
            program_id: PROGRAM_ID,
            users: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
            lookup_failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            clock: AtomicI64::new(1_700_000_000),
        }
    }

    /// Seed a user record for `owner` at its derived address.
    pub fn insert_user(&self, owner: &Pubkey, pfp: Pubkey) {
        let (user, _) = derive_user_pda(owner, &self.program_id);
        let record = UserProfileRecord { pfp, owner: *owner };
        self.users.lock().insert(user, record);
    }

    pub fn user_for(&self, owner: &Pubkey) -> Option<UserProfileRecord> {
        let (user, _) = derive_user_pda(owner, &self.program_id);
        self.users.lock().get(&user).copied()
    }

    /// Make `fetch_user` fail with [`Error::Rpc`] until cleared.
    pub fn fail_lookups(&self, reason: Option<&str>) {
        *self.lookup_failure.lock() = reason.map(str::to_string);
    }

    pub fn calls(&self) -> Vec<ProgramCall> {
        self.calls.lock().clone()
    }

    fn check_lengths(topic: &str, content: &str) -> Result<()> {
        if topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(Error::TopicTooLong);
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(Error::ContentTooLong);
        }
        Ok(())
    }
}

#[async_trait]
impl ProgramClient for MemoryProgramClient {
    fn program_id(&self) -> Pubkey {
        self.program_id
    }

    async fn fetch_user(&self, user: &Pubkey) -> Result<Option<UserProfileRecord>> {
        if let Some(reason) = self.lookup_failure.lock().clone() {
            return Err(Error::Rpc(reason));
        }
        Ok(self.users.lock().get(user).copied())
    }

    async fn initialize(&self, owner: &WalletSigner, accounts: &PfpAccounts) -> Result<Signature> {
        self.calls.lock().push(ProgramCall::Initialize(*accounts));
        if owner.pubkey() != accounts.owner {
            return Err(Error::Forbidden);
        }
        let mut users = self.users.lock();
        if users.contains_key(&accounts.user) {
            let user = accounts.user;
            return Err(Error::Rpc(format!("account {user} already in use")));
        }
        let record = UserProfileRecord {
            pfp: accounts.mint,
            owner: accounts.owner,
        };
        users.insert(accounts.user, record);
        Ok(Signature::new_unique())
    }

    async fn update(&self, owner: &WalletSigner, accounts: &PfpAccounts) -> Result<Signature> {
        self.calls.lock().push(ProgramCall::Update(*accounts));
        let mut users = self.users.lock();
        let record = users.get_mut(&accounts.user).ok_or(Error::AccountNotFound)?;
        if record.owner != owner.pubkey() {
            return Err(Error::Forbidden);
        }
        record.pfp = accounts.mint;
        Ok(Signature::new_unique())
    }

    async fn send_message(
        &self,
        author: &WalletSigner,
        message_id: &str,
        topic: &str,
        content: &str,
    ) -> Result<Pubkey> {
        let author = author.pubkey();
        let (message, _) = derive_message_pda(&author, message_id, &self.program_id);
        self.calls.lock().push(ProgramCall::SendMessage {
            message,
            topic: topic.to_string(),
            content: content.to_string(),
        });
        Self::check_lengths(topic, content)?;

        let mut messages = self.messages.lock();
        if messages.contains_key(&message) {
            return Err(Error::Rpc(format!("account {message} already in use")));
        }
        messages.insert(
            message,
            MessageAccount {
                address: message,
                author,
                timestamp: self.clock.fetch_add(1, Ordering::SeqCst),
                topic: topic.to_string(),
                content: content.to_string(),
            },
        );
        Ok(message)
    }

    async fn update_message(
        &self,
        author: &WalletSigner,
        message: &Pubkey,
        topic: &str,
        content: &str,
    ) -> Result<Signature> {
        self.calls.lock().push(ProgramCall::UpdateMessage {
            message: *message,
            topic: topic.to_string(),
            content: content.to_string(),
        });
        Self::check_lengths(topic, content)?;

        let mut messages = self.messages.lock();
        let record = messages.get_mut(message).ok_or(Error::AccountNotFound)?;
        if record.author != author.pubkey() {
            return Err(Error::Forbidden);
        }
        record.topic = topic.to_string();
        record.content = content.to_string();
        Ok(Signature::new_unique())
    }

    async fn delete_message(&self, author: &WalletSigner, message: &Pubkey) -> Result<Signature> {
        let call = ProgramCall::DeleteMessage { message: *message };
        self.calls.lock().push(call);
        let mut messages = self.messages.lock();
        let record = messages.get(message).ok_or(Error::AccountNotFound)?;
        if record.author != author.pubkey() {
            return Err(Error::Forbidden);
        }
        messages.remove(message);
        Ok(Signature::new_unique())
    }

    async fn fetch_message(&self, message: &Pubkey) -> Result<Option<MessageAccount>> {
        Ok(self.messages.lock().get(message).cloned())
    }

    async fn fetch_messages(&self, author: Option<&Pubkey>) -> Result<Vec<MessageAccount>> {
        let mut found: Vec<_> = self
            .messages
            .lock()
            .values()
            .filter(|m| author.map_or(true, |a| m.author == *a))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(found)
    }
}

// =============================================================================
// METADATA SOURCE
// =============================================================================

/// Serves JSON documents from a map and counts requests per URI.
#[derive(Default)]
pub struct StaticMetadataSource {
    documents: Mutex<HashMap<String, Value>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StaticMetadataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: &str, document: Value) {
        self.documents.lock().insert(uri.to_string(), document);
    }

    pub fn calls(&self, uri: &str) -> usize {
        self.calls.lock().get(uri).copied().unwrap_or(0)
    }
}

#[async_trait]
impl MetadataSource for StaticMetadataSource {
    async fn fetch_json(&self, uri: &str) -> Result<Value> {
        *self.calls.lock().entry(uri.to_string()).or_default() += 1;
        // Give concurrent callers a chance to pile onto the in-flight fetch.
        tokio::task::yield_now().await;
        self.documents
            .lock()
            .get(uri)
            .cloned()
            .ok_or_else(|| Error::Http(format!("404 Not Found: {uri}")))
    }
}
