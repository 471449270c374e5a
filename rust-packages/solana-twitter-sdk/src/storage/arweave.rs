//! Arweave gateway client.
//!
//! Builds format-1 transactions. The signature covers the concatenation of
//! owner, target, data, quantity, reward, anchor and the raw tag bytes, and
//! is RSA-PSS over SHA-256. The transaction id is base64url(SHA-256(sig)).

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rsa::{
    pss::BlindedSigningKey,
    signature::{RandomizedSigner, SignatureEncoding},
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use super::{PostResponse, StorageNetwork, StorageTransaction};
use crate::{
    error::{Error, Result},
    key::SigningKey,
};

const TX_FORMAT: u8 = 1;

pub struct ArweaveClient {
    http: reqwest::Client,
    gateway: String,
}

impl ArweaveClient {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), gateway)
    }

    pub fn with_client(http: reqwest::Client, gateway: impl Into<String>) -> Self {
        let gateway = gateway.into().trim_end_matches('/').to_string();
        Self { http, gateway }
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        let url = format!("{}/{}", self.gateway, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("GET {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Storage(format!("GET {url}: {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| Error::Storage(format!("GET {url}: {e}")))
    }
}

#[async_trait]
impl StorageNetwork for ArweaveClient {
    fn gateway(&self) -> &str {
        &self.gateway
    }

    #[instrument(skip_all, fields(bytes = data.len()))]
    async fn create_transaction(
        &self,
        data: Vec<u8>,
        key: &SigningKey,
    ) -> Result<StorageTransaction> {
        let last_tx = self.get_text("tx_anchor").await?;
        let reward = self.get_text(&format!("price/{}", data.len())).await?;
        debug!(%reward, "fetched anchor and price");

        Ok(StorageTransaction {
            id: String::new(),
            last_tx: last_tx.trim().to_string(),
            owner: key.owner_bytes()?,
            tags: Vec::new(),
            data,
            reward: reward.trim().to_string(),
            signature: None,
        })
    }

    async fn sign(&self, transaction: &mut StorageTransaction, key: &SigningKey) -> Result<()> {
        sign_transaction(transaction, key)
    }

    #[instrument(skip_all, fields(id = %transaction.id))]
    async fn post(&self, transaction: &StorageTransaction) -> Result<PostResponse> {
        let body = TransactionJson::from_signed(transaction)?;
        let url = format!("{}/tx", self.gateway);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("POST {url}: {e}")))?;

        let status = response.status();
        Ok(PostResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        })
    }
}

/// Bytes covered by a format-1 signature.
pub fn signature_data(transaction: &StorageTransaction) -> Result<Vec<u8>> {
    let last_tx = URL_SAFE_NO_PAD
        .decode(&transaction.last_tx)
        .map_err(|e| Error::Storage(format!("invalid anchor: {e}")))?;

    let mut out = Vec::with_capacity(transaction.owner.len() + transaction.data.len() + 128);
    out.extend_from_slice(&transaction.owner);
    // target: none
    out.extend_from_slice(&transaction.data);
    out.extend_from_slice(b"0"); // quantity
    out.extend_from_slice(transaction.reward.as_bytes());
    out.extend_from_slice(&last_tx);
    for tag in &transaction.tags {
        out.extend_from_slice(tag.name.as_bytes());
        out.extend_from_slice(tag.value.as_bytes());
    }
    Ok(out)
}

pub fn sign_transaction(transaction: &mut StorageTransaction, key: &SigningKey) -> Result<()> {
    if transaction.owner != key.owner_bytes()? {
        return Err(Error::Signing("owner does not match signing key".into()));
    }
    let message = signature_data(transaction)?;
    let signing_key = BlindedSigningKey::<Sha256>::new(key.to_rsa()?);
    let signature = signing_key
        .try_sign_with_rng(&mut rand::thread_rng(), &message)
        .map_err(|e| Error::Signing(e.to_string()))?
        .to_bytes()
        .into_vec();

    transaction.id = URL_SAFE_NO_PAD.encode(Sha256::digest(&signature));
    transaction.signature = Some(signature);
    Ok(())
}

#[derive(Debug, Serialize)]
struct TagJson {
    name: String,
    value: String,
}

/// Wire form accepted by `POST /tx`.
#[derive(Debug, Serialize)]
struct TransactionJson {
    format: u8,
    id: String,
    last_tx: String,
    owner: String,
    tags: Vec<TagJson>,
    target: String,
    quantity: String,
    data: String,
    data_size: String,
    data_root: String,
    reward: String,
    signature: String,
}

impl TransactionJson {
    fn from_signed(transaction: &StorageTransaction) -> Result<Self> {
        let signature = transaction
            .signature
            .as_ref()
            .ok_or_else(|| Error::Signing("transaction is not signed".into()))?;

        Ok(Self {
            format: TX_FORMAT,
            id: transaction.id.clone(),
            last_tx: transaction.last_tx.clone(),
            owner: URL_SAFE_NO_PAD.encode(&transaction.owner),
            tags: transaction
                .tags
                .iter()
                .map(|t| TagJson {
                    name: URL_SAFE_NO_PAD.encode(&t.name),
                    value: URL_SAFE_NO_PAD.encode(&t.value),
                })
                .collect(),
            target: String::new(),
            quantity: "0".to_string(),
            data: URL_SAFE_NO_PAD.encode(&transaction.data),
            data_size: transaction.data.len().to_string(),
            data_root: String::new(),
            reward: transaction.reward.clone(),
            signature: URL_SAFE_NO_PAD.encode(signature),
        })
    }
}
