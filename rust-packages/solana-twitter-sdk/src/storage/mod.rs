//! Content-addressed storage network abstraction.
//!
//! Uploading is a three-step exchange with the network: create a transaction
//! carrying the payload, sign it with the uploader's key, post it. The
//! transaction id returned by signing is the [`ContentAddress`] of the
//! payload. Stored content is immutable and cannot be deleted.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::Result, key::SigningKey};

pub mod arweave;

pub use arweave::ArweaveClient;

/// Identifier the storage network assigns to an uploaded payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve against a gateway: `https://arweave.net` + `/` + id.
    pub fn uri(&self, gateway: &str) -> String {
        format!("{}/{}", gateway.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

/// A storage transaction before or after signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTransaction {
    /// Empty until signed
    pub id: String,
    pub last_tx: String,
    /// Uploader's RSA modulus
    pub owner: Vec<u8>,
    pub tags: Vec<Tag>,
    pub data: Vec<u8>,
    /// Fee in winston
    pub reward: String,
    pub signature: Option<Vec<u8>>,
}

impl StorageTransaction {
    pub fn add_tag(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.tags.push(Tag {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// HTTP-level outcome of posting a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostResponse {
    pub status: u16,
    pub status_text: String,
}

impl PostResponse {
    pub fn is_success(&self) -> bool {
        is_success(self.status)
    }
}

/// Success range is `[200, 300)`.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait]
pub trait StorageNetwork: Send + Sync {
    /// Gateway base URL that content addresses resolve against.
    fn gateway(&self) -> &str;

    async fn create_transaction(
        &self,
        data: Vec<u8>,
        key: &SigningKey,
    ) -> Result<StorageTransaction>;

    /// Sign in place, assigning the transaction id.
    async fn sign(&self, transaction: &mut StorageTransaction, key: &SigningKey) -> Result<()>;

    async fn post(&self, transaction: &StorageTransaction) -> Result<PostResponse>;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(200, true)]
    #[case(201, true)]
    #[case(204, true)]
    #[case(299, true)]
    #[case(199, false)]
    #[case(300, false)]
    #[case(404, false)]
    #[case(500, false)]
    fn success_range(#[case] status: u16, #[case] ok: bool) {
        assert_eq!(is_success(status), ok);
        let response = PostResponse {
            status,
            status_text: String::new(),
        };
        assert_eq!(response.is_success(), ok);
    }

    #[test]
    fn uri_joins_gateway_and_id() {
        let address = ContentAddress::new("bNbA3TEQVL60xlgCcqdz4ZPHFZ711cZ3hmkpGttDt_U");
        assert_eq!(
            address.uri("https://arweave.net"),
            "https://arweave.net/bNbA3TEQVL60xlgCcqdz4ZPHFZ711cZ3hmkpGttDt_U"
        );
        assert_eq!(
            address.uri("https://arweave.net/"),
            address.uri("https://arweave.net")
        );
    }

    #[test]
    fn tags_are_ordered_and_queryable() {
        let mut tx = StorageTransaction {
            id: String::new(),
            last_tx: String::new(),
            owner: vec![],
            tags: vec![],
            data: vec![],
            reward: "0".into(),
            signature: None,
        };
        tx.add_tag("Content-Type", "image/png");
        tx.add_tag("App-Name", "solana-twitter");
        assert_eq!(tx.tag("Content-Type"), Some("image/png"));
        assert_eq!(tx.tags[1].name, "App-Name");
        assert!(!tx.is_signed());
    }
}
