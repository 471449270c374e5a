//! Binary content uploads.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    constants::CONTENT_TYPE_TAG,
    error::{Error, Result},
    key::SigningKey,
    storage::{ContentAddress, StorageNetwork},
};

/// Create, tag, sign and post one payload.
///
/// Not idempotent: every call produces a new transaction and address.
pub(crate) async fn submit(
    network: &dyn StorageNetwork,
    data: Vec<u8>,
    content_type: &str,
    key: &SigningKey,
) -> Result<ContentAddress> {
    let mut transaction = network.create_transaction(data, key).await?;
    transaction.add_tag(CONTENT_TYPE_TAG, content_type);
    network.sign(&mut transaction, key).await?;

    let response = network.post(&transaction).await?;
    if !response.is_success() {
        warn!(
            id = %transaction.id,
            status = response.status,
            "storage network rejected transaction"
        );
        return Err(Error::UploadFailed {
            status: response.status,
            status_text: response.status_text,
        });
    }

    Ok(ContentAddress::new(transaction.id))
}

#[derive(Clone)]
pub struct ContentUploader {
    network: Arc<dyn StorageNetwork>,
}

impl ContentUploader {
    pub fn new(network: Arc<dyn StorageNetwork>) -> Self {
        Self { network }
    }

    pub fn gateway(&self) -> &str {
        self.network.gateway()
    }

    #[instrument(skip(self, bytes, key), fields(bytes = bytes.len()))]
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        key: &SigningKey,
    ) -> Result<ContentAddress> {
        let address = submit(self.network.as_ref(), bytes, mime_type, key).await?;
        info!(%address, "content uploaded");
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::testutil::{test_signing_key, MemoryStorageNetwork};

    #[rstest]
    #[case(200)]
    #[case(204)]
    #[case(299)]
    #[tokio::test]
    async fn success_statuses_return_address(#[case] status: u16) {
        let network = Arc::new(MemoryStorageNetwork::with_statuses([status]));
        let uploader = ContentUploader::new(network.clone());

        let address = uploader
            .upload(vec![0u8; 10], "image/png", &test_signing_key())
            .await
            .unwrap();

        let posted = network.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].id, address.as_str());
        assert_eq!(posted[0].tag("Content-Type"), Some("image/png"));
        assert_eq!(posted[0].data, vec![0u8; 10]);
    }

    #[rstest]
    #[case(300)]
    #[case(404)]
    #[case(500)]
    #[tokio::test]
    async fn failure_statuses_return_upload_failed(#[case] status: u16) {
        let network = Arc::new(MemoryStorageNetwork::with_statuses([status]));
        let uploader = ContentUploader::new(network);

        let err = uploader
            .upload(vec![1, 2, 3], "image/png", &test_signing_key())
            .await
            .unwrap_err();
        let Error::UploadFailed { status: code, .. } = &err else {
            panic!("expected UploadFailed, got {err:?}");
        };
        assert_eq!(*code, status);
    }

    #[tokio::test]
    async fn each_upload_is_a_new_transaction() {
        let network = Arc::new(MemoryStorageNetwork::new());
        let uploader = ContentUploader::new(network);
        let key = test_signing_key();

        let first = uploader
            .upload(b"same".to_vec(), "text/plain", &key)
            .await
            .unwrap();
        let second = uploader
            .upload(b"same".to_vec(), "text/plain", &key)
            .await
            .unwrap();
        assert_ne!(first, second);
    }
}
