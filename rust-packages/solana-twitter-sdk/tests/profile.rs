//! Reading profile pictures and messages back through the public API.

use std::sync::Arc;

use serde_json::json;
use solana_sdk::{signature::Keypair, signer::Signer};
use solana_twitter_sdk::{
    testutil::{
        test_key_json, MemoryMintService, MemoryProgramClient, MemoryStorageNetwork,
        StaticMetadataSource,
    },
    Config, Error, FailurePolicy, ImageFile, KeyFile, MessageClient, MetadataCache,
    ProfilePictureReader, UploadPipeline, Workspace,
};

#[tokio::test]
async fn uploaded_picture_is_readable() {
    let workspace = Workspace::new(Config::default());
    workspace.connect(Arc::new(Keypair::new()));
    let storage = Arc::new(MemoryStorageNetwork::new());
    let minter = Arc::new(MemoryMintService::new());
    let program = Arc::new(MemoryProgramClient::new());

    let outcome = UploadPipeline::new(workspace.clone(), storage, minter.clone(), program.clone())
        .run(
            &ImageFile::new("a.gif", "image/gif", vec![1, 2, 3]),
            Some(&KeyFile::from_bytes("application/json", test_key_json())),
        )
        .await
        .unwrap();

    let metadata_uri = outcome.metadata.address.uri("https://arweave.net");
    let document = serde_json::to_value(&outcome.metadata.document).unwrap();
    let source = Arc::new(StaticMetadataSource::new());
    source.insert(&metadata_uri, document);
    let cache = Arc::new(MetadataCache::new(source));
    let reader = ProfilePictureReader::new(workspace, program, minter, cache);

    let image = reader.current_image().await.unwrap();
    assert_eq!(image, Some(outcome.metadata.document.image));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cache_single_flight_across_tasks() {
    let source = Arc::new(StaticMetadataSource::new());
    let document = json!({ "image": "https://arweave.net/i" });
    source.insert("https://arweave.net/m", document);
    let cache = Arc::new(MetadataCache::new(source.clone()));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.fetch("https://arweave.net/m").await })
        })
        .collect();

    let first = cache.fetch("https://arweave.net/m").await.unwrap();
    for task in tasks {
        assert!(Arc::ptr_eq(&task.await.unwrap().unwrap(), &first));
    }
    assert_eq!(source.calls("https://arweave.net/m"), 1);
}

#[tokio::test]
async fn missing_image_failure_recurs_until_invalidated() {
    let source = Arc::new(StaticMetadataSource::new());
    source.insert("u", json!({ "name": "broken" }));
    let cache = MetadataCache::with_policy(source.clone(), FailurePolicy::Retain);

    for _ in 0..2 {
        assert!(matches!(
            cache.fetch("u").await,
            Err(Error::InvalidMetadata(_))
        ));
    }
    assert_eq!(source.calls("u"), 1);

    assert!(cache.invalidate("u"));
    source.insert("u", json!({ "image": "fixed" }));
    assert_eq!(cache.fetch("u").await.unwrap().image, "fixed");
}

#[tokio::test]
async fn message_feed_is_newest_first() {
    let workspace = Workspace::new(Config::default());
    let wallet = Keypair::new();
    let author = wallet.pubkey();
    workspace.connect(Arc::new(wallet));
    let messages = MessageClient::new(workspace, Arc::new(MemoryProgramClient::new()));

    for (id, content) in [("1", "one"), ("2", "two"), ("3", "three")] {
        messages.send_with_id(id, "solana", content).await.unwrap();
    }

    let feed = messages.list(Some(&author)).await.unwrap();
    let contents: Vec<_> = feed.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["three", "two", "one"]);
}
