//! Single-flight cache for NFT display metadata.
//!
//! [`MetadataCache`] maps a metadata URI to a shared future. The entry is
//! inserted before the fetch is first polled, so concurrent callers for the
//! same URI join one remote request and observe the same value or the same
//! failure. Entries are never evicted by age or size.
//!
//! # Failure policy
//!
//! - [`FailurePolicy::Retain`] (default): a failed fetch stays cached and is
//!   replayed to later callers until [`MetadataCache::invalidate`] is called.
//! - [`FailurePolicy::Evict`]: a failed entry is removed once it resolves, so
//!   the next call starts a new fetch.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Off-chain metadata fields needed to display an NFT.
#[derive(Debug, Clone, PartialEq)]
pub struct NftDisplayMetadata {
    pub image: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub raw: Value,
}

impl NftDisplayMetadata {
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(ref object) = value else {
            return Err(Error::InvalidMetadata("not a JSON object".into()));
        };
        let image = object
            .get("image")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidMetadata("missing `image` field".into()))?
            .to_string();
        let text = |name: &str| object.get(name).and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            image,
            name: text("name"),
            description: text("description"),
            raw: value.clone(),
        })
    }
}

/// Where metadata documents come from.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_json(&self, uri: &str) -> Result<Value>;
}

/// Plain HTTP GET, following redirects.
pub struct HttpMetadataSource {
    http: reqwest::Client,
}

impl HttpMetadataSource {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn fetch_json(&self, uri: &str) -> Result<Value> {
        let response = self.http.get(uri).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| Error::InvalidMetadata(format!("{uri}: {e}")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    #[default]
    Retain,
    Evict,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<NftDisplayMetadata>>>>;

pub struct MetadataCache {
    source: Arc<dyn MetadataSource>,
    entries: Mutex<HashMap<String, SharedFetch>>,
    policy: FailurePolicy,
}

impl MetadataCache {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self::with_policy(source, FailurePolicy::default())
    }

    pub fn with_policy(source: Arc<dyn MetadataSource>, policy: FailurePolicy) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub async fn fetch(&self, uri: &str) -> Result<Arc<NftDisplayMetadata>> {
        let fetch = self.entry(uri);
        let result = fetch.clone().await;

        if result.is_err() && self.policy == FailurePolicy::Evict {
            let mut entries = self.entries.lock();
            // Only drop our own entry; a newer fetch may already have replaced it.
            if entries.get(uri).is_some_and(|e| e.ptr_eq(&fetch)) {
                debug!(uri, "evicting failed metadata fetch");
                entries.remove(uri);
            }
        }
        result
    }

    fn entry(&self, uri: &str) -> SharedFetch {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(uri) {
            trace!(uri, "metadata cache hit");
            return existing.clone();
        }

        let source = Arc::clone(&self.source);
        let owned = uri.to_string();
        let fetch = async move {
            let value = source.fetch_json(&owned).await?;
            NftDisplayMetadata::from_json(value).map(Arc::new)
        }
        .boxed()
        .shared();
        entries.insert(uri.to_string(), fetch.clone());
        fetch
    }

    /// Drop the entry for `uri`; returns whether one existed.
    pub fn invalidate(&self, uri: &str) -> bool {
        self.entries.lock().remove(uri).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testutil::StaticMetadataSource;

    const URI: &str = "https://arweave.net/meta";

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let source = Arc::new(StaticMetadataSource::new());
        let document = json!({ "image": "https://arweave.net/img", "name": "pfp" });
        source.insert(URI, document);
        let cache = MetadataCache::new(source.clone());

        let (a, b) = tokio::join!(cache.fetch(URI), cache.fetch(URI));

        assert_eq!(source.calls(URI), 1);
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.image, "https://arweave.net/img");
        assert_eq!(a.name.as_deref(), Some("pfp"));
    }

    #[tokio::test]
    async fn completed_fetch_is_reused() {
        let source = Arc::new(StaticMetadataSource::new());
        source.insert(URI, json!({ "image": "x" }));
        let cache = MetadataCache::new(source.clone());

        cache.fetch(URI).await.unwrap();
        cache.fetch(URI).await.unwrap();
        assert_eq!(source.calls(URI), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_failure() {
        let source = Arc::new(StaticMetadataSource::new());
        source.insert(URI, json!({ "name": "no image" }));
        let cache = MetadataCache::new(source.clone());

        let (a, b) = tokio::join!(cache.fetch(URI), cache.fetch(URI));
        assert_eq!(source.calls(URI), 1);
        assert!(matches!(a, Err(Error::InvalidMetadata(_))));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn retained_failure_is_replayed() {
        let source = Arc::new(StaticMetadataSource::new());
        source.insert(URI, json!({ "name": "no image" }));
        let cache = MetadataCache::new(source.clone());

        let first = cache.fetch(URI).await;
        assert!(matches!(first, Err(Error::InvalidMetadata(_))));

        // Fixing the remote document does not help until the entry is invalidated.
        source.insert(URI, json!({ "image": "fixed" }));
        assert_eq!(cache.fetch(URI).await, first);
        assert_eq!(source.calls(URI), 1);

        assert!(cache.invalidate(URI));
        assert_eq!(cache.fetch(URI).await.unwrap().image, "fixed");
        assert_eq!(source.calls(URI), 2);
    }

    #[tokio::test]
    async fn evicted_failure_is_refetched() {
        let source = Arc::new(StaticMetadataSource::new());
        source.insert(URI, json!([1, 2, 3]));
        let cache = MetadataCache::with_policy(source.clone(), FailurePolicy::Evict);

        assert!(matches!(
            cache.fetch(URI).await,
            Err(Error::InvalidMetadata(_))
        ));
        assert!(cache.is_empty());

        source.insert(URI, json!({ "image": "fixed" }));
        assert_eq!(cache.fetch(URI).await.unwrap().image, "fixed");
        assert_eq!(source.calls(URI), 2);
    }

    #[tokio::test]
    async fn distinct_uris_are_independent() {
        let source = Arc::new(StaticMetadataSource::new());
        source.insert("a", json!({ "image": "1" }));
        source.insert("b", json!({ "image": "2" }));
        let cache = MetadataCache::new(source.clone());

        let (a, b) = tokio::join!(cache.fetch("a"), cache.fetch("b"));
        assert_eq!(a.unwrap().image, "1");
        assert_eq!(b.unwrap().image, "2");
        assert_eq!((source.calls("a"), source.calls("b")), (1, 1));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn non_string_image_is_invalid() {
        assert!(matches!(
            NftDisplayMetadata::from_json(json!({ "image": 7 })),
            Err(Error::InvalidMetadata(_))
        ));
    }
}
