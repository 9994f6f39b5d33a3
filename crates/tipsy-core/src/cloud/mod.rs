//! Narrow interfaces to the backup backend.
//!
//! The sync and identity services only talk to these traits. Concrete
//! adapters live in submodules: Supabase PostgREST for documents, R2 for
//! objects (see [`crate::storage::R2Storage`]), an HTTP login function for the
//! identity exchange, and an in-process backend for tests and dry runs.

mod exchange;
mod memory;
mod supabase;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::CloudConfig;
use crate::models::{ProfileUpdate, RemoteEntry, RemoteUser, REMOTE_SCHEME};
use crate::storage::R2Storage;
use crate::{Error, Result};

pub use exchange::HttpIdentityExchange;
pub use memory::{MemoryCloud, MemoryFailures};
pub use supabase::SupabaseStore;

/// Profile the user agreed to share, plus the credential proving it.
#[derive(Clone, PartialEq, Eq)]
pub struct Authorization {
    pub nickname: String,
    /// External avatar URL as provided by the identity provider
    pub avatar_url: String,
    /// One-time code forwarded to the identity exchange
    pub code: Option<String>,
}

impl std::fmt::Debug for Authorization {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Authorization")
            .field("nickname", &self.nickname)
            .field("avatar_url", &self.avatar_url)
            .field("code", &self.code.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Asks the user to share their profile.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// `Ok(None)` means the user declined.
    async fn authorize(&self) -> Result<Option<Authorization>>;

    /// Fetch the bytes of an external avatar.
    async fn download_avatar(&self, url: &str) -> Result<Vec<u8>> {
        let response = reqwest::get(url).await?;
        if !response.status().is_success() {
            return Err(Error::Remote(format!(
                "avatar download returned HTTP {}",
                response.status().as_u16()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Authorizer answering with a profile gathered up front.
#[derive(Clone, Debug)]
pub struct StaticAuthorizer {
    authorization: Option<Authorization>,
}

impl StaticAuthorizer {
    pub const fn granted(authorization: Authorization) -> Self {
        Self {
            authorization: Some(authorization),
        }
    }

    pub const fn declined() -> Self {
        Self {
            authorization: None,
        }
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn authorize(&self) -> Result<Option<Authorization>> {
        Ok(self.authorization.clone())
    }
}

/// Trusted server-side function turning an authorization into an openid.
#[async_trait]
pub trait IdentityExchange: Send + Sync {
    async fn exchange_for_identity(&self, authorization: &Authorization) -> Result<String>;
}

/// Remote collection of backed-up entries, partitioned by owner.
#[async_trait]
pub trait EntryCollection: Send + Sync {
    /// Every document owned by `owner`.
    async fn query(&self, owner: &str) -> Result<Vec<RemoteEntry>>;

    /// The document for `(owner, note_id)`, if any.
    async fn find(&self, owner: &str, note_id: &str) -> Result<Option<RemoteEntry>>;

    /// Insert a new document, returning its backend id.
    async fn insert(&self, entry: &RemoteEntry) -> Result<String>;

    /// Overwrite the fields of an existing document.
    async fn update(&self, doc_id: &str, entry: &RemoteEntry) -> Result<()>;

    async fn delete(&self, doc_id: &str) -> Result<()>;
}

/// Remote registry of users, keyed by openid.
#[async_trait]
pub trait UserRegistry: Send + Sync {
    async fn get(&self, openid: &str) -> Result<Option<RemoteUser>>;

    /// Create a record; [`Error::Conflict`] when one already exists.
    async fn create(&self, user: &RemoteUser) -> Result<()>;

    async fn update_profile(&self, openid: &str, update: &ProfileUpdate) -> Result<()>;

    /// Overwrite `lastBackupAt`; `None` clears it.
    async fn set_last_backup(&self, openid: &str, at: Option<i64>) -> Result<()>;
}

/// Object storage returning durable `cloud://` references.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key` and return its remote reference.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    /// Delete the objects behind `references`.
    async fn delete(&self, references: &[String]) -> Result<()>;
}

/// Read `path` and upload it as a JPEG under `key`.
pub async fn upload_file(
    storage: &dyn ObjectStorage,
    key: &str,
    path: &std::path::Path,
) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|error| Error::Upload(format!("read {}: {error}", path.display())))?;
    storage.upload(key, bytes, "image/jpeg").await
}

/// The set of backend services a session talks to.
#[derive(Clone)]
pub struct CloudServices {
    pub authorizer: Arc<dyn Authorizer>,
    pub exchange: Arc<dyn IdentityExchange>,
    pub entries: Arc<dyn EntryCollection>,
    pub users: Arc<dyn UserRegistry>,
    pub objects: Arc<dyn ObjectStorage>,
}

impl CloudServices {
    /// Wire the Supabase, R2 and login-function adapters for `config`.
    pub fn connect(config: &CloudConfig, authorizer: Arc<dyn Authorizer>) -> Result<Self> {
        let documents = Arc::new(SupabaseStore::new(
            &config.supabase_url,
            config.supabase_anon_key.clone(),
        )?);
        Ok(Self {
            authorizer,
            exchange: Arc::new(HttpIdentityExchange::new(config.login_endpoint.clone())?),
            entries: documents.clone(),
            users: documents,
            objects: Arc::new(R2Storage::new(config.r2.clone())),
        })
    }
}

/// Build `cloud://{bucket}/{key}`.
pub fn remote_reference(bucket: &str, key: &str) -> String {
    format!("{REMOTE_SCHEME}{bucket}/{}", key.trim_start_matches('/'))
}

/// Split a `cloud://` reference into bucket and object key.
pub fn parse_remote_reference(reference: &str) -> Option<(&str, &str)> {
    let rest = reference.strip_prefix(REMOTE_SCHEME)?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        None
    } else {
        Some((bucket, key))
    }
}

/// Object key of an entry image.
pub fn image_object_key(openid: &str, entry_id: &str, timestamp_ms: i64) -> String {
    format!("images/{openid}/{entry_id}_{timestamp_ms}.jpg")
}

/// Object key of a user avatar.
pub fn avatar_object_key(openid: &str, timestamp_ms: i64) -> String {
    format!("avatar/{openid}_{timestamp_ms}.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_reference_roundtrip() {
        let reference = remote_reference("tipsy", "/images/o-1/n-1_5.jpg");
        assert_eq!(reference, "cloud://tipsy/images/o-1/n-1_5.jpg");
        assert_eq!(
            parse_remote_reference(&reference),
            Some(("tipsy", "images/o-1/n-1_5.jpg"))
        );
    }

    #[test]
    fn parse_remote_reference_rejects_other_shapes() {
        assert_eq!(parse_remote_reference("https://x/y"), None);
        assert_eq!(parse_remote_reference("cloud://bucket-only"), None);
        assert_eq!(parse_remote_reference("cloud:///key"), None);
    }

    #[test]
    fn object_keys_follow_layout() {
        assert_eq!(image_object_key("o-1", "n-1", 42), "images/o-1/n-1_42.jpg");
        assert_eq!(avatar_object_key("o-1", 42), "avatar/o-1_42.jpg");
    }

    #[test]
    fn authorization_debug_redacts_code() {
        let authorization = Authorization {
            nickname: "Ada".to_string(),
            avatar_url: String::new(),
            code: Some("secret".to_string()),
        };
        let debug = format!("{authorization:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn static_authorizer_reports_decline() {
        assert!(StaticAuthorizer::declined().authorize().await.unwrap().is_none());
    }
}
