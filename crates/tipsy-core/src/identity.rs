//! Identity binding: login handshake, cached identity and profile edits.

use std::path::Path;
use std::sync::Arc;

use crate::cleanup::{best_effort, best_effort_async};
use crate::cloud::{avatar_object_key, upload_file, Authorization, CloudServices};
use crate::db::{BlobStore, IDENTITY_KEY};
use crate::models::{is_remote_ref, ProfileUpdate, RemoteUser, UserIdentity};
use crate::state::AppContext;
use crate::store::write_value;
use crate::util::{is_http_url, now_millis};
use crate::{Error, Result};

/// The identity blob, readable without any cloud configuration.
#[derive(Clone)]
pub struct IdentityCache {
    blobs: Arc<dyn BlobStore>,
}

impl IdentityCache {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Cached identity; `None` when absent or unreadable.
    pub fn load(&self) -> Option<UserIdentity> {
        let raw = match self.blobs.get(IDENTITY_KEY) {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::warn!("Failed to read cached identity: {error}");
                return None;
            }
        };
        serde_json::from_str::<UserIdentity>(&raw)
            .map_err(|error| tracing::warn!("Ignoring cached identity: {error}"))
            .ok()
            .filter(|identity| !identity.openid.trim().is_empty())
    }

    pub fn store(&self, identity: &UserIdentity) -> Result<()> {
        write_value(self.blobs.as_ref(), IDENTITY_KEY, identity)
    }

    pub fn clear(&self) -> Result<()> {
        self.blobs
            .remove(IDENTITY_KEY)
            .map_err(|error| Error::Persistence(format!("clear {IDENTITY_KEY}: {error}")))
    }

    /// Context initialized from the cache.
    pub fn context(&self) -> AppContext {
        AppContext::with_identity(self.load())
    }
}

/// Logs users in against the backend and keeps cache and context in step.
pub struct IdentityService {
    cache: IdentityCache,
    context: AppContext,
    cloud: CloudServices,
}

impl IdentityService {
    pub fn new(cache: IdentityCache, context: AppContext, cloud: CloudServices) -> Self {
        Self {
            cache,
            context,
            cloud,
        }
    }

    /// Run the login handshake.
    ///
    /// Only a declined authorization or a failed identity exchange fail the
    /// call; avatar mirroring and registry bookkeeping are best-effort.
    pub async fn login(&self) -> Result<UserIdentity> {
        let authorization = self
            .cloud
            .authorizer
            .authorize()
            .await?
            .ok_or(Error::AuthorizationDeclined)?;

        let openid = self
            .cloud
            .exchange
            .exchange_for_identity(&authorization)
            .await
            .map_err(|error| match error {
                Error::IdentityExchange(_) => error,
                other => Error::IdentityExchange(other.to_string()),
            })?;
        tracing::info!("Exchanged authorization for openid {openid}");

        let avatar_url = self.mirror_avatar(&openid, &authorization).await;
        self.register(&openid, &authorization.nickname, &avatar_url).await;

        let identity = UserIdentity::new(openid, authorization.nickname, avatar_url);
        best_effort("Caching identity", self.cache.store(&identity));
        self.context.set_identity(Some(identity.clone()));
        Ok(identity)
    }

    /// Copy the provider avatar into object storage, falling back to the
    /// external URL.
    async fn mirror_avatar(&self, openid: &str, authorization: &Authorization) -> String {
        let external = authorization.avatar_url.trim();
        if !is_http_url(external) {
            return external.to_string();
        }

        let upload = async {
            let bytes = self.cloud.authorizer.download_avatar(external).await?;
            self.cloud
                .objects
                .upload(
                    &avatar_object_key(openid, now_millis()),
                    bytes,
                    "image/jpeg",
                )
                .await
        };
        best_effort_async("Mirroring avatar", upload)
            .await
            .unwrap_or_else(|| external.to_string())
    }

    async fn register(&self, openid: &str, nickname: &str, avatar_url: &str) {
        let user = RemoteUser {
            openid: openid.to_string(),
            nickname: nickname.to_string(),
            avatar_url: avatar_url.to_string(),
            created_at: Some(now_millis()),
            last_backup_at: None,
        };
        match self.cloud.users.create(&user).await {
            Ok(()) => tracing::info!("Registered user {openid}"),
            Err(Error::Conflict(_)) => {
                let update = ProfileUpdate {
                    nickname: Some(user.nickname),
                    avatar_url: Some(user.avatar_url),
                };
                best_effort_async(
                    "Refreshing registry profile",
                    self.cloud.users.update_profile(openid, &update),
                )
                .await;
            }
            Err(error) => tracing::warn!("Registering user {openid} failed: {error}"),
        }
    }

    /// Cached identity; never fails.
    pub fn current_identity(&self) -> Option<UserIdentity> {
        self.cache.load()
    }

    fn require_identity(&self) -> Result<UserIdentity> {
        self.context
            .identity()
            .or_else(|| self.cache.load())
            .ok_or(Error::NotAuthenticated)
    }

    /// Rename the user: registry first, then cache, then context.
    pub async fn update_nickname(&self, nickname: &str) -> Result<UserIdentity> {
        let mut identity = self.require_identity()?;
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(Error::Validation("nickname cannot be empty".to_string()));
        }

        let update = ProfileUpdate {
            nickname: Some(nickname.to_string()),
            avatar_url: None,
        };
        self.cloud
            .users
            .update_profile(&identity.openid, &update)
            .await?;

        identity.nickname = nickname.to_string();
        self.cache.store(&identity)?;
        self.context.set_identity(Some(identity.clone()));
        tracing::info!("Updated nickname for {}", identity.openid);
        Ok(identity)
    }

    /// Upload a new avatar and return its remote reference.
    pub async fn update_avatar(&self, local_path: &Path) -> Result<String> {
        let mut identity = self.require_identity()?;

        let key = avatar_object_key(&identity.openid, now_millis());
        let reference = upload_file(self.cloud.objects.as_ref(), &key, local_path)
            .await
            .map_err(|error| match error {
                Error::Upload(_) => error,
                other => Error::Upload(other.to_string()),
            })?;

        if is_remote_ref(&identity.avatar_url) {
            best_effort_async(
                "Deleting previous avatar",
                self.cloud.objects.delete(&[identity.avatar_url.clone()]),
            )
            .await;
        }

        let update = ProfileUpdate {
            nickname: None,
            avatar_url: Some(reference.clone()),
        };
        self.cloud
            .users
            .update_profile(&identity.openid, &update)
            .await
            .map_err(|error| Error::Persistence(format!("registry avatar update: {error}")))?;

        identity.avatar_url.clone_from(&reference);
        self.cache.store(&identity)?;
        self.context.set_identity(Some(identity));
        Ok(reference)
    }

    /// Forget the identity. Safe to call when already logged out.
    pub fn logout(&self) -> Result<()> {
        self.context.set_identity(None);
        self.cache.clear()?;
        tracing::info!("Logged out");
        Ok(())
    }
}
