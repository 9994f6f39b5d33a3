//! Cloudflare R2 object storage for images and avatars.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use aws_types::region::Region;

use crate::cloud::{parse_remote_reference, remote_reference, ObjectStorage};
use crate::{Error, Result};

/// Upper bound of keys in one `DeleteObjects` request.
const DELETE_BATCH: usize = 1000;

const R2_VARIABLES: [&str; 4] = [
    "R2_ACCOUNT_ID",
    "R2_BUCKET",
    "R2_ACCESS_KEY_ID",
    "R2_SECRET_ACCESS_KEY",
];

/// Cloudflare R2 configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct R2Config {
    pub account_id: String,
    /// Also the bucket part of `cloud://` references
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for R2Config {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("R2Config")
            .field("account_id", &self.account_id)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

impl R2Config {
    /// S3-compatible endpoint of the account.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

/// Read the `R2_*` variables through `lookup`.
///
/// `Ok(None)` when none is set; `InvalidConfig` naming the gaps when only
/// some are.
pub fn parse_config(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<R2Config>> {
    let values = R2_VARIABLES.map(|name| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    });

    if values.iter().all(Option::is_none) {
        return Ok(None);
    }

    match values {
        [Some(account_id), Some(bucket), Some(access_key_id), Some(secret_access_key)] => {
            Ok(Some(R2Config {
                account_id,
                bucket,
                access_key_id,
                secret_access_key,
            }))
        }
        values => {
            let missing: Vec<&str> = R2_VARIABLES
                .iter()
                .zip(values.iter())
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| *name)
                .collect();
            Err(Error::InvalidConfig(format!(
                "R2 configuration is incomplete. Missing: {}",
                missing.join(", ")
            )))
        }
    }
}

/// R2-backed [`ObjectStorage`].
#[derive(Clone, Debug)]
pub struct R2Storage {
    config: R2Config,
    client: Client,
}

impl R2Storage {
    #[must_use]
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "tipsy-r2",
        );
        let sdk_config = aws_sdk_s3::config::Builder::new()
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint_url())
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &R2Config {
        &self.config
    }

    /// Object keys in this bucket behind `references`.
    ///
    /// External URLs and references into other buckets are skipped.
    fn owned_keys<'a>(&self, references: &'a [String]) -> Vec<&'a str> {
        references
            .iter()
            .filter_map(|reference| match parse_remote_reference(reference) {
                Some((bucket, key)) if bucket == self.config.bucket => Some(key),
                Some((bucket, _)) => {
                    tracing::warn!("Skipping {reference}: bucket {bucket} is not configured");
                    None
                }
                None => {
                    tracing::debug!("Skipping non-remote reference {reference}");
                    None
                }
            })
            .collect()
    }

    /// Send one `DeleteObjects` request, returning the keys it could not
    /// remove.
    async fn delete_batch(&self, keys: &[&str]) -> Result<Vec<String>> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(*key).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|error| Error::Remote(format!("R2 delete request: {error}")))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|error| Error::Remote(format!("R2 delete request: {error}")))?;

        let response = self
            .client
            .delete_objects()
            .bucket(&self.config.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|error| {
                Error::Remote(format!(
                    "R2 delete_objects failed for {}: {error}",
                    self.config.bucket
                ))
            })?;

        Ok(response
            .errors()
            .iter()
            .map(|failure| {
                format!(
                    "{} ({})",
                    failure.key().unwrap_or("?"),
                    failure.message().unwrap_or("unknown error")
                )
            })
            .collect())
    }
}

#[async_trait]
impl ObjectStorage for R2Storage {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let key = key.trim().trim_matches('/');
        if key.is_empty() {
            return Err(Error::Upload("object key cannot be empty".to_string()));
        }

        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|error| {
                Error::Upload(format!(
                    "R2 put_object failed for {}/{key}: {error}",
                    self.config.bucket
                ))
            })?;

        tracing::debug!("Uploaded {key} ({size} bytes) to R2");
        Ok(remote_reference(&self.config.bucket, key))
    }

    /// Remove all owned objects, at most [`DELETE_BATCH`] keys per
    /// `DeleteObjects` request.
    async fn delete(&self, references: &[String]) -> Result<()> {
        let keys = self.owned_keys(references);
        let mut failed = Vec::new();
        for batch in keys.chunks(DELETE_BATCH) {
            failed.extend(self.delete_batch(batch).await?);
        }

        if failed.is_empty() {
            tracing::debug!("Deleted {} objects from R2", keys.len());
            Ok(())
        } else {
            Err(Error::Remote(format!(
                "R2 could not delete {}",
                failed.join(", ")
            )))
        }
    }
}
