//! Backup, restore and remote wipe of the diary.
//!
//! Local state stays authoritative: backup pushes a snapshot up, restore
//! hands a snapshot back for the caller to install. Records are matched by
//! `(openid, noteId)` and the last write wins.

mod batch;

use std::path::Path;

use serde::Serialize;

use crate::cleanup::best_effort_async;
use crate::cloud::{image_object_key, upload_file, CloudServices};
use crate::models::{is_remote_ref, AssetRef, DiaryEntry, RemoteEntry};
use crate::state::{AppContext, SyncState};
use crate::util::now_millis;
use crate::{Error, Result};

pub use batch::{collect_results, fail_fast, BatchOutcome};

/// Entries backed up concurrently unless configured otherwise.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Result of a backup run; `count` excludes entries that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub success: bool,
    pub count: usize,
    pub total: usize,
}

/// Result of wiping the remote copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub success: bool,
    pub deleted_count: usize,
}

pub struct SyncService {
    context: AppContext,
    cloud: CloudServices,
    parallelism: usize,
}

impl SyncService {
    pub fn new(context: AppContext, cloud: CloudServices) -> Self {
        Self {
            context,
            cloud,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    fn require_openid(&self) -> Result<String> {
        self.context.openid().ok_or(Error::NotAuthenticated)
    }

    /// Upsert every entry into the remote collection.
    ///
    /// Each entry succeeds or fails on its own; failures are logged and left
    /// out of `count`.
    pub async fn backup(&self, entries: &[DiaryEntry]) -> Result<BackupReport> {
        let openid = self.require_openid()?;
        if entries.is_empty() {
            return Ok(BackupReport {
                success: true,
                count: 0,
                total: 0,
            });
        }

        self.context.set_sync_state(SyncState::Syncing);
        tracing::info!("Backing up {} entries for {openid}", entries.len());

        let tasks = entries
            .iter()
            .map(|entry| self.backup_entry(&openid, entry));
        let outcome = collect_results(tasks, self.parallelism).await;

        best_effort_async(
            "Recording backup time",
            self.cloud.users.set_last_backup(&openid, Some(now_millis())),
        )
        .await;

        let report = BackupReport {
            success: true,
            count: outcome.succeeded.len(),
            total: outcome.total(),
        };
        self.context.set_sync_state(if report.count == report.total {
            SyncState::Synced
        } else {
            SyncState::Error
        });
        tracing::info!("Backed up {}/{} entries", report.count, report.total);
        Ok(report)
    }

    async fn backup_entry(&self, openid: &str, entry: &DiaryEntry) -> Result<()> {
        let image = self.resolve_image(openid, entry).await;
        let mut remote = RemoteEntry::from_local(entry, openid, image);
        let now = now_millis();

        let result = async {
            match self.cloud.entries.find(openid, entry.id.as_str()).await? {
                Some(RemoteEntry {
                    doc_id: Some(doc_id),
                    ..
                }) => {
                    remote.updated_at = Some(now);
                    self.cloud.entries.update(&doc_id, &remote).await
                }
                _ => {
                    remote.created_at = Some(now);
                    remote.updated_at = Some(now);
                    self.cloud.entries.insert(&remote).await.map(|_| ())
                }
            }
        }
        .await;

        match &result {
            Ok(()) => tracing::debug!("Backed up entry {}", entry.id),
            Err(error) => tracing::warn!("Backing up entry {} failed: {error}", entry.id),
        }
        result
    }

    /// Durable image reference for `entry`.
    ///
    /// Local files are uploaded; when that fails the local path is kept so
    /// the record itself still goes up.
    async fn resolve_image(&self, openid: &str, entry: &DiaryEntry) -> Option<String> {
        match entry.asset()? {
            AssetRef::Local(path) => {
                let key = image_object_key(openid, entry.id.as_str(), now_millis());
                match upload_file(self.cloud.objects.as_ref(), &key, Path::new(path)).await {
                    Ok(reference) => Some(reference),
                    Err(error) => {
                        tracing::warn!("Keeping local image for entry {}: {error}", entry.id);
                        Some(path.to_string())
                    }
                }
            }
            asset => Some(asset.as_str().to_string()),
        }
    }

    /// Fetch every remote record of the current user as local entries,
    /// newest first. The caller installs them.
    pub async fn restore(&self) -> Result<Vec<DiaryEntry>> {
        let openid = self.require_openid()?;
        self.context.set_sync_state(SyncState::Syncing);

        let records = match self.cloud.entries.query(&openid).await {
            Ok(records) => records,
            Err(error) => {
                self.context.set_sync_state(SyncState::Error);
                return Err(error);
            }
        };

        let now = now_millis();
        let mut entries: Vec<DiaryEntry> = records
            .into_iter()
            .map(|record| {
                let create_time = record.recorded_create_time().unwrap_or_else(|| {
                    tracing::warn!(
                        "Remote entry {} has no creation time; using now",
                        record.note_id
                    );
                    now
                });
                record.into_local(create_time)
            })
            .collect();
        entries.sort_by(|a, b| b.create_time.cmp(&a.create_time));

        self.context.set_sync_state(SyncState::Synced);
        tracing::info!("Restored {} entries for {openid}", entries.len());
        Ok(entries)
    }

    /// Delete every remote record and image of the current user.
    ///
    /// Image removal is best-effort. Record deletions all run; if any of them
    /// failed the call fails.
    pub async fn delete_all_remote(&self) -> Result<DeleteReport> {
        let openid = self.require_openid()?;
        let records = self.cloud.entries.query(&openid).await?;

        let images: Vec<String> = records
            .iter()
            .filter_map(|record| record.image_path.clone())
            .filter(|path| is_remote_ref(path))
            .collect();
        if !images.is_empty() {
            best_effort_async("Deleting remote images", self.cloud.objects.delete(&images)).await;
        }

        let doc_ids: Vec<String> = records
            .iter()
            .filter_map(|record| record.doc_id.clone())
            .collect();
        let deleted = fail_fast(
            doc_ids
                .iter()
                .map(|doc_id| self.cloud.entries.delete(doc_id)),
        )
        .await
        .map_err(|error| Error::Persistence(format!("remote delete: {error}")))?;

        best_effort_async(
            "Clearing backup time",
            self.cloud.users.set_last_backup(&openid, None),
        )
        .await;

        tracing::info!("Deleted {} remote entries for {openid}", deleted.len());
        Ok(DeleteReport {
            success: true,
            deleted_count: deleted.len(),
        })
    }

    /// When the last backup finished; `None` when unknown.
    pub async fn last_backup_time(&self) -> Option<i64> {
        let openid = self.context.openid()?;
        match self.cloud.users.get(&openid).await {
            Ok(user) => user.and_then(|user| user.last_backup_at),
            Err(error) => {
                tracing::debug!("Reading last backup time failed: {error}");
                None
            }
        }
    }
}
