//! Local record store: the authoritative copy of the diary.
//!
//! Entries and custom tags are each persisted as one JSON blob. Every write
//! is a read-modify-write through [`BlobStore::update`], which the `SQLite`
//! store runs as one transaction so separate `tipsy` processes cannot lose
//! each other's changes. A store-level lock also orders writers inside one
//! process for blob stores without transactions.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::{BlobStore, ENTRIES_KEY, TAGS_KEY};
use crate::models::{is_local_path, normalize_tag, DiaryEntry};
use crate::storage::AssetStore;
use crate::util::{format_date, format_time, now_millis};
use crate::{Error, Result};

pub struct LocalRecordStore {
    blobs: Arc<dyn BlobStore>,
    assets: AssetStore,
    write_lock: Mutex<()>,
}

impl LocalRecordStore {
    pub fn new(blobs: Arc<dyn BlobStore>, assets: AssetStore) -> Self {
        Self {
            blobs,
            assets,
            write_lock: Mutex::new(()),
        }
    }

    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.blobs)
    }

    pub const fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// All entries, newest first. Never fails: unreadable storage is empty.
    pub fn list(&self) -> Vec<DiaryEntry> {
        let mut entries = self.load_entries();
        entries.sort_by(|a, b| b.create_time.cmp(&a.create_time));
        entries
    }

    pub fn get_by_id(&self, id: &str) -> Option<DiaryEntry> {
        self.load_entries()
            .into_iter()
            .find(|entry| entry.id.as_str() == id)
    }

    /// Create or update `entry`, returning what was persisted.
    ///
    /// An update keeps the stored `createTime` and display strings and never
    /// moves `updateTime` backwards; a create stamps both timestamps with now
    /// and goes to the front.
    pub fn save(&self, entry: DiaryEntry) -> Result<DiaryEntry> {
        let mut entry = entry;
        entry.normalize();

        let _guard = self.write_lock.lock();
        let (saved, replaced_image) = self.modify_entries(|entries| {
            let now = now_millis();
            let mut replaced_image = None;

            if let Some(index) = entries.iter().position(|stored| stored.id == entry.id) {
                let stored = &entries[index];
                entry.create_time = stored.create_time;
                entry.date_string.clone_from(&stored.date_string);
                entry.time_string.clone_from(&stored.time_string);
                entry.update_time = now.max(stored.update_time).max(entry.create_time);
                if stored.image_ref() != entry.image_ref() {
                    replaced_image = stored.image_ref().map(ToString::to_string);
                }
                entries[index] = entry.clone();
                tracing::debug!("Updating entry {}", entry.id);
            } else {
                entry.create_time = now;
                entry.update_time = now;
                entry.date_string = format_date(now);
                entry.time_string = format_time(now);
                entries.insert(0, entry.clone());
                tracing::debug!("Creating entry {}", entry.id);
            }
            Ok((entry, replaced_image))
        })?;

        if let Some(previous) = replaced_image.filter(|path| is_local_path(path)) {
            self.assets.delete(&previous);
        }
        Ok(saved)
    }

    /// Remove an entry, then clean up its local image.
    ///
    /// The reduced collection is persisted before the image is touched, so a
    /// failed write leaves both the entry and its image in place.
    pub fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let removed = self.modify_entries(|entries| {
            let index = entries
                .iter()
                .position(|entry| entry.id.as_str() == id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            Ok(entries.remove(index))
        })?;
        tracing::info!("Deleted entry {id}");

        if let Some(path) = removed.image_ref().filter(|path| is_local_path(path)) {
            self.assets.delete(path);
        }
        Ok(())
    }

    /// Replace the whole collection, keeping the first of any duplicate ids.
    ///
    /// Local images of the old collection that the new one no longer
    /// references are deleted once the write lands.
    pub fn replace_all(&self, entries: Vec<DiaryEntry>) -> Result<usize> {
        let mut seen = HashSet::new();
        let entries: Vec<DiaryEntry> = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.id.clone()))
            .collect();
        let kept: HashSet<String> = entries
            .iter()
            .filter_map(|entry| entry.image_ref().map(ToString::to_string))
            .collect();
        let count = entries.len();

        let _guard = self.write_lock.lock();
        let previous = self.modify_entries(|stored| Ok(std::mem::replace(stored, entries)))?;
        tracing::info!("Replaced local collection with {count} entries");

        for path in previous
            .iter()
            .filter_map(DiaryEntry::image_ref)
            .filter(|path| is_local_path(path) && !kept.contains(*path))
        {
            self.assets.delete(path);
        }
        Ok(count)
    }

    /// Custom tags in registration order.
    pub fn list_tags(&self) -> Vec<String> {
        read_list::<serde_json::Value>(self.blobs.as_ref(), TAGS_KEY)
            .into_iter()
            .filter_map(|value| value.as_str().and_then(normalize_tag))
            .collect()
    }

    /// Register a custom tag, returning the trimmed value.
    ///
    /// Registering an existing tag is a no-op.
    pub fn add_tag(&self, tag: &str) -> Result<String> {
        let tag =
            normalize_tag(tag).ok_or_else(|| Error::Validation("tag cannot be empty".to_string()))?;

        let _guard = self.write_lock.lock();
        let added = modify_list(self.blobs.as_ref(), TAGS_KEY, |tags: &mut Vec<String>| {
            tags.retain(|stored| normalize_tag(stored).is_some());
            if tags.iter().any(|stored| stored.trim() == tag) {
                return Ok(None);
            }
            tags.push(tag.clone());
            Ok(Some(()))
        })?;
        if added.is_some() {
            tracing::debug!("Registered custom tag {tag}");
        }
        Ok(tag)
    }

    /// Wipe entries and custom tags.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.blobs
            .remove(ENTRIES_KEY)
            .and_then(|()| self.blobs.remove(TAGS_KEY))
            .map_err(|error| Error::Persistence(error.to_string()))?;
        tracing::info!("Cleared local diary");
        Ok(())
    }

    /// Entries in storage order.
    fn load_entries(&self) -> Vec<DiaryEntry> {
        read_list(self.blobs.as_ref(), ENTRIES_KEY)
            .into_iter()
            .filter(|entry: &DiaryEntry| !entry.id.as_str().is_empty())
            .collect()
    }

    /// Mutate the entry collection in one storage update that always writes.
    fn modify_entries<R>(
        &self,
        mutate: impl FnOnce(&mut Vec<DiaryEntry>) -> Result<R>,
    ) -> Result<R> {
        modify_list(self.blobs.as_ref(), ENTRIES_KEY, |entries: &mut Vec<DiaryEntry>| {
            entries.retain(|entry| !entry.id.as_str().is_empty());
            mutate(entries).map(Some)
        })?
        .ok_or_else(|| Error::Persistence(format!("write {ENTRIES_KEY}: nothing written")))
    }
}

/// Read a JSON array blob leniently.
///
/// Missing, unreadable and non-array blobs yield an empty list; elements
/// that fail to deserialize are skipped. Writers start from this view, so
/// the next write drops those elements from storage for good.
fn read_list<T: DeserializeOwned>(blobs: &dyn BlobStore, key: &str) -> Vec<T> {
    match blobs.get(key) {
        Ok(raw) => parse_list(key, raw.as_deref()),
        Err(error) => {
            tracing::warn!("Failed to read {key}: {error}");
            Vec::new()
        }
    }
}

fn parse_list<T: DeserializeOwned>(key: &str, raw: Option<&str>) -> Vec<T> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let items = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => items,
        Ok(_) => {
            tracing::warn!("Ignoring {key}: stored value is not a list");
            return Vec::new();
        }
        Err(error) => {
            tracing::warn!("Ignoring {key}: {error}");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!("Skipping malformed element {index} of {key}: {error}");
                None
            }
        })
        .collect()
}

/// Read, mutate and write back the list under `key` in one
/// [`BlobStore::update`].
///
/// `mutate` returns `Ok(None)` to skip the write. Its own errors pass
/// through unchanged; storage failures become `Persistence`.
fn modify_list<T, R>(
    blobs: &dyn BlobStore,
    key: &str,
    mutate: impl FnOnce(&mut Vec<T>) -> Result<Option<R>>,
) -> Result<Option<R>>
where
    T: Serialize + DeserializeOwned,
{
    let mut mutate = Some(mutate);
    let mut outcome: Option<Result<Option<R>>> = None;

    let written = blobs.update(key, &mut |raw| {
        let Some(mutate) = mutate.take() else {
            return Ok(None);
        };
        let mut items = parse_list(key, raw.as_deref());
        match mutate(&mut items) {
            Ok(Some(result)) => {
                let next = serde_json::to_string(&items)?;
                outcome = Some(Ok(Some(result)));
                Ok(Some(next))
            }
            Ok(None) => {
                outcome = Some(Ok(None));
                Ok(None)
            }
            Err(error) => {
                outcome = Some(Err(error));
                Err(Error::Validation(format!("{key} left unchanged")))
            }
        }
    });

    match (written, outcome) {
        (_, Some(Err(error))) => Err(error),
        (Err(error), _) => Err(Error::Persistence(format!("write {key}: {error}"))),
        (Ok(()), outcome) => outcome.unwrap_or(Ok(None)),
    }
}

pub(crate) fn write_value<T: Serialize + ?Sized>(
    blobs: &dyn BlobStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    blobs
        .put(key, &raw)
        .map_err(|error| Error::Persistence(format!("write {key}: {error}")))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::db::SqliteBlobStore;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    /// Blob store whose writes can be switched off.
    pub(crate) struct FlakyBlobs {
        inner: SqliteBlobStore,
        fail_writes: AtomicBool,
    }

    impl FlakyBlobs {
        pub(crate) fn new() -> Self {
            Self {
                inner: SqliteBlobStore::open_in_memory().unwrap(),
                fail_writes: AtomicBool::new(false),
            }
        }

        pub(crate) fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }
    }

    impl BlobStore for FlakyBlobs {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &str) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.inner.put(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.inner.remove(key)
        }
    }

    pub(crate) fn test_store() -> (TempDir, Arc<FlakyBlobs>, LocalRecordStore) {
        let tmp = tempdir().unwrap();
        let blobs = Arc::new(FlakyBlobs::new());
        let assets = AssetStore::new(tmp.path().join("images"), tmp.path().join("scratch"));
        let store = LocalRecordStore::new(blobs.clone(), assets);
        (tmp, blobs, store)
    }

    fn saved_image(tmp: &TempDir, store: &LocalRecordStore) -> String {
        let picked = tmp.path().join("picked.jpg");
        fs::write(&picked, b"jpeg").unwrap();
        store
            .assets()
            .save(&picked)
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn list_is_empty_for_missing_or_corrupt_storage() {
        let (_tmp, blobs, store) = test_store();
        assert!(store.list().is_empty());

        blobs.put(ENTRIES_KEY, "{not json").unwrap();
        assert!(store.list().is_empty());

        blobs.put(ENTRIES_KEY, r#"{"id":"1"}"#).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn list_skips_malformed_elements() {
        let (_tmp, blobs, store) = test_store();
        blobs
            .put(
                ENTRIES_KEY,
                r#"[{"id":"a","name":"Gin","rating":3,"createTime":1},
                    {"id":"b","rating":"five"},
                    42,
                    {"id":"c","name":"Rum","rating":4,"createTime":2}]"#,
            )
            .unwrap();

        let ids: Vec<String> = store.list().iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn list_sorts_by_create_time_desc() {
        let (_tmp, blobs, store) = test_store();
        blobs
            .put(
                ENTRIES_KEY,
                r#"[{"id":"old","createTime":100},{"id":"new","createTime":300},{"id":"mid","createTime":200}]"#,
            )
            .unwrap();
        let ids: Vec<String> = store.list().iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn create_stamps_times_and_prepends() {
        let (_tmp, _blobs, store) = test_store();
        let first = store.save(DiaryEntry::new("Negroni", 4)).unwrap();
        let second = store.save(DiaryEntry::new("Spritz", 3)).unwrap();

        assert_eq!(first.create_time, first.update_time);
        assert_eq!(first.date_string, format_date(first.create_time));
        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
    }

    #[test]
    fn update_preserves_creation_fields() {
        let (_tmp, blobs, store) = test_store();
        blobs
            .put(
                ENTRIES_KEY,
                r#"[{"id":"n-1","name":"Negroni","rating":4,"createTime":1000,
                     "updateTime":1000,"dateString":"01.01","timeString":"08:00"}]"#,
            )
            .unwrap();

        let mut edited = store.get_by_id("n-1").unwrap();
        edited.rating = 5;
        edited.create_time = 999_999;
        edited.date_string = "12.31".to_string();
        let saved = store.save(edited).unwrap();

        assert_eq!(saved.create_time, 1000);
        assert_eq!(saved.date_string, "01.01");
        assert_eq!(saved.time_string, "08:00");
        assert!(saved.update_time >= saved.create_time);
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.get_by_id("n-1").unwrap().rating, 5);
    }

    #[test]
    fn saving_twice_keeps_creation_fields_and_update_time_monotonic() {
        let (_tmp, _blobs, store) = test_store();
        let created = store.save(DiaryEntry::new("Negroni", 4)).unwrap();

        let first = store.save(created.clone()).unwrap();
        let second = store.save(first.clone()).unwrap();

        for saved in [&first, &second] {
            assert_eq!(saved.create_time, created.create_time);
            assert_eq!(saved.date_string, created.date_string);
            assert_eq!(saved.time_string, created.time_string);
        }
        assert!(first.update_time >= created.update_time);
        assert!(second.update_time >= first.update_time);
        let stored = store.get_by_id(created.id.as_str()).unwrap();
        assert_eq!(stored.update_time, second.update_time);
        assert_eq!(stored.create_time, created.create_time);
    }

    #[test]
    fn update_time_never_moves_backwards() {
        let (_tmp, blobs, store) = test_store();
        let future = now_millis() + 60 * 60 * 1000;
        blobs
            .put(
                ENTRIES_KEY,
                &format!(
                    r#"[{{"id":"n-1","name":"Negroni","rating":4,"createTime":1000,"updateTime":{future}}}]"#
                ),
            )
            .unwrap();

        let saved = store.save(store.get_by_id("n-1").unwrap()).unwrap();
        assert_eq!(saved.update_time, future);
    }

    #[test]
    fn failed_save_reports_persistence_and_keeps_old_state() {
        let (_tmp, blobs, store) = test_store();
        store.save(DiaryEntry::new("Negroni", 4)).unwrap();
        blobs.fail_writes(true);

        let err = store.save(DiaryEntry::new("Spritz", 3)).unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn delete_missing_id_is_not_found_and_untouched() {
        let (_tmp, _blobs, store) = test_store();
        store.save(DiaryEntry::new("Negroni", 4)).unwrap();
        let before = store.list();

        assert!(matches!(store.delete("nope"), Err(Error::NotFound(_))));
        assert_eq!(store.list(), before);
    }

    #[test]
    fn delete_removes_entry_and_local_image() {
        let (tmp, _blobs, store) = test_store();
        let path = saved_image(&tmp, &store);
        let mut entry = DiaryEntry::new("Negroni", 4);
        entry.set_image(Some(path.clone()));
        let entry = store.save(entry).unwrap();

        store.delete(entry.id.as_str()).unwrap();
        assert!(store.get_by_id(entry.id.as_str()).is_none());
        assert!(!std::path::Path::new(&path).exists());
    }

    #[test]
    fn failed_delete_keeps_entry_and_image() {
        let (tmp, blobs, store) = test_store();
        let path = saved_image(&tmp, &store);
        let mut entry = DiaryEntry::new("Negroni", 4);
        entry.set_image(Some(path.clone()));
        let entry = store.save(entry).unwrap();

        blobs.fail_writes(true);
        assert!(matches!(
            store.delete(entry.id.as_str()),
            Err(Error::Persistence(_))
        ));
        assert!(store.get_by_id(entry.id.as_str()).is_some());
        assert!(std::path::Path::new(&path).exists());
    }

    #[test]
    fn delete_with_remote_image_leaves_assets_alone() {
        let (_tmp, _blobs, store) = test_store();
        let mut entry = DiaryEntry::new("Negroni", 4);
        entry.set_image(Some("https://cdn.example.com/n.jpg".to_string()));
        let entry = store.save(entry).unwrap();
        store.delete(entry.id.as_str()).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn replacing_image_deletes_previous_local_file() {
        let (tmp, _blobs, store) = test_store();
        let first = saved_image(&tmp, &store);
        let second = saved_image(&tmp, &store);

        let mut entry = DiaryEntry::new("Negroni", 4);
        entry.set_image(Some(first.clone()));
        let mut entry = store.save(entry).unwrap();
        entry.set_image(Some(second.clone()));
        store.save(entry).unwrap();

        assert!(!std::path::Path::new(&first).exists());
        assert!(std::path::Path::new(&second).exists());
    }

    #[test]
    fn replace_all_collapses_duplicate_ids() {
        let (_tmp, _blobs, store) = test_store();
        let mut a = DiaryEntry::new("First", 3);
        a.id = "same".into();
        let mut b = DiaryEntry::new("Second", 4);
        b.id = "same".into();
        let c = DiaryEntry::new("Other", 5);

        assert_eq!(store.replace_all(vec![a, b, c]).unwrap(), 2);
        assert_eq!(store.get_by_id("same").unwrap().name, "First");
    }

    #[test]
    fn replace_all_cleans_up_unreferenced_local_images() {
        let (tmp, _blobs, store) = test_store();
        let dropped = saved_image(&tmp, &store);
        let kept = saved_image(&tmp, &store);
        for path in [&dropped, &kept] {
            let mut entry = DiaryEntry::new("Negroni", 4);
            entry.set_image(Some(path.clone()));
            store.save(entry).unwrap();
        }

        let mut restored = DiaryEntry::new("Negroni", 4);
        restored.set_image(Some(kept.clone()));
        let mut remote = DiaryEntry::new("Spritz", 3);
        remote.set_image(Some("cloud://tipsy/images/o-1/a_1.jpg".to_string()));
        assert_eq!(store.replace_all(vec![restored, remote]).unwrap(), 2);

        assert!(!std::path::Path::new(&dropped).exists());
        assert!(std::path::Path::new(&kept).exists());
    }

    #[test]
    fn restored_path_escaping_images_dir_is_never_deleted() {
        let (tmp, _blobs, store) = test_store();
        fs::create_dir_all(store.assets().root()).unwrap();
        let precious = tmp.path().join("precious.txt");
        fs::write(&precious, b"keep").unwrap();

        let mut entry = DiaryEntry::new("Negroni", 4);
        entry.id = "n-1".into();
        entry.set_image(Some(
            store
                .assets()
                .root()
                .join("..")
                .join("precious.txt")
                .to_string_lossy()
                .into_owned(),
        ));
        store.replace_all(vec![entry]).unwrap();
        store.delete("n-1").unwrap();

        assert!(store.list().is_empty());
        assert!(precious.exists());
    }

    #[test]
    fn saves_from_two_processes_sharing_a_file_are_all_kept() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("tipsy.db");
        let open = || {
            let blobs = Arc::new(SqliteBlobStore::open(&db_path).unwrap());
            let assets = AssetStore::new(tmp.path().join("images"), tmp.path().join("scratch"));
            LocalRecordStore::new(blobs, assets)
        };
        let stores = [open(), open()];

        std::thread::scope(|scope| {
            for store in &stores {
                scope.spawn(move || {
                    for index in 0..50 {
                        store
                            .save(DiaryEntry::new(format!("Drink {index}"), 3))
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(stores[0].list().len(), 100);
        assert_eq!(open().list().len(), 100);
    }

    #[test]
    fn add_tag_trims_dedupes_and_validates() {
        let (_tmp, _blobs, store) = test_store();
        assert_eq!(store.add_tag("  Peaty ").unwrap(), "Peaty");
        store.add_tag("Peaty").unwrap();
        store.add_tag("Briny").unwrap();
        assert!(matches!(store.add_tag("   "), Err(Error::Validation(_))));
        assert_eq!(store.list_tags(), vec!["Peaty", "Briny"]);
    }

    #[test]
    fn clear_wipes_entries_and_tags() {
        let (_tmp, _blobs, store) = test_store();
        store.save(DiaryEntry::new("Negroni", 4)).unwrap();
        store.add_tag("Peaty").unwrap();
        store.clear().unwrap();
        assert!(store.list().is_empty());
        assert!(store.list_tags().is_empty());
    }

    #[test]
    fn concurrent_saves_do_not_lose_updates() {
        let (_tmp, _blobs, store) = test_store();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .save(DiaryEntry::new(format!("Drink {index}"), 3))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.list().len(), 8);
    }
}
