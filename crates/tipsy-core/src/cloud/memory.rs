//! In-process backend with failure injection.
//!
//! Backs the core and CLI tests. Every handle cloned from one `MemoryCloud`
//! shares the same state.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::models::{ProfileUpdate, RemoteEntry, RemoteUser};
use crate::{Error, Result};

use super::{
    parse_remote_reference, remote_reference, Authorization, Authorizer, CloudServices,
    EntryCollection, IdentityExchange, ObjectStorage, UserRegistry,
};

const MEMORY_BUCKET: &str = "memory";

/// Which calls should fail.
#[derive(Clone, Debug, Default)]
pub struct MemoryFailures {
    pub exchange: bool,
    pub query: bool,
    pub insert: bool,
    pub update: bool,
    /// Uploads whose object key contains any of these fragments fail
    pub uploads_matching: Vec<String>,
    pub all_uploads: bool,
    pub object_deletes: bool,
    /// Document deletes fail for these note ids
    pub deletes_for_notes: HashSet<String>,
    pub user_get: bool,
    pub user_create: bool,
    pub user_update: bool,
    pub last_backup: bool,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<RemoteEntry>,
    users: BTreeMap<String, RemoteUser>,
    objects: BTreeMap<String, Vec<u8>>,
    failures: MemoryFailures,
    next_doc: u64,
    delete_calls: usize,
}

/// Shared in-memory stand-in for every cloud trait.
#[derive(Clone, Debug)]
pub struct MemoryCloud {
    openid: String,
    state: Arc<Mutex<State>>,
}

impl MemoryCloud {
    /// Backend whose identity exchange always answers `openid`.
    pub fn new(openid: impl Into<String>) -> Self {
        Self {
            openid: openid.into(),
            state: Arc::default(),
        }
    }

    /// Bundle this backend behind the service traits.
    pub fn services(&self, authorizer: Arc<dyn Authorizer>) -> CloudServices {
        CloudServices {
            authorizer,
            exchange: Arc::new(self.clone()),
            entries: Arc::new(self.clone()),
            users: Arc::new(self.clone()),
            objects: Arc::new(self.clone()),
        }
    }

    pub fn set_failures(&self, failures: MemoryFailures) {
        self.state.lock().failures = failures;
    }

    pub fn entries(&self) -> Vec<RemoteEntry> {
        self.state.lock().entries.clone()
    }

    pub fn seed_entry(&self, entry: RemoteEntry) {
        let mut state = self.state.lock();
        let mut entry = entry;
        if entry.doc_id.is_none() {
            state.next_doc += 1;
            entry.doc_id = Some(format!("doc-{}", state.next_doc));
        }
        state.entries.push(entry);
    }

    pub fn user(&self, openid: &str) -> Option<RemoteUser> {
        self.state.lock().users.get(openid).cloned()
    }

    pub fn seed_user(&self, user: RemoteUser) {
        self.state.lock().users.insert(user.openid.clone(), user);
    }

    pub fn has_object(&self, reference: &str) -> bool {
        parse_remote_reference(reference)
            .is_some_and(|(_, key)| self.state.lock().objects.contains_key(key))
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Number of document deletes attempted, failed ones included.
    pub fn delete_calls(&self) -> usize {
        self.state.lock().delete_calls
    }
}

fn injected(operation: &str) -> Error {
    Error::Remote(format!("injected {operation} failure"))
}

#[async_trait]
impl IdentityExchange for MemoryCloud {
    async fn exchange_for_identity(&self, _authorization: &Authorization) -> Result<String> {
        if self.state.lock().failures.exchange {
            return Err(Error::IdentityExchange("injected exchange failure".to_string()));
        }
        Ok(self.openid.clone())
    }
}

#[async_trait]
impl EntryCollection for MemoryCloud {
    async fn query(&self, owner: &str) -> Result<Vec<RemoteEntry>> {
        let state = self.state.lock();
        if state.failures.query {
            return Err(injected("query"));
        }
        Ok(state
            .entries
            .iter()
            .filter(|entry| entry.owner == owner)
            .cloned()
            .collect())
    }

    async fn find(&self, owner: &str, note_id: &str) -> Result<Option<RemoteEntry>> {
        let state = self.state.lock();
        if state.failures.query {
            return Err(injected("query"));
        }
        Ok(state
            .entries
            .iter()
            .find(|entry| entry.owner == owner && entry.note_id == note_id)
            .cloned())
    }

    async fn insert(&self, entry: &RemoteEntry) -> Result<String> {
        let mut state = self.state.lock();
        if state.failures.insert {
            return Err(injected("insert"));
        }
        state.next_doc += 1;
        let doc_id = format!("doc-{}", state.next_doc);
        let mut entry = entry.clone();
        entry.doc_id = Some(doc_id.clone());
        state.entries.push(entry);
        Ok(doc_id)
    }

    async fn update(&self, doc_id: &str, entry: &RemoteEntry) -> Result<()> {
        let mut state = self.state.lock();
        if state.failures.update {
            return Err(injected("update"));
        }
        let existing = state
            .entries
            .iter_mut()
            .find(|existing| existing.doc_id.as_deref() == Some(doc_id))
            .ok_or_else(|| Error::NotFound(doc_id.to_string()))?;
        let created_at = existing.created_at;
        *existing = entry.clone();
        existing.doc_id = Some(doc_id.to_string());
        existing.created_at = created_at;
        Ok(())
    }

    async fn delete(&self, doc_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.delete_calls += 1;
        let Some(index) = state
            .entries
            .iter()
            .position(|entry| entry.doc_id.as_deref() == Some(doc_id))
        else {
            return Ok(());
        };
        if state
            .failures
            .deletes_for_notes
            .contains(&state.entries[index].note_id)
        {
            return Err(injected("delete"));
        }
        state.entries.remove(index);
        Ok(())
    }
}

#[async_trait]
impl UserRegistry for MemoryCloud {
    async fn get(&self, openid: &str) -> Result<Option<RemoteUser>> {
        let state = self.state.lock();
        if state.failures.user_get {
            return Err(injected("user get"));
        }
        Ok(state.users.get(openid).cloned())
    }

    async fn create(&self, user: &RemoteUser) -> Result<()> {
        let mut state = self.state.lock();
        if state.failures.user_create {
            return Err(injected("user create"));
        }
        if state.users.contains_key(&user.openid) {
            return Err(Error::Conflict(format!("user {} already exists", user.openid)));
        }
        state.users.insert(user.openid.clone(), user.clone());
        Ok(())
    }

    async fn update_profile(&self, openid: &str, update: &ProfileUpdate) -> Result<()> {
        let mut state = self.state.lock();
        if state.failures.user_update {
            return Err(injected("user update"));
        }
        let user = state
            .users
            .get_mut(openid)
            .ok_or_else(|| Error::NotFound(openid.to_string()))?;
        if let Some(nickname) = &update.nickname {
            user.nickname.clone_from(nickname);
        }
        if let Some(avatar_url) = &update.avatar_url {
            user.avatar_url.clone_from(avatar_url);
        }
        Ok(())
    }

    async fn set_last_backup(&self, openid: &str, at: Option<i64>) -> Result<()> {
        let mut state = self.state.lock();
        if state.failures.last_backup {
            return Err(injected("last backup"));
        }
        let user = state
            .users
            .get_mut(openid)
            .ok_or_else(|| Error::NotFound(openid.to_string()))?;
        user.last_backup_at = at;
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryCloud {
    async fn upload(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let mut state = self.state.lock();
        let failures = &state.failures;
        if failures.all_uploads
            || failures
                .uploads_matching
                .iter()
                .any(|fragment| key.contains(fragment.as_str()))
        {
            return Err(Error::Upload(format!("injected upload failure for {key}")));
        }
        state.objects.insert(key.to_string(), bytes);
        Ok(remote_reference(MEMORY_BUCKET, key))
    }

    async fn delete(&self, references: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        if state.failures.object_deletes {
            return Err(injected("object delete"));
        }
        for reference in references {
            if let Some((_, key)) = parse_remote_reference(reference) {
                state.objects.remove(key);
            }
        }
        Ok(())
    }
}
