//! Process-wide session state shared by services and the driver.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::UserIdentity;

/// Sync status shown next to the identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Offline,
    Syncing,
    Synced,
    Error,
}

#[derive(Debug, Default)]
struct Inner {
    identity: Option<UserIdentity>,
    sync_state: SyncState,
}

/// Cheap-to-clone handle on the current identity and sync status.
///
/// Services receive one of these instead of reaching for globals; tests build
/// their own.
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    inner: Arc<RwLock<Inner>>,
}

impl AppContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context already holding `identity`.
    pub fn with_identity(identity: Option<UserIdentity>) -> Self {
        let context = Self::default();
        context.set_identity(identity);
        context
    }

    pub fn identity(&self) -> Option<UserIdentity> {
        self.inner.read().identity.clone()
    }

    pub fn openid(&self) -> Option<String> {
        self.inner
            .read()
            .identity
            .as_ref()
            .map(|identity| identity.openid.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.read().identity.is_some()
    }

    pub fn set_identity(&self, identity: Option<UserIdentity>) {
        let mut inner = self.inner.write();
        if identity.is_none() {
            inner.sync_state = SyncState::Offline;
        }
        inner.identity = identity;
    }

    pub fn sync_state(&self) -> SyncState {
        self.inner.read().sync_state
    }

    pub fn set_sync_state(&self, state: SyncState) {
        self.inner.write().sync_state = state;
    }
}
