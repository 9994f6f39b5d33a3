//! Data models for Tipsy

mod asset_ref;
mod entry;
mod identity;
mod remote;
mod tag;

pub use asset_ref::{is_local_path, is_remote_ref, AssetRef, REMOTE_SCHEME};
pub use entry::{DiaryEntry, EntryId};
pub use identity::UserIdentity;
pub use remote::{ProfileUpdate, RemoteEntry, RemoteUser};
pub use tag::{dedupe_tags, is_preset_tag, normalize_tag, PRESET_TAGS};
