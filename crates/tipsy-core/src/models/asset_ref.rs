//! Classification of image references

use crate::util::is_http_url;

/// Scheme prefix of durable object-storage references.
pub const REMOTE_SCHEME: &str = "cloud://";

/// What kind of location an image reference points at.
///
/// Classification is purely by prefix: `cloud://` is remote, `http://` and
/// `https://` are external, anything else non-empty is a local path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRef<'a> {
    Local(&'a str),
    Remote(&'a str),
    External(&'a str),
}

impl<'a> AssetRef<'a> {
    /// Classify `value`, returning `None` for an empty reference.
    pub fn classify(value: &'a str) -> Option<Self> {
        if value.is_empty() {
            None
        } else if value.starts_with(REMOTE_SCHEME) {
            Some(Self::Remote(value))
        } else if is_http_url(value) {
            Some(Self::External(value))
        } else {
            Some(Self::Local(value))
        }
    }

    pub const fn as_str(&self) -> &'a str {
        match self {
            Self::Local(value) | Self::Remote(value) | Self::External(value) => value,
        }
    }

    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Whether `value` is a local file path that still needs uploading.
pub fn is_local_path(value: &str) -> bool {
    AssetRef::classify(value).is_some_and(|asset| asset.is_local())
}

/// Whether `value` is a durable `cloud://` reference.
pub fn is_remote_ref(value: &str) -> bool {
    AssetRef::classify(value).is_some_and(|asset| asset.is_remote())
}
