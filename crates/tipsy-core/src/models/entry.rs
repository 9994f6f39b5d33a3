//! Diary entry model

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::util::{format_date, format_time, generate_id, normalize_text_option, now_millis};

use super::asset_ref::AssetRef;
use super::tag::dedupe_tags;

/// Stable identifier of a diary entry.
///
/// New ids are UUID v7 strings, but any non-empty string read back from
/// storage or the cloud is accepted so older records keep their identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Create a new unique entry ID
    #[must_use]
    pub fn new() -> Self {
        Self(generate_id())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One diary record of a single drink.
///
/// Serialized in camelCase so blobs written by earlier app versions load
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    /// Join key between the local and remote copies
    pub id: EntryId,
    /// What was drunk
    #[serde(default)]
    pub name: String,
    /// 1-5, 0 means unrated
    #[serde(default)]
    pub rating: u8,
    /// Asset reference: local path, `cloud://` reference or external URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Display mirror of `image_path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// First save (Unix ms); never changes afterwards
    #[serde(default)]
    pub create_time: i64,
    /// Last save (Unix ms)
    #[serde(default)]
    pub update_time: i64,
    /// `MM.DD` of `create_time`, frozen at creation
    #[serde(default)]
    pub date_string: String,
    /// `HH:mm` of `create_time`, frozen at creation
    #[serde(default)]
    pub time_string: String,
    /// ISO-8601 creation date kept for older cloud records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Owner identity once the entry has been linked to an account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openid: Option<String>,
}

impl DiaryEntry {
    /// Create a new entry stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, rating: u8) -> Self {
        let now = now_millis();
        Self {
            id: EntryId::new(),
            name: name.into(),
            rating,
            image_path: None,
            image_url: None,
            location: None,
            notes: None,
            price: None,
            tags: Vec::new(),
            create_time: now,
            update_time: now,
            date_string: format_date(now),
            time_string: format_time(now),
            date: None,
            openid: None,
        }
    }

    /// Point both image fields at `reference`.
    pub fn set_image(&mut self, reference: Option<String>) {
        let reference = normalize_text_option(reference);
        self.image_url.clone_from(&reference);
        self.image_path = reference;
    }

    /// The entry's image reference, preferring `image_path`.
    pub fn image_ref(&self) -> Option<&str> {
        self.image_path
            .as_deref()
            .filter(|value| !value.is_empty())
            .or_else(|| self.image_url.as_deref().filter(|value| !value.is_empty()))
    }

    /// Classified image reference.
    pub fn asset(&self) -> Option<AssetRef<'_>> {
        self.image_ref().and_then(AssetRef::classify)
    }

    /// `MM.DD` derived from `create_time`, falling back to the stored string.
    pub fn display_date(&self) -> String {
        if self.create_time > 0 {
            format_date(self.create_time)
        } else {
            self.date_string.clone()
        }
    }

    /// `HH:mm` derived from `create_time`, falling back to the stored string.
    pub fn display_time(&self) -> String {
        if self.create_time > 0 {
            format_time(self.create_time)
        } else {
            self.time_string.clone()
        }
    }

    /// Add `tag` if absent, remove it if present. Order of the rest is kept.
    pub fn toggle_tag(&mut self, tag: &str) {
        if let Some(index) = self.tags.iter().position(|existing| existing == tag) {
            self.tags.remove(index);
        } else {
            self.tags.push(tag.to_string());
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing == tag)
    }

    /// Trim free text, drop empty optionals, dedupe tags and re-mirror the
    /// image fields. Applied before every local write.
    pub(crate) fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.location = normalize_text_option(self.location.take());
        self.notes = normalize_text_option(self.notes.take());
        self.tags = dedupe_tags(std::mem::take(&mut self.tags));
        let reference = self.image_ref().map(ToString::to_string);
        if reference
            .as_deref()
            .and_then(AssetRef::classify)
            .is_some_and(|asset| asset.is_local())
        {
            self.image_path.clone_from(&reference);
            self.image_url = reference;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_id_unique() {
        assert_ne!(EntryId::new(), EntryId::new());
    }

    #[test]
    fn entry_new_stamps_both_times() {
        let entry = DiaryEntry::new("Old Fashioned", 5);
        assert!(entry.create_time > 0);
        assert_eq!(entry.create_time, entry.update_time);
        assert_eq!(entry.date_string.len(), 5);
        assert_eq!(entry.time_string.len(), 5);
    }

    #[test]
    fn legacy_blob_deserializes_with_defaults() {
        let raw = r#"{"id":"1","name":"Manhattan","rating":4,"createTime":1733326500000,
            "updateTime":1733326500000,"dateString":"12.04","timeString":"22:15",
            "imageUrl":"https://images.example.com/m.jpg"}"#;
        let entry: DiaryEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.id.as_str(), "1");
        assert!(entry.tags.is_empty());
        assert_eq!(entry.image_ref(), Some("https://images.example.com/m.jpg"));
    }

    #[test]
    fn serializes_camel_case_keys() {
        let entry = DiaryEntry::new("Vesper", 5);
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("createTime").is_some());
        assert!(value.get("dateString").is_some());
        assert!(value.get("create_time").is_none());
    }

    #[test]
    fn toggle_tag_preserves_insertion_order() {
        let mut entry = DiaryEntry::new("Negroni", 4);
        entry.toggle_tag("Bitter");
        entry.toggle_tag("Fruity");
        entry.toggle_tag("Smoky");
        entry.toggle_tag("Fruity");
        assert_eq!(entry.tags, vec!["Bitter", "Smoky"]);
    }

    #[test]
    fn normalize_trims_and_mirrors_local_image() {
        let mut entry = DiaryEntry::new("  Sazerac ", 3);
        entry.location = Some("   ".to_string());
        entry.notes = Some(" anise ".to_string());
        entry.image_path = Some("/data/images/img_1.jpg".to_string());
        entry.image_url = Some("/tmp/preview.jpg".to_string());
        entry.tags = vec!["Spicy".into(), "Spicy".into(), " ".into()];
        entry.normalize();

        assert_eq!(entry.name, "Sazerac");
        assert_eq!(entry.location, None);
        assert_eq!(entry.notes.as_deref(), Some("anise"));
        assert_eq!(entry.image_url, entry.image_path);
        assert_eq!(entry.tags, vec!["Spicy"]);
    }

    #[test]
    fn display_falls_back_to_stored_strings() {
        let mut entry = DiaryEntry::new("Gimlet", 3);
        entry.create_time = 0;
        entry.date_string = "11.19".to_string();
        entry.time_string = "18:00".to_string();
        assert_eq!(entry.display_date(), "11.19");
        assert_eq!(entry.display_time(), "18:00");
    }
}
