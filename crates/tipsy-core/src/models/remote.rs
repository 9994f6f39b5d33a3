//! Documents stored in the remote entry collection and user registry

use serde::{Deserialize, Serialize};

use crate::util::{format_date, format_time, iso_date, parse_iso_date};

use super::entry::{DiaryEntry, EntryId};

/// One backed-up entry in the remote collection.
///
/// `(owner, note_id)` is the upsert key; `doc_id` is the backend's own row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(rename = "_openid")]
    pub owner: String,
    pub note_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub create_time: Option<i64>,
    #[serde(default)]
    pub date_string: Option<String>,
    #[serde(default)]
    pub time_string: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl RemoteEntry {
    /// Build the remote shape of `entry` for `owner`, pointing at `image_path`.
    ///
    /// `createTime` and the derived display strings are carried over as they
    /// are so a restore reproduces the original timeline.
    pub fn from_local(entry: &DiaryEntry, owner: &str, image_path: Option<String>) -> Self {
        Self {
            doc_id: None,
            owner: owner.to_string(),
            note_id: entry.id.to_string(),
            name: entry.name.clone(),
            location: entry.location.clone(),
            tags: entry.tags.clone(),
            rating: entry.rating,
            price: entry.price,
            notes: entry.notes.clone(),
            image_path,
            create_time: Some(entry.create_time),
            date_string: Some(entry.date_string.clone()),
            time_string: Some(entry.time_string.clone()),
            date: Some(iso_date(entry.create_time)),
            created_at: None,
            updated_at: None,
        }
    }

    /// Creation time recorded on the document, falling back to its ISO date.
    pub fn recorded_create_time(&self) -> Option<i64> {
        self.create_time
            .filter(|value| *value > 0)
            .or_else(|| self.date.as_deref().and_then(parse_iso_date))
    }

    /// Map back to a local entry created at `create_time`.
    pub fn into_local(self, create_time: i64) -> DiaryEntry {
        let date_string = self
            .date_string
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format_date(create_time));
        let time_string = self
            .time_string
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format_time(create_time));
        let image = self.image_path.filter(|value| !value.is_empty());
        let update_time = self.updated_at.unwrap_or(create_time).max(create_time);

        DiaryEntry {
            id: EntryId::from(self.note_id),
            name: self.name,
            rating: self.rating,
            image_url: image.clone(),
            image_path: image,
            location: self.location,
            notes: self.notes,
            price: self.price,
            tags: self.tags,
            create_time,
            update_time,
            date_string,
            time_string,
            date: self.date,
            openid: Some(self.owner),
        }
    }
}

/// A user's record in the remote registry, keyed by openid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUser {
    #[serde(rename = "_id")]
    pub openid: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub last_backup_at: Option<i64>,
}

/// Partial profile update; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}
