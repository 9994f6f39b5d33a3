//! Entry editing: draft validation and the image attach pipeline.

use std::fs;
use std::path::Path;

use crate::cleanup::best_effort;
use crate::models::{DiaryEntry, EntryId};
use crate::storage::DEFAULT_QUALITY;
use crate::store::LocalRecordStore;
use crate::util::normalize_text_option;
use crate::{Error, Result};

/// Largest picked image accepted, in bytes.
pub const MAX_IMAGE_BYTES: u64 = 2 * 1024 * 1024;

/// What the user has typed so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDraft {
    /// Set when editing an existing entry
    pub id: Option<EntryId>,
    pub name: String,
    pub rating: u8,
    pub image_path: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub price: Option<f64>,
    pub tags: Vec<String>,
}

impl EntryDraft {
    /// Draft pre-filled from a stored entry.
    pub fn from_entry(entry: &DiaryEntry) -> Self {
        Self {
            id: Some(entry.id.clone()),
            name: entry.name.clone(),
            rating: entry.rating,
            image_path: entry.image_ref().map(ToString::to_string),
            location: entry.location.clone(),
            notes: entry.notes.clone(),
            price: entry.price,
            tags: entry.tags.clone(),
        }
    }

    pub fn toggle_tag(&mut self, tag: &str) {
        if let Some(index) = self.tags.iter().position(|existing| existing == tag) {
            self.tags.remove(index);
        } else {
            self.tags.push(tag.to_string());
        }
    }

    /// Check the draft can be saved.
    pub fn validate(&self) -> Result<()> {
        if self
            .image_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .is_none()
        {
            return Err(Error::Validation("a photo is required".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name is required".to_string()));
        }
        if !(1..=5).contains(&self.rating) {
            return Err(Error::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(Error::Validation(
                    "price must be a non-negative number".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Editor actions bound to a record store.
pub struct EntryEditor<'a> {
    store: &'a LocalRecordStore,
}

impl<'a> EntryEditor<'a> {
    pub const fn new(store: &'a LocalRecordStore) -> Self {
        Self { store }
    }

    /// Compress a picked image and move it into durable storage.
    ///
    /// `size` is the picked file's size as reported by the picker; images
    /// over [`MAX_IMAGE_BYTES`] are rejected before any work is done.
    pub fn attach_image(&self, temp_path: &Path, size: u64) -> Result<String> {
        if size > MAX_IMAGE_BYTES {
            return Err(Error::Validation(format!(
                "image is {} KiB; the limit is {} KiB",
                size / 1024,
                MAX_IMAGE_BYTES / 1024
            )));
        }

        let assets = self.store.assets();
        let compressed = assets.compress(temp_path, DEFAULT_QUALITY)?;
        let saved = assets.save(&compressed);
        best_effort("Removing compressed scratch file", fs::remove_file(&compressed));
        Ok(saved?.to_string_lossy().into_owned())
    }

    /// Validate and persist `draft`.
    pub fn save(&self, draft: EntryDraft) -> Result<DiaryEntry> {
        draft.validate()?;

        let mut entry = match &draft.id {
            Some(id) => self
                .store
                .get_by_id(id.as_str())
                .unwrap_or_else(|| DiaryEntry {
                    id: id.clone(),
                    ..DiaryEntry::new("", 0)
                }),
            None => DiaryEntry::new("", 0),
        };

        entry.name = draft.name.trim().to_string();
        entry.rating = draft.rating;
        entry.set_image(draft.image_path);
        entry.location = normalize_text_option(draft.location);
        entry.notes = normalize_text_option(draft.notes);
        entry.price = draft.price;
        entry.tags = draft.tags;

        let saved = self.store.save(entry)?;
        tracing::info!("Saved entry {} ({})", saved.id, saved.name);
        Ok(saved)
    }

    /// Register a custom tag and hand back its trimmed form.
    pub fn add_custom_tag(&self, tag: &str) -> Result<String> {
        self.store.add_tag(tag)
    }
}
