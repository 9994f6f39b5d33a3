//! Home timeline: entries grouped by day, profile statistics and the
//! remembered scroll position.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::db::{BlobStore, VIEW_STATE_KEY};
use crate::models::DiaryEntry;
use crate::store::write_value;
use crate::util::{calculate_month_days, now_millis};
use crate::Result;

/// How long a saved view state stays valid, in milliseconds.
pub const VIEW_STATE_TTL_MS: i64 = 30 * 60 * 1000;

/// Entries recorded on one local calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub date: NaiveDate,
    /// `MM.DD`
    pub label: String,
    pub entries: Vec<DiaryEntry>,
}

/// Group entries by local calendar day, newest day first.
pub fn group_by_day(entries: &[DiaryEntry]) -> Vec<DayGroup> {
    group_by_day_in(entries, &Local)
}

/// [`group_by_day`] in an explicit timezone.
///
/// Entries whose `createTime` cannot be placed on a calendar are skipped.
pub fn group_by_day_in<Tz: TimeZone>(entries: &[DiaryEntry], tz: &Tz) -> Vec<DayGroup> {
    let mut sorted: Vec<&DiaryEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.create_time.cmp(&a.create_time));

    let mut groups: Vec<DayGroup> = Vec::new();
    for entry in sorted {
        let Some(at) = tz.timestamp_millis_opt(entry.create_time).single() else {
            tracing::debug!("Skipping entry {} without a usable createTime", entry.id);
            continue;
        };
        let date = at.date_naive();
        match groups.last_mut() {
            Some(group) if group.date == date => group.entries.push(entry.clone()),
            _ => groups.push(DayGroup {
                date,
                label: date.format("%m.%d").to_string(),
                entries: vec![entry.clone()],
            }),
        }
    }
    groups
}

/// Numbers shown on the profile page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalStats {
    pub total_notes: usize,
    pub total_spent: f64,
    /// Distinct days with an entry in the current month
    pub month_days: usize,
}

impl JournalStats {
    pub fn from_entries<Tz: TimeZone>(entries: &[DiaryEntry], now: &DateTime<Tz>) -> Self {
        let total_spent = entries
            .iter()
            .filter_map(|entry| entry.price)
            .filter(|price| price.is_finite())
            .sum();
        Self {
            total_notes: entries.len(),
            total_spent,
            month_days: calculate_month_days(entries, now),
        }
    }
}

/// Remembered position on the home timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    #[serde(default)]
    pub active_group_index: usize,
    /// Selected card per group, by group index
    #[serde(default)]
    pub active_card_indices: Vec<usize>,
    /// When the state was saved (Unix ms)
    #[serde(default)]
    pub timestamp: i64,
}

impl ViewState {
    pub fn new(active_group_index: usize, active_card_indices: Vec<usize>) -> Self {
        Self {
            active_group_index,
            active_card_indices,
            timestamp: now_millis(),
        }
    }

    pub const fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms >= self.timestamp && now_ms - self.timestamp < VIEW_STATE_TTL_MS
    }

    /// Fit the indices to `groups`, padding missing card slots with 0.
    fn clamp_to(mut self, groups: &[DayGroup]) -> Option<Self> {
        if groups.is_empty() {
            return None;
        }
        self.active_group_index = self.active_group_index.min(groups.len() - 1);
        self.active_card_indices = groups
            .iter()
            .enumerate()
            .map(|(index, group)| {
                let card = self.active_card_indices.get(index).copied().unwrap_or(0);
                card.min(group.entries.len().saturating_sub(1))
            })
            .collect();
        Some(self)
    }
}

/// Persists [`ViewState`] under `home_view_state`.
pub struct ViewStateStore {
    blobs: Arc<dyn BlobStore>,
}

impl ViewStateStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    pub fn save(&self, state: &ViewState) -> Result<()> {
        write_value(self.blobs.as_ref(), VIEW_STATE_KEY, state)
    }

    /// Saved state if it is recent and `groups` is not empty.
    pub fn restore(&self, groups: &[DayGroup]) -> Option<ViewState> {
        self.restore_at(groups, now_millis())
    }

    pub fn restore_at(&self, groups: &[DayGroup], now_ms: i64) -> Option<ViewState> {
        let raw = match self.blobs.get(VIEW_STATE_KEY) {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::warn!("Failed to read view state: {error}");
                return None;
            }
        };
        let state: ViewState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(error) => {
                tracing::warn!("Ignoring malformed view state: {error}");
                return None;
            }
        };
        if !state.is_fresh(now_ms) {
            tracing::debug!("View state from {} has expired", state.timestamp);
            return None;
        }
        state.clamp_to(groups)
    }
}
