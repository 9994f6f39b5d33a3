use std::env;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, TimeZone};
use tipsy_core::cloud::{Authorizer, CloudServices};
use tipsy_core::config::{AppPaths, CloudConfig, ENV_DATA_DIR};
use tipsy_core::db::{BlobStore, SqliteBlobStore};
use tipsy_core::identity::IdentityCache;
use tipsy_core::storage::AssetStore;
use tipsy_core::store::LocalRecordStore;
use tipsy_core::util::is_http_url;
use tipsy_core::DiaryEntry;

use crate::error::CliError;

const APP_DIR_NAME: &str = "tipsy";
const SHORT_ID_LEN: usize = 13;

/// Local handles opened once per command.
pub struct Session {
    pub paths: AppPaths,
    pub store: LocalRecordStore,
    pub cache: IdentityCache,
}

impl Session {
    pub fn open(data_dir: &Path) -> Result<Self, CliError> {
        Self::open_with(AppPaths::new(data_dir))
    }

    pub fn open_with(paths: AppPaths) -> Result<Self, CliError> {
        fs::create_dir_all(paths.data_dir())?;
        let blobs: Arc<dyn BlobStore> = Arc::new(SqliteBlobStore::open(paths.db_path())?);
        let assets = AssetStore::new(paths.images_dir(), paths.scratch_dir());
        let store = LocalRecordStore::new(blobs.clone(), assets);
        let cache = IdentityCache::new(blobs.clone());
        Ok(Self {
            paths,
            store,
            cache,
        })
    }
}

/// Pick the data directory: flag, then `TIPSY_DATA_DIR`, then the platform
/// data directory, then `./.tipsy`.
pub fn resolve_data_dir(
    explicit: Option<PathBuf>,
    env_value: Option<String>,
    platform_dir: Option<PathBuf>,
) -> PathBuf {
    explicit
        .or_else(|| {
            env_value
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
        .or_else(|| platform_dir.map(|dir| dir.join(APP_DIR_NAME)))
        .unwrap_or_else(|| PathBuf::from(".tipsy"))
}

pub fn default_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    resolve_data_dir(explicit, env::var(ENV_DATA_DIR).ok(), dirs::data_dir())
}

/// Cloud adapters from the environment, or a configuration error.
pub fn cloud_from_env(authorizer: Arc<dyn Authorizer>) -> Result<CloudServices, CliError> {
    let config = CloudConfig::from_env()?.ok_or(CliError::CloudNotConfigured)?;
    Ok(CloudServices::connect(&config, authorizer)?)
}

pub fn normalize_entry_identifier(raw: &str) -> Result<String, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyEntryId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Find an entry by exact id or by a prefix matching exactly one entry.
pub fn resolve_entry(store: &LocalRecordStore, query: &str) -> Result<DiaryEntry, CliError> {
    let query = normalize_entry_identifier(query)?;
    if let Some(entry) = store.get_by_id(&query) {
        return Ok(entry);
    }

    let mut matches: Vec<DiaryEntry> = store
        .list()
        .into_iter()
        .filter(|entry| entry.id.as_str().starts_with(&query))
        .collect();

    match matches.len() {
        0 => Err(CliError::EntryNotFound(query)),
        1 => Ok(matches.remove(0)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(short_id)
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousEntryId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(entry: &DiaryEntry) -> String {
    entry.id.as_str().chars().take(SHORT_ID_LEN).collect()
}

pub fn render_rating(rating: u8) -> String {
    let filled = usize::from(rating.min(5));
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

pub fn render_tags(entry: &DiaryEntry) -> String {
    entry
        .tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_entry_line(entry: &DiaryEntry) -> String {
    let name = truncate(&entry.name, 28);
    let line = format!(
        "{:<13}  {name:<28}  {}  {}",
        short_id(entry),
        render_rating(entry.rating),
        entry.display_time()
    );
    let tags = render_tags(entry);
    if tags.is_empty() {
        line
    } else {
        format!("{line}  {tags}")
    }
}

pub fn format_entry_details(entry: &DiaryEntry) -> Vec<String> {
    let mut lines = vec![
        format!("id:       {}", entry.id),
        format!("name:     {}", entry.name),
        format!("rating:   {}", render_rating(entry.rating)),
        format!("when:     {} {}", entry.display_date(), entry.display_time()),
    ];
    if let Some(location) = &entry.location {
        lines.push(format!("where:    {location}"));
    }
    if let Some(price) = entry.price {
        lines.push(format!("price:    {price:.2}"));
    }
    if !entry.tags.is_empty() {
        lines.push(format!("tags:     {}", render_tags(entry)));
    }
    if let Some(image) = entry.image_ref() {
        lines.push(format!("image:    {image}"));
    }
    if let Some(notes) = &entry.notes {
        lines.push(format!("notes:    {notes}"));
    }
    lines
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    Local.timestamp_millis_opt(timestamp_ms).single().map_or_else(
        || timestamp_ms.to_string(),
        |at| at.format("%Y-%m-%d %H:%M").to_string(),
    )
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut truncated = value.chars().take(max_chars - 3).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

/// Whether `--image` names a local file rather than a URL.
pub fn is_image_file(value: &str) -> bool {
    !is_http_url(value.trim())
}

/// Ask a yes/no question on the terminal. Non-interactive input answers no.
pub fn confirm(prompt: &str) -> Result<bool, CliError> {
    let answer = prompt_line(&format!("{prompt} [y/N] "))?;
    Ok(matches!(answer.as_deref(), Some("y" | "Y" | "yes" | "YES")))
}

/// Read one trimmed line from stdin after printing `prompt`.
///
/// Returns `None` when stdin is not a terminal or the answer is empty.
pub fn prompt_line(prompt: &str) -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Ok(None);
    }
    let mut stdout = io::stdout();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;

    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    let line = line.trim();
    Ok(if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    })
}
