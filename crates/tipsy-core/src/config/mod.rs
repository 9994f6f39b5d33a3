//! Runtime configuration for cloud services and local paths.
//!
//! Everything is resolved through a lookup function so parsing can be tested
//! without touching the process environment.

use std::env;
use std::path::{Path, PathBuf};

use crate::storage::{parse_r2_config, R2Config};
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const ENV_SUPABASE_URL: &str = "TIPSY_SUPABASE_URL";
const ENV_SUPABASE_ANON_KEY: &str = "TIPSY_SUPABASE_ANON_KEY";
const ENV_LOGIN_ENDPOINT: &str = "TIPSY_LOGIN_ENDPOINT";

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "TIPSY_DATA_DIR";

const DB_FILE_NAME: &str = "tipsy.db";
const IMAGES_DIR_NAME: &str = "images";
const SCRATCH_DIR_NAME: &str = "tipsy-scratch";

/// Everything needed to reach the backup backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudConfig {
    /// Supabase project URL hosting the entry collection and user registry
    pub supabase_url: String,
    /// Public anon key sent with every PostgREST request
    pub supabase_anon_key: String,
    /// Login function exchanging an authorization for an openid
    pub login_endpoint: String,
    /// Object storage for images and avatars
    pub r2: R2Config,
}

impl CloudConfig {
    /// Load cloud configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no cloud variables are set and an error when
    /// only some of them are.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let supabase_url = normalize_text_option(lookup(ENV_SUPABASE_URL));
        let supabase_anon_key = normalize_text_option(lookup(ENV_SUPABASE_ANON_KEY));
        let login_endpoint = normalize_text_option(lookup(ENV_LOGIN_ENDPOINT));
        let r2 = parse_r2_config(&lookup)?;

        let any_present = supabase_url.is_some()
            || supabase_anon_key.is_some()
            || login_endpoint.is_some()
            || r2.is_some();
        if !any_present {
            return Ok(None);
        }

        let mut missing = Vec::new();
        if supabase_url.is_none() {
            missing.push(ENV_SUPABASE_URL);
        }
        if supabase_anon_key.is_none() {
            missing.push(ENV_SUPABASE_ANON_KEY);
        }
        if login_endpoint.is_none() {
            missing.push(ENV_LOGIN_ENDPOINT);
        }
        if r2.is_none() {
            missing.push("R2_*");
        }

        match (supabase_url, supabase_anon_key, login_endpoint, r2) {
            (Some(supabase_url), Some(supabase_anon_key), Some(login_endpoint), Some(r2)) => {
                Ok(Some(Self {
                    supabase_url: normalize_http_url(supabase_url, ENV_SUPABASE_URL)?,
                    supabase_anon_key,
                    login_endpoint: normalize_http_url(login_endpoint, ENV_LOGIN_ENDPOINT)?,
                    r2,
                }))
            }
            _ => Err(Error::InvalidConfig(format!(
                "Cloud configuration is incomplete. Missing: {}",
                missing.join(", ")
            ))),
        }
    }
}

fn normalize_http_url(value: String, name: &str) -> Result<String> {
    if is_http_url(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidConfig(format!(
            "{name} must start with http:// or https://"
        )))
    }
}

/// Filesystem locations used by the local store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppPaths {
    data_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl AppPaths {
    /// Paths rooted at `data_dir`, with scratch output in the system temp dir.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            scratch_dir: env::temp_dir().join(SCRATCH_DIR_NAME),
        }
    }

    #[must_use]
    pub fn with_scratch_dir(mut self, scratch_dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = scratch_dir.into();
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join(IMAGES_DIR_NAME)
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }
}
