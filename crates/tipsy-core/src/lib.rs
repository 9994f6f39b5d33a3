//! tipsy-core - Core library for Tipsy
//!
//! This crate holds the drinking diary model, the keyed-blob local store, the
//! identity flow and the cloud backup/restore services used by the `tipsy`
//! command line.

pub mod cleanup;
pub mod cloud;
pub mod config;
pub mod db;
pub mod editor;
pub mod error;
pub mod identity;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;
pub mod sync;
pub mod timeline;
pub mod util;

pub use error::{Error, Result};
pub use models::{DiaryEntry, EntryId, UserIdentity};
