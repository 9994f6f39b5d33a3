//! Database layer for Tipsy

mod blob_store;
mod connection;
mod migrations;

pub use blob_store::{
    BlobStore, SqliteBlobStore, ENTRIES_KEY, IDENTITY_KEY, TAGS_KEY, VIEW_STATE_KEY,
};
pub use connection::Database;
