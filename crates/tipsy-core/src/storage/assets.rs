//! Durable local image storage.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::cleanup::best_effort;
use crate::util::generate_id;
use crate::{Error, Result};

use super::compress::compress_jpeg;

/// Copies picked images into a directory the app owns and removes them again.
///
/// Only files under `root` are ever deleted; anything else (temporary picker
/// files, remote references, external URLs) is left alone.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    scratch: PathBuf,
}

impl AssetStore {
    /// `root` holds durable images, `scratch` holds compression output.
    pub fn new(root: impl Into<PathBuf>, scratch: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scratch: scratch.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` names a file inside the durable directory.
    ///
    /// The part after `root` must be plain names only, so `..` segments
    /// cannot escape it.
    pub fn owns(&self, path: &str) -> bool {
        Path::new(path)
            .strip_prefix(&self.root)
            .is_ok_and(|rest| {
                rest.components().next().is_some()
                    && rest
                        .components()
                        .all(|component| matches!(component, Component::Normal(_)))
            })
    }

    /// Copy `temp_path` into the durable directory as `img_<id>.jpg`.
    pub fn save(&self, temp_path: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).map_err(|error| {
            Error::AssetWrite(format!("create {}: {error}", self.root.display()))
        })?;

        let target = self.root.join(format!("img_{}.jpg", generate_id()));
        fs::copy(temp_path, &target).map_err(|error| {
            Error::AssetWrite(format!("copy {}: {error}", temp_path.display()))
        })?;

        tracing::debug!("Saved image to {}", target.display());
        Ok(target)
    }

    /// Delete a durable image, reporting the failure.
    ///
    /// Returns `Ok(false)` without touching the disk for empty paths, paths
    /// outside the durable directory and files that are already gone.
    pub fn try_delete(&self, path: &str) -> Result<bool> {
        if !self.owns(path) {
            return Ok(false);
        }
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!("Deleted image {path}");
                Ok(true)
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    /// Delete a durable image, logging instead of failing.
    pub fn delete(&self, path: &str) {
        best_effort("Deleting image", self.try_delete(path));
    }

    /// Re-encode `source` as a bounded JPEG into the scratch directory.
    pub fn compress(&self, source: &Path, quality: u8) -> Result<PathBuf> {
        let bytes = fs::read(source)
            .map_err(|error| Error::Compression(format!("read {}: {error}", source.display())))?;
        let compressed = compress_jpeg(&bytes, quality)?;

        fs::create_dir_all(&self.scratch).map_err(|error| {
            Error::Compression(format!("create {}: {error}", self.scratch.display()))
        })?;
        let target = self.scratch.join(format!("compressed_{}.jpg", generate_id()));
        fs::write(&target, compressed.bytes)
            .map_err(|error| Error::Compression(format!("write {}: {error}", target.display())))?;

        tracing::debug!(
            "Compressed {} to {}x{}",
            source.display(),
            compressed.width,
            compressed.height
        );
        Ok(target)
    }
}
