// SPDX-License-Identifier: MPL-2.0

//! On-disk photo library
//!
//! A library is one directory holding `catalog.jsonl`, one serialized
//! [`PhotoRecord`] per line, and a `photo_<id>.jpg` file per record. Every
//! write lands in a temporary sibling first and is renamed into place.
//!
//! Replacement images are staged as `photo_<id>.jpg.pending` and only
//! promoted over the live file once the catalog that describes them is saved.
//!
//! All calls block; the photo store only makes them from background stages.

use crate::constants::storage::{APP_DIR, CATALOG_FILE};
use crate::errors::{AgeError, AgeResult};
use crate::photo::record::PhotoRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoLibrary {
    root: PathBuf,
}

impl PhotoLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<data_dir>/agecam/library`, or `./agecam/library` without a data dir
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("library")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join(CATALOG_FILE)
    }

    pub fn photo_path(&self, id: i64) -> PathBuf {
        self.root.join(format!("photo_{}.jpg", id))
    }

    pub fn staged_photo_path(&self, id: i64) -> PathBuf {
        self.root.join(format!("photo_{}.jpg.pending", id))
    }

    /// Read the catalog, sorted by id
    ///
    /// A missing catalog is an empty library. Blank lines are skipped; any
    /// other unreadable line, or a repeated id, fails the whole load.
    pub fn load_catalog(&self) -> AgeResult<Vec<PhotoRecord>> {
        let path = self.catalog_path();
        if !path.exists() {
            debug!(path = %path.display(), "No catalog yet, starting empty");
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&path)
            .map_err(|e| AgeError::Storage(format!("{}: {}", path.display(), e)))?;

        let mut records = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                PhotoRecord::parse_json(line).map_err(|e| {
                    AgeError::MalformedData(format!("{} line {}: {}", path.display(), index + 1, e))
                })
            })
            .collect::<AgeResult<Vec<_>>>()?;

        records.sort_by_key(|r| r.id());
        if let Some(pair) = records.windows(2).find(|pair| pair[0].id() == pair[1].id()) {
            return Err(AgeError::MalformedData(format!(
                "{}: duplicate photo id {}",
                path.display(),
                pair[0].id()
            )));
        }

        debug!(path = %path.display(), count = records.len(), "Loaded catalog");
        Ok(records)
    }

    pub fn save_catalog(&self, records: &[PhotoRecord]) -> AgeResult<()> {
        let mut text = String::new();
        for record in records {
            text.push_str(&record.to_json()?);
            text.push('\n');
        }
        self.write_atomic(&self.catalog_path(), text.as_bytes())?;
        debug!(count = records.len(), "Saved catalog");
        Ok(())
    }

    pub fn read_photo(&self, id: i64) -> AgeResult<Vec<u8>> {
        let path = self.photo_path(id);
        fs::read(&path).map_err(|e| AgeError::Storage(format!("{}: {}", path.display(), e)))
    }

    pub fn write_photo(&self, id: i64, jpeg: &[u8]) -> AgeResult<()> {
        self.write_atomic(&self.photo_path(id), jpeg)?;
        debug!(id, bytes = jpeg.len(), "Wrote photo");
        Ok(())
    }

    /// Write a replacement image without touching the live one
    pub fn stage_photo(&self, id: i64, jpeg: &[u8]) -> AgeResult<()> {
        self.write_atomic(&self.staged_photo_path(id), jpeg)?;
        debug!(id, bytes = jpeg.len(), "Staged photo");
        Ok(())
    }

    /// Move the staged image over the live one
    pub fn promote_photo(&self, id: i64) -> AgeResult<()> {
        let staged = self.staged_photo_path(id);
        let path = self.photo_path(id);
        fs::rename(&staged, &path)
            .map_err(|e| AgeError::Storage(format!("{}: {}", staged.display(), e)))?;
        debug!(id, "Promoted staged photo");
        Ok(())
    }

    /// Drop a staged image; nothing staged is fine
    pub fn discard_staged_photo(&self, id: i64) -> AgeResult<()> {
        let staged = self.staged_photo_path(id);
        match fs::remove_file(&staged) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AgeError::Storage(format!("{}: {}", staged.display(), e))),
        }
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> AgeResult<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| AgeError::Storage(format!("{}: {}", self.root.display(), e)))?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, bytes)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|e| AgeError::Storage(format!("{}: {}", path.display(), e)))
    }
}
