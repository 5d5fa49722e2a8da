//! [`UploadDir`]: per-owner staging area for uploaded spreadsheets.
//!
//! Layout: `<root>/<owner>/<uuid>_<original file name>`. The UUID prefix
//! keeps repeated uploads of the same file name distinct; listing sorts by
//! stored name so merge order is deterministic.

use std::{
  fs,
  io::ErrorKind,
  path::{Path, PathBuf},
};

use serde::Serialize;
use tally_core::{Owner, table::RawTable};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  read::{read_table, supported_extension},
};

/// One file waiting in an owner's staging directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedFile {
  /// Name on disk, unique within the owner's directory.
  pub stored_name:   String,
  /// Name as uploaded.
  pub original_name: String,
  pub size:          u64,
}

#[derive(Debug, Clone)]
pub struct UploadDir {
  root: PathBuf,
}

impl UploadDir {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  fn owner_dir(&self, owner: &Owner) -> Result<PathBuf> {
    let id = owner.as_str();
    let safe = !id.is_empty()
      && !id.starts_with('.')
      && id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if !safe {
      return Err(Error::InvalidName(id.to_owned()));
    }
    Ok(self.root.join(id))
  }

  /// Store `bytes` under a fresh name derived from `file_name`. Only the final
  /// path component of `file_name` is kept.
  pub fn save(&self, owner: &Owner, file_name: &str, bytes: &[u8]) -> Result<StagedFile> {
    let original = Path::new(file_name)
      .file_name()
      .and_then(|n| n.to_str())
      .filter(|n| !n.starts_with('.'))
      .ok_or_else(|| Error::InvalidName(file_name.to_owned()))?;
    if supported_extension(original).is_none() {
      return Err(Error::UnsupportedFormat(original.to_owned()));
    }

    let dir = self.owner_dir(owner)?;
    fs::create_dir_all(&dir)?;
    let stored_name = format!("{}_{original}", Uuid::new_v4());
    fs::write(dir.join(&stored_name), bytes)?;

    info!(owner = %owner, file = %stored_name, bytes = bytes.len(), "staged upload");
    Ok(StagedFile {
      stored_name,
      original_name: original.to_owned(),
      size: bytes.len() as u64,
    })
  }

  /// Staged files with a supported extension, sorted by stored name.
  pub fn list(&self, owner: &Owner) -> Result<Vec<StagedFile>> {
    let dir = self.owner_dir(owner)?;
    let entries = match fs::read_dir(&dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
      let entry = entry?;
      let meta = entry.metadata()?;
      let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
        continue;
      };
      if !meta.is_file() || supported_extension(&name).is_none() {
        continue;
      }
      let original_name = name
        .split_once('_')
        .map_or_else(|| name.clone(), |(_, rest)| rest.to_owned());
      files.push(StagedFile { stored_name: name, original_name, size: meta.len() });
    }
    files.sort_by(|a, b| a.stored_name.cmp(&b.stored_name));
    Ok(files)
  }

  /// Delete one staged file. Returns `false` if it did not exist.
  pub fn remove(&self, owner: &Owner, stored_name: &str) -> Result<bool> {
    if Path::new(stored_name).file_name().and_then(|n| n.to_str()) != Some(stored_name) {
      return Err(Error::InvalidName(stored_name.to_owned()));
    }
    match fs::remove_file(self.owner_dir(owner)?.join(stored_name)) {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e.into()),
    }
  }

  /// Remove the owner's whole staging directory.
  pub fn clear(&self, owner: &Owner) -> Result<()> {
    match fs::remove_dir_all(self.owner_dir(owner)?) {
      Ok(()) => {
        info!(owner = %owner, "cleared staged uploads");
        Ok(())
      }
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }

  /// Decode every staged file, in [`UploadDir::list`] order.
  pub fn load_tables(&self, owner: &Owner) -> Result<Vec<RawTable>> {
    let dir = self.owner_dir(owner)?;
    self
      .list(owner)?
      .into_iter()
      .map(|file| {
        let mut table = read_table(&dir.join(&file.stored_name))
          .map_err(|e| Error::File { file: file.original_name.clone(), source: Box::new(e) })?;
        table.source = file.original_name;
        debug!(owner = %owner, source = %table.source, rows = table.len(), "loaded staged file");
        Ok(table)
      })
      .collect()
  }
}
