use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::error::CacheError;
use crate::kind::ContentKind;

/// Flat directory of per-day digest files, `{YYYYMMDD}.txt` / `{YYYYMMDD}.jpeg`.
///
/// The file name is the only index: lookups never list the directory.
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache dir: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, date: NaiveDate, kind: ContentKind) -> PathBuf {
        self.dir.join(file_name(date, kind))
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Write an entry through a temp file and rename, so readers see either
    /// the previous file or the complete new one.
    pub fn write(&self, date: NaiveDate, kind: ContentKind, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(date, kind);
        let tmp = path.with_extension(format!("{}.tmp", kind.extension()));
        std::fs::write(&tmp, bytes)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move {} into place", path.display()))?;
        Ok(path)
    }

    /// Delete every file whose date prefix is `save_days` or more days before
    /// `today`. Returns the number of files removed.
    pub fn sweep_expired(&self, today: NaiveDate, save_days: i64) -> Result<usize, CacheError> {
        if save_days <= 0 {
            return Err(CacheError::InvalidRetention(save_days));
        }

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(date) = parse_date_prefix(&name.to_string_lossy()) else {
                continue;
            };
            if (today - date).num_days() < save_days {
                continue;
            }
            let path = entry.path();
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!("Removed expired news file {}", path.display());
                    removed += 1;
                }
                Err(e) => tracing::error!("Failed to remove {}: {e}", path.display()),
            }
        }

        if removed > 0 {
            tracing::info!("Cache sweep removed {removed} expired files");
        }
        Ok(removed)
    }
}

fn file_name(date: NaiveDate, kind: ContentKind) -> String {
    format!("{}.{}", date.format("%Y%m%d"), kind.extension())
}

fn parse_date_prefix(name: &str) -> Option<NaiveDate> {
    let prefix = name.get(..8)?;
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(prefix, "%Y%m%d").ok()
}
