use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use thiserror::Error;
use watch_logging::watch_debug;

/// File name of the most recently downloaded transcript inside the archive directory.
pub const TRANSCRIPT_FILENAME: &str = "transcript.pdf";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("archive directory {} is unusable: {reason}", path.display())]
    ArchiveDir { path: PathBuf, reason: String },
    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Keeps a copy of the last downloaded transcript.
///
/// A new copy is written to a temp file next to the target and renamed over
/// it, so `transcript.pdf` is always either the old or the new document.
#[derive(Debug, Clone)]
pub struct TranscriptArchive {
    dir: PathBuf,
}

impl TranscriptArchive {
    /// Creates `dir` if needed and checks that it is a directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let archive = Self { dir: dir.into() };
        archive.prepare_dir()?;
        Ok(archive)
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TRANSCRIPT_FILENAME)
    }

    pub fn store(&self, document: &[u8]) -> Result<PathBuf, PersistError> {
        // The directory may have been removed since start-up.
        self.prepare_dir()?;

        let target = self.path();
        let write_err = |source| PersistError::Write {
            path: target.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(document).map_err(write_err)?;
        tmp.as_file_mut().sync_all().map_err(write_err)?;
        tmp.persist(&target).map_err(|err| write_err(err.error))?;

        watch_debug!("Archived transcript ({} bytes) at {}", document.len(), target.display());
        Ok(target)
    }

    fn prepare_dir(&self) -> Result<(), PersistError> {
        let unusable = |reason: String| PersistError::ArchiveDir {
            path: self.dir.clone(),
            reason,
        };
        match fs::metadata(&self.dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(unusable("not a directory".to_string())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&self.dir).map_err(|err| unusable(err.to_string()))
            }
            Err(err) => Err(unusable(err.to_string())),
        }
    }
}
