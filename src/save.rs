//! Local save of extracted documents.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::SaveError;

pub const DEFAULT_FILENAME: &str = "extracted.pdf";

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Where a successful extraction ends up. Takes ownership of the payload.
pub trait SaveTarget: Send + Sync {
    fn save(&self, payload: Vec<u8>) -> Result<PathBuf, SaveError>;
}

/// Saves into a directory the way a browser download does: `extracted.pdf`,
/// then `extracted (1).pdf`, `extracted (2).pdf`, ... never overwriting.
#[derive(Debug, Clone)]
pub struct DownloadDir {
    dir: PathBuf,
    file_name: String,
}

impl DownloadDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DownloadDir {
            dir: dir.into(),
            file_name: DEFAULT_FILENAME.to_string(),
        }
    }

    fn candidate(&self, attempt: u32) -> PathBuf {
        if attempt == 0 {
            return self.dir.join(&self.file_name);
        }
        let name = Path::new(&self.file_name);
        let stem = name
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("extracted");
        let file_name = match name.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{} ({}).{}", stem, attempt, ext),
            None => format!("{} ({})", stem, attempt),
        };
        self.dir.join(file_name)
    }
}

impl SaveTarget for DownloadDir {
    fn save(&self, payload: Vec<u8>) -> Result<PathBuf, SaveError> {
        let io_err = |source| SaveError::Io {
            path: self.dir.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;

        // The temp file is deleted on drop unless persisted below.
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(&payload).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        let size = payload.len();
        drop(payload);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self.candidate(attempt);
            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    tracing::info!(
                        path = %path.display(),
                        bytes = size,
                        "Saved extracted document"
                    );
                    return Ok(path);
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => tmp = e.file,
                Err(e) => {
                    return Err(SaveError::Io {
                        path,
                        source: e.error,
                    })
                }
            }
        }

        Err(SaveError::NoFreeName {
            name: self.file_name.clone(),
            dir: self.dir.clone(),
        })
    }
}
