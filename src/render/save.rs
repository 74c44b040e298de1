use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::RenderError;

pub trait FileSaver: Send + Sync {
    /// Stores `bytes` under `name` and returns where they went.
    fn save_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, RenderError>;
}

/// Writes downloads into one directory, replacing files of the same name.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileSaver for DirectorySaver {
    fn save_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, RenderError> {
        let path = self.dir.join(name);
        fs::create_dir_all(&self.dir).map_err(|source| RenderError::Save {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, bytes).map_err(|source| RenderError::Save {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), bytes = bytes.len(), "Saved file");
        Ok(path)
    }
}
