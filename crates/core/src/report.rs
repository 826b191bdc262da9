use std::path::{Path, PathBuf};

use crate::error::{Result, SosError};

/// One extracted SOS report: a stable identifier plus its canonical root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    id: String,
    root: PathBuf,
}

impl Report {
    /// Opens a report rooted at `root`. The root is canonicalized once here so every later
    /// containment check compares canonical paths.
    pub fn open(id: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let id = id.into();
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|_| SosError::UnknownReport { report: id.clone() })?;
        if !canonical.is_dir() {
            return Err(SosError::UnknownReport { report: id });
        }
        Ok(Self {
            id,
            root: canonical,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Turns report identifiers into opened reports.
pub trait ReportDirectory {
    fn report(&self, id: &str) -> Result<Report>;
}
