//! Report-root confinement for caller-supplied relative paths.
//!
//! Every filesystem operation funnels its path through [`resolve`] (or [`resolve_allow_root`]
//! for operations where "the report root" is a meaningful target). A path is accepted only if
//! its lexical normalization stays under the root *and* its canonical form, with symlinks
//! followed, is still under the canonical root.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, SosError};

/// A caller path that passed the sandbox check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxedPath {
    relative: String,
    lexical: PathBuf,
    canonical: PathBuf,
}

impl SandboxedPath {
    /// Normalized report-relative form (`""` for the report root).
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// `root.join(relative)` without following symlinks. Use this for `lstat`-style checks.
    pub fn lexical(&self) -> &Path {
        &self.lexical
    }

    /// Fully resolved location on disk, guaranteed to live under the report root.
    pub fn canonical(&self) -> &Path {
        &self.canonical
    }

    /// Relative form for display, with `.` standing in for the root.
    pub fn display(&self) -> &str {
        if self.relative.is_empty() {
            "."
        } else {
            &self.relative
        }
    }
}

/// Lexically normalizes a report-relative path: `.` segments vanish, `..` pops a segment.
///
/// Absolute paths and `..` segments that would climb above the root are rejected. The result
/// uses `/` separators and may be empty (meaning the root itself).
pub fn normalize_relative(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('/') || trimmed.contains('\0') {
        return Err(SosError::OutOfBounds {
            path: trimmed.to_string(),
        });
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(SosError::OutOfBounds {
                        path: trimmed.to_string(),
                    });
                }
            }
            other => segments.push(other),
        }
    }
    Ok(segments.join("/"))
}

/// Resolves `raw` under `root`, rejecting empty paths. `root` must already be canonical.
pub fn resolve(root: &Path, raw: &str) -> Result<SandboxedPath> {
    let relative = normalize_relative(raw)?;
    if relative.is_empty() {
        return Err(SosError::OutOfBounds {
            path: raw.trim().to_string(),
        });
    }
    resolve_normalized(root, relative, raw)
}

/// Like [`resolve`], but an empty path (or `.`) resolves to the report root itself.
pub fn resolve_allow_root(root: &Path, raw: &str) -> Result<SandboxedPath> {
    let relative = normalize_relative(raw)?;
    resolve_normalized(root, relative, raw)
}

fn resolve_normalized(root: &Path, relative: String, raw: &str) -> Result<SandboxedPath> {
    let lexical = if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(&relative)
    };

    let canonical = match lexical.canonicalize() {
        Ok(path) => path,
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            return Err(SosError::io(&lexical, err));
        }
        Err(_) => {
            return Err(SosError::NotFound {
                path: raw.trim().to_string(),
            });
        }
    };

    if !canonical.starts_with(root) {
        log::warn!(
            "rejected '{}': resolves outside report root {}",
            raw.trim(),
            root.display()
        );
        return Err(SosError::OutOfBounds {
            path: raw.trim().to_string(),
        });
    }

    Ok(SandboxedPath {
        relative,
        lexical,
        canonical,
    })
}
