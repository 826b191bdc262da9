use std::path::Path;

use glob::{MatchOptions, Pattern};
use sos_protocol::{EntryKind, FindResult, FoundPath};
use walkdir::WalkDir;

use crate::error::{Result, SosError};
use crate::report::Report;
use crate::sandbox;

const NAME_MATCH: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn compile_name_pattern(pattern: &str) -> Result<Pattern> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Err(SosError::invalid_pattern(trimmed, "pattern must not be empty"));
    }
    if trimmed.contains("**") {
        return Err(SosError::invalid_pattern(
            trimmed,
            "recursive '**' patterns are not supported; use the recursive search instead",
        ));
    }
    if trimmed.contains('/') {
        return Err(SosError::invalid_pattern(
            trimmed,
            "pattern matches entry names and must not contain '/'",
        ));
    }
    Pattern::new(trimmed).map_err(|err| SosError::invalid_pattern(trimmed, err.msg))
}

fn join_relative(base: &str, rel: &Path) -> String {
    let tail = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if base.is_empty() {
        tail
    } else {
        format!("{base}/{tail}")
    }
}

/// Finds entries whose name matches a case-insensitive glob, in one directory or its subtree.
///
/// Symlinks are reported but never followed. Items come in path order, compared component by
/// component (`a/x` before `a-b`), which is the order the sorted walk visits them. The walk
/// stops after `max_items` matches plus one look-ahead match that only sets `truncated`, so a
/// truncated result is always a prefix of the full one.
pub fn find_files(
    report: &Report,
    dir: &str,
    pattern: &str,
    recursive: bool,
    max_items: usize,
) -> Result<FindResult> {
    let matcher = compile_name_pattern(pattern)?;
    let resolved = sandbox::resolve_allow_root(report.root(), dir)?;
    let base = resolved.canonical();
    if !base.is_dir() {
        return Err(SosError::NotADirectory {
            path: resolved.display().to_string(),
        });
    }

    let walker = WalkDir::new(base)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .follow_links(false)
        .sort_by(|a, b| a.path().cmp(b.path()));

    let mut items = Vec::new();
    let mut truncated = false;
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::debug!("find: skipping unreadable entry: {err}");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy();
        if !matcher.matches_with(&name, NAME_MATCH) {
            continue;
        }
        if items.len() >= max_items {
            truncated = true;
            break;
        }
        let Ok(rel) = entry.path().strip_prefix(base) else {
            continue;
        };
        let file_type = entry.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        items.push(FoundPath {
            path: join_relative(resolved.relative(), rel),
            kind,
        });
    }

    Ok(FindResult {
        report: report.id().to_string(),
        path: resolved.display().to_string(),
        pattern: pattern.trim().to_string(),
        recursive,
        items,
        truncated,
    })
}
