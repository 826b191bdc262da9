use std::fs;

use sos_protocol::{DirItem, DirListing, EntryKind};

use crate::error::{Result, SosError};
use crate::report::Report;
use crate::sandbox;

/// Lists the immediate children of a report directory, sorted by name.
///
/// At most `max_items` entries are returned; `truncated` tells whether more exist. There is no
/// continuation: a caller that needs more narrows the path instead.
pub fn list_dir(report: &Report, path: &str, max_items: usize) -> Result<DirListing> {
    let resolved = sandbox::resolve_allow_root(report.root(), path)?;
    let dir = resolved.canonical();
    let meta = fs::metadata(dir).map_err(|err| SosError::io(dir, err))?;
    if !meta.is_dir() {
        return Err(SosError::NotADirectory {
            path: resolved.display().to_string(),
        });
    }

    let mut children: Vec<(String, fs::DirEntry)> = fs::read_dir(dir)
        .map_err(|err| SosError::io(dir, err))?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::debug!("skipping unreadable entry in {}: {err}", dir.display());
                None
            }
        })
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry))
        .collect();
    children.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));

    let total_items = children.len();
    let items: Vec<DirItem> = children
        .into_iter()
        .take(max_items)
        .map(|(name, entry)| describe(name, &entry))
        .collect();

    Ok(DirListing {
        report: report.id().to_string(),
        path: resolved.display().to_string(),
        truncated: total_items > items.len(),
        total_items,
        items,
    })
}

fn describe(name: String, entry: &fs::DirEntry) -> DirItem {
    let Ok(file_type) = entry.file_type() else {
        return DirItem {
            name,
            kind: EntryKind::Other,
            size: None,
            link_target: None,
        };
    };

    if file_type.is_symlink() {
        let link_target = fs::read_link(entry.path())
            .ok()
            .map(|target| target.to_string_lossy().into_owned());
        DirItem {
            name,
            kind: EntryKind::Symlink,
            size: None,
            link_target,
        }
    } else if file_type.is_dir() {
        DirItem {
            name,
            kind: EntryKind::Dir,
            size: None,
            link_target: None,
        }
    } else if file_type.is_file() {
        DirItem {
            name,
            kind: EntryKind::File,
            size: entry.metadata().ok().map(|meta| meta.len()),
            link_target: None,
        }
    } else {
        DirItem {
            name,
            kind: EntryKind::Other,
            size: None,
            link_target: None,
        }
    }
}
