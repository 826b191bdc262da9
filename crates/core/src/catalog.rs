use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use sos_protocol::{ReportList, ReportSummary};

use crate::error::{Result, SosError};
use crate::metadata::ReportMetadata;
use crate::report::{Report, ReportDirectory};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    /// Case-insensitive substring of the hostname.
    pub hostname: Option<String>,
    /// Exact serial number.
    pub serial_number: Option<String>,
    /// Substring of the raw creation date.
    pub date_contains: Option<String>,
}

impl ReportFilter {
    fn matches(&self, summary: &ReportSummary) -> bool {
        let wanted = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if let Some(hostname) = wanted(&self.hostname) {
            let Some(actual) = summary.hostname.as_deref() else {
                return false;
            };
            if !actual.to_lowercase().contains(&hostname.to_lowercase()) {
                return false;
            }
        }
        if let Some(serial) = wanted(&self.serial_number) {
            if summary.serial_number.as_deref() != Some(serial.as_str()) {
                return false;
            }
        }
        if let Some(date) = wanted(&self.date_contains) {
            let Some(actual) = summary.creation_date.as_deref() else {
                return false;
            };
            if !actual.contains(&date) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    summary: ReportSummary,
    root: PathBuf,
}

/// Snapshot of the extracted reports under one directory.
///
/// Every real subdirectory (symlinks are skipped) is a report. Its id is derived from the
/// hostname and capture date found inside; ids that would collide fall back to the directory
/// name, which is also accepted as an alias for every report. The reports directory is only
/// ever read.
#[derive(Debug, Clone, Default)]
pub struct ReportCatalog {
    entries: Vec<CatalogEntry>,
}

impl ReportCatalog {
    /// Scans `reports_dir`. A missing directory yields an empty catalog.
    pub fn scan(reports_dir: &Path) -> Result<Self> {
        let listing = match fs::read_dir(reports_dir) {
            Ok(listing) => listing,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("reports directory {} does not exist", reports_dir.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(SosError::io(reports_dir, err)),
        };

        let mut found: Vec<(String, PathBuf, ReportMetadata)> = Vec::new();
        for entry in listing {
            let entry = entry.map_err(|err| SosError::io(reports_dir, err))?;
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() || file_type.is_symlink() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            let root = entry.path();
            let metadata = ReportMetadata::extract(&root);
            found.push((dir_name, root, metadata));
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));

        let mut id_counts: HashMap<String, usize> = HashMap::new();
        for (_, _, metadata) in &found {
            *id_counts.entry(metadata.report_id()).or_default() += 1;
        }

        let mut entries: Vec<CatalogEntry> = found
            .into_iter()
            .map(|(dir_name, root, metadata)| {
                let derived = metadata.report_id();
                let report_id = if id_counts.get(&derived).copied().unwrap_or(0) > 1 {
                    log::debug!("report id '{derived}' is ambiguous, using '{dir_name}'");
                    dir_name.clone()
                } else {
                    derived
                };
                CatalogEntry {
                    summary: ReportSummary {
                        report_id,
                        report_name: dir_name,
                        hostname: metadata.hostname,
                        serial_number: metadata.serial_number,
                        uuid: metadata.uuid,
                        creation_date: metadata.creation_date,
                    },
                    root,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.summary.report_id.cmp(&b.summary.report_id));

        log::debug!(
            "catalogued {} reports under {}",
            entries.len(),
            reports_dir.display()
        );
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summaries(&self) -> impl Iterator<Item = &ReportSummary> {
        self.entries.iter().map(|entry| &entry.summary)
    }

    pub fn query(&self, filter: &ReportFilter, max_items: usize) -> ReportList {
        let matching: Vec<&ReportSummary> =
            self.summaries().filter(|s| filter.matches(s)).collect();
        let total_items = matching.len();
        let items: Vec<ReportSummary> = matching.into_iter().take(max_items).cloned().collect();
        ReportList {
            truncated: total_items > items.len(),
            total_items,
            items,
        }
    }

    fn lookup(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|entry| entry.summary.report_id == id)
            .or_else(|| self.entries.iter().find(|entry| entry.summary.report_name == id))
    }
}

impl ReportDirectory for ReportCatalog {
    fn report(&self, id: &str) -> Result<Report> {
        let id = id.trim();
        let entry = self.lookup(id).ok_or_else(|| SosError::UnknownReport {
            report: id.to_string(),
        })?;
        Report::open(entry.summary.report_id.clone(), &entry.root)
    }
}
