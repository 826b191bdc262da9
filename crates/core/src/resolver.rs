use std::fs;
use std::path::Path;
use std::sync::Arc;

use sos_protocol::{DomainSources, FoundSource, MissingSource, SourceType};

use crate::domains::{DomainConfig, SourceLocator, SourceSpec};
use crate::error::{Result, SosError};
use crate::report::Report;
use crate::{glob_expand, sandbox};

/// Partitions a domain's configured sources into those present in a report and those missing.
///
/// Every configured source lands in exactly one of the two lists. Present entries keep the
/// configured preference order; the matches of one glob are contiguous and lexically ordered.
/// Resolution only checks existence, it never reads file contents.
#[derive(Debug, Clone)]
pub struct DomainResolver {
    config: Arc<DomainConfig>,
}

impl DomainResolver {
    pub fn new(config: Arc<DomainConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    pub fn resolve_domain(&self, domain: &str, report: &Report) -> Result<DomainSources> {
        let definition = self.config.get(domain)?;
        let root = report.root();

        let mut sources = Vec::new();
        let mut missing_sources = Vec::new();
        for spec in &definition.sources {
            let found = match &spec.locator {
                SourceLocator::Path(path) => resolve_literal(root, path, spec),
                SourceLocator::Glob(pattern) => resolve_glob(root, pattern, spec),
            };
            if found.is_empty() {
                missing_sources.push(missing_entry(spec));
            } else {
                sources.extend(found);
            }
        }

        log::debug!(
            "domain '{}' in report '{}': {} present, {} missing",
            domain.trim(),
            report.id(),
            sources.len(),
            missing_sources.len()
        );

        Ok(DomainSources {
            domain: domain.trim().to_string(),
            description: definition.description.clone(),
            report: report.id().to_string(),
            sources,
            missing_sources,
        })
    }
}

fn resolve_literal(root: &Path, path: &str, spec: &SourceSpec) -> Vec<FoundSource> {
    match sandbox::resolve(root, path) {
        Ok(resolved) => source_type(resolved.lexical())
            .map(|kind| found_entry(resolved.relative().to_string(), kind, spec, None))
            .into_iter()
            .collect(),
        Err(err @ SosError::OutOfBounds { .. }) => {
            log::warn!("source '{path}' rejected: {err}");
            Vec::new()
        }
        Err(err) => {
            log::debug!("source '{path}' not present: {err}");
            Vec::new()
        }
    }
}

fn resolve_glob(root: &Path, pattern: &str, spec: &SourceSpec) -> Vec<FoundSource> {
    let matches = match glob_expand::expand(root, pattern) {
        Ok(matches) => matches,
        Err(err) => {
            log::warn!("glob source '{pattern}' skipped: {err}");
            return Vec::new();
        }
    };

    matches
        .into_iter()
        .filter_map(|rel| {
            let kind = source_type(&root.join(&rel))?;
            Some(found_entry(rel, kind, spec, Some(pattern)))
        })
        .collect()
}

fn source_type(lexical: &Path) -> Option<SourceType> {
    let meta = fs::symlink_metadata(lexical).ok()?;
    let kind = meta.file_type();
    Some(if kind.is_symlink() {
        SourceType::Symlink
    } else if kind.is_dir() {
        SourceType::Dir
    } else {
        SourceType::File
    })
}

fn found_entry(
    path: String,
    source_type: SourceType,
    spec: &SourceSpec,
    glob: Option<&str>,
) -> FoundSource {
    FoundSource {
        path,
        source_type,
        confidence: spec.confidence,
        notes: spec.notes.clone(),
        glob: glob.map(str::to_string),
    }
}

fn missing_entry(spec: &SourceSpec) -> MissingSource {
    MissingSource {
        pattern_or_path: spec.locator.as_str().to_string(),
        kind: spec.locator.kind(),
        confidence: spec.confidence,
        notes: spec.notes.clone(),
    }
}
