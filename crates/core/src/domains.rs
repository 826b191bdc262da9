//! Static domain → candidate-source configuration.
//!
//! The configuration is JSON or TOML with a top-level `info_sources` table. It is parsed and
//! validated once; afterwards it is shared read-only (`Arc<DomainConfig>` or the process-wide
//! [`DomainConfig::builtin`]).

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use sos_protocol::{Confidence, DomainList, DomainSummary, ErrorEnvelope, SourceKind};

use crate::error::{Result, SosError};
use crate::{glob_expand, sandbox};

const BUILTIN_INFO_SOURCES: &str = include_str!("../../../config/info_sources.json");

static BUILTIN: OnceCell<DomainConfig> = OnceCell::new();

/// Where a source lives: exactly one literal path or one single-level glob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    Path(String),
    Glob(String),
}

impl SourceLocator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Path(value) | Self::Glob(value) => value,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Path(_) => SourceKind::Path,
            Self::Glob(_) => SourceKind::Glob,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub locator: SourceLocator,
    pub confidence: Confidence,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDefinition {
    pub description: String,
    /// Preference order for resolution results.
    pub sources: Vec<SourceSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainConfig {
    domains: BTreeMap<String, DomainDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    info_sources: BTreeMap<String, RawDomain>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDomain {
    #[serde(default)]
    description: String,
    #[serde(default)]
    sources: Vec<RawSource>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSource {
    path: Option<String>,
    glob: Option<String>,
    #[serde(default)]
    confidence: Confidence,
    #[serde(default)]
    notes: String,
}

impl DomainConfig {
    /// The configuration bundled with the crate, parsed on first use.
    pub fn builtin() -> Result<&'static DomainConfig> {
        BUILTIN.get_or_try_init(|| Self::from_bytes(BUILTIN_INFO_SOURCES.as_bytes()))
    }

    /// Loads `path` when given, otherwise a copy of the built-in configuration.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin().cloned(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|err| SosError::io(path, err))?;
        Self::from_bytes(&bytes).map_err(|err| match err {
            SosError::Config(message) => {
                SosError::Config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw = parse_raw(bytes)?;
        let mut domains = BTreeMap::new();
        for (name, raw_domain) in raw.info_sources {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(SosError::Config("domain name must not be empty".to_string()));
            }
            let sources = raw_domain
                .sources
                .into_iter()
                .enumerate()
                .map(|(idx, source)| validate_source(&name, idx, source))
                .collect::<Result<Vec<_>>>()?;
            let definition = DomainDefinition {
                description: raw_domain.description,
                sources,
            };
            if domains.insert(name.clone(), definition).is_some() {
                return Err(SosError::Config(format!("duplicate domain '{name}'")));
            }
        }
        Ok(Self { domains })
    }

    pub fn get(&self, domain: &str) -> Result<&DomainDefinition> {
        self.domains
            .get(domain.trim())
            .ok_or_else(|| SosError::UnknownDomain {
                domain: domain.trim().to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Wire form of `err`; an unknown domain additionally lists the configured domains.
    pub fn error_envelope(&self, err: &SosError) -> ErrorEnvelope {
        let mut envelope = err.to_envelope();
        if let (SosError::UnknownDomain { .. }, Some(serde_json::Value::Object(details))) =
            (err, envelope.details.as_mut())
        {
            details.insert(
                "available_domains".to_string(),
                serde_json::Value::from(self.names().collect::<Vec<_>>()),
            );
        }
        envelope
    }

    pub fn summaries(&self) -> DomainList {
        let items: Vec<DomainSummary> = self
            .domains
            .iter()
            .map(|(name, definition)| DomainSummary {
                domain: name.clone(),
                description: definition.description.clone(),
                source_count: definition.sources.len(),
            })
            .collect();
        DomainList {
            total_items: items.len(),
            items,
        }
    }
}

fn parse_raw(bytes: &[u8]) -> Result<RawConfig> {
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(json_err) => {
            let utf8 = std::str::from_utf8(bytes)
                .map_err(|err| SosError::Config(format!("{json_err}; {err}")))?;
            let toml_value: toml::Value = toml::from_str(utf8).map_err(|toml_err| {
                SosError::Config(format!(
                    "not valid JSON ({json_err}) or TOML ({toml_err})"
                ))
            })?;
            serde_json::to_value(toml_value)
                .map_err(|err| SosError::Config(format!("TOML conversion failed: {err}")))?
        }
    };
    serde_json::from_value(value).map_err(|err| SosError::Config(err.to_string()))
}

fn validate_source(domain: &str, idx: usize, raw: RawSource) -> Result<SourceSpec> {
    let locate = |message: String| SosError::Config(format!("{domain}.sources[{idx}]: {message}"));

    let locator = match (raw.path, raw.glob) {
        (Some(path), None) => {
            let normalized = sandbox::normalize_relative(&path)
                .map_err(|_| locate(format!("path '{path}' escapes the report root")))?;
            if normalized.is_empty() {
                return Err(locate("path must not be empty".to_string()));
            }
            SourceLocator::Path(normalized)
        }
        (None, Some(glob)) => {
            glob_expand::validate(&glob).map_err(|err| locate(err.to_string()))?;
            SourceLocator::Glob(glob.trim().to_string())
        }
        (Some(_), Some(_)) => {
            return Err(locate("source has both 'path' and 'glob'".to_string()));
        }
        (None, None) => {
            return Err(locate("source needs one of 'path' or 'glob'".to_string()));
        }
    };

    Ok(SourceSpec {
        locator,
        confidence: raw.confidence,
        notes: raw.notes,
    })
}
