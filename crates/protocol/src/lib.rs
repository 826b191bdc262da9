use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Advisory confidence attached to a configured source. Never affects ordering.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

/// Filesystem kind of a present source, taken from the entry itself (links are not followed).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    File,
    Dir,
    Symlink,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Path,
    Glob,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct FoundSource {
    pub path: String,
    pub source_type: SourceType,
    pub confidence: Confidence,
    pub notes: String,
    /// Glob this path was expanded from, when the source was configured as a glob.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glob: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct MissingSource {
    pub pattern_or_path: String,
    pub kind: SourceKind,
    pub confidence: Confidence,
    pub notes: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct DomainSources {
    pub domain: String,
    pub description: String,
    pub report: String,
    pub sources: Vec<FoundSource>,
    pub missing_sources: Vec<MissingSource>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct DomainSummary {
    pub domain: String,
    pub description: String,
    pub source_count: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct DomainList {
    pub items: Vec<DomainSummary>,
    pub total_items: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct FileReadResult {
    pub report: String,
    pub path: String,
    pub offset: u64,
    pub limit: u64,
    /// Offset to request next. Equals `total_size` once `eof` is reached.
    pub next_offset: u64,
    pub eof: bool,
    pub total_size: u64,
    /// Bytes consumed from the file for this window.
    pub returned: u64,
    /// True when undecodable bytes were replaced with U+FFFD.
    pub lossy: bool,
    pub content_sha256: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct DirItem {
    pub name: String,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct DirListing {
    pub report: String,
    pub path: String,
    pub items: Vec<DirItem>,
    pub truncated: bool,
    pub total_items: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ContextLine {
    pub line_number: usize,
    pub line: String,
    /// The line was longer than the per-line byte cap and only its prefix is returned.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub line_truncated: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct SearchMatch {
    pub line_number: usize,
    pub line: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub line_truncated: bool,
    pub context_before: Vec<ContextLine>,
    pub context_after: Vec<ContextLine>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct SearchResult {
    pub report: String,
    pub path: String,
    pub query: String,
    pub items: Vec<SearchMatch>,
    pub truncated: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct FoundPath {
    pub path: String,
    pub kind: EntryKind,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct FindResult {
    pub report: String,
    pub path: String,
    pub pattern: String,
    pub recursive: bool,
    pub items: Vec<FoundPath>,
    pub truncated: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ReportSummary {
    pub report_id: String,
    /// Directory name of the extracted report.
    pub report_name: String,
    pub hostname: Option<String>,
    pub serial_number: Option<String>,
    pub uuid: Option<String>,
    pub creation_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ReportList {
    pub items: Vec<ReportSummary>,
    pub truncated: bool,
    pub total_items: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// A default plus a hard ceiling for one caller-supplied bound.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub struct Bound {
    pub default: usize,
    pub max: usize,
}

impl Bound {
    pub const fn new(default: usize, max: usize) -> Self {
        Self { default, max }
    }

    /// Fill in the default for a missing value and cap it at `max`.
    pub fn apply(self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default).min(self.max)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct DefaultLimits {
    pub read_bytes: Bound,
    pub list_items: Bound,
    pub search_matches: Bound,
    pub search_context_lines: Bound,
    /// Bytes kept per returned line (match or context).
    pub search_line_bytes: Bound,
    pub find_items: Bound,
    pub report_items: Bound,
}

impl Default for DefaultLimits {
    fn default() -> Self {
        Self {
            read_bytes: Bound::new(10_000, 200_000),
            list_items: Bound::new(50, 2_000),
            search_matches: Bound::new(50, 200),
            search_context_lines: Bound::new(0, 50),
            search_line_bytes: Bound::new(4_096, 65_536),
            find_items: Bound::new(50, 2_000),
            report_items: Bound::new(50, 50),
        }
    }
}

pub fn serialize_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bound_fills_default_and_caps() {
        let bound = Bound::new(50, 200);
        assert_eq!(bound.apply(None), 50);
        assert_eq!(bound.apply(Some(10)), 10);
        assert_eq!(bound.apply(Some(10_000)), 200);
    }

    #[test]
    fn enums_use_snake_case_on_the_wire() {
        let found = FoundSource {
            path: "sos_commands/networking/ip_addr".to_string(),
            source_type: SourceType::Symlink,
            confidence: Confidence::High,
            notes: String::new(),
            glob: None,
        };
        let value = serde_json::to_value(&found).unwrap();
        assert_eq!(value["source_type"], "symlink");
        assert_eq!(value["confidence"], "high");
        assert!(value.get("glob").is_none());
    }

    #[test]
    fn confidence_defaults_to_medium() {
        assert_eq!(Confidence::default(), Confidence::Medium);
    }
}
