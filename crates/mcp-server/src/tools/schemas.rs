use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct QueryReportsRequest {
    #[schemars(description = "Filter by hostname (partial match, case-insensitive)")]
    pub hostname: Option<String>,

    #[schemars(description = "Filter by hardware serial number (exact match)")]
    pub serial_number: Option<String>,

    #[schemars(description = "Filter by creation date (partial match on the raw date text)")]
    pub date_contains: Option<String>,

    #[schemars(description = "Maximum number of reports to return (default 50)")]
    pub max_items: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DomainSourcesRequest {
    #[schemars(description = "Report id from query_sos_reports (the directory name also works)")]
    pub report: String,

    #[schemars(description = "Information domain, e.g. 'network_interfaces' or 'hardware'")]
    pub domain: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListDirRequest {
    #[schemars(description = "Report id from query_sos_reports")]
    pub report: String,

    /// Directory relative to the report root. Default: the root.
    #[schemars(description = "Directory relative to the report root (default: root)")]
    pub path: Option<String>,

    #[schemars(description = "Maximum number of entries to return (default 50, max 2000)")]
    pub max_items: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FindFilesRequest {
    #[schemars(description = "Report id from query_sos_reports")]
    pub report: String,

    #[schemars(description = "Case-insensitive filename glob, e.g. 'ifcfg-*' or '*.conf'")]
    pub pattern: String,

    #[schemars(description = "Directory to search, relative to the report root (default: root)")]
    #[serde(alias = "search_path")]
    pub path: Option<String>,

    #[schemars(description = "Maximum number of paths to return (default 50, max 2000)")]
    #[serde(alias = "max_results")]
    pub max_items: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ReadFileRequest {
    #[schemars(description = "Report id from query_sos_reports")]
    pub report: String,

    #[schemars(description = "File path relative to the report root, e.g. 'etc/os-release'")]
    pub path: String,

    #[schemars(description = "Byte offset to start reading from (use next_offset to continue)")]
    pub offset: Option<u64>,

    #[schemars(description = "Maximum bytes to read (default 10000, max 200000)")]
    pub limit: Option<usize>,

    #[schemars(description = "Fail on invalid UTF-8 instead of substituting U+FFFD")]
    pub strict: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchFileRequest {
    #[schemars(description = "Report id from query_sos_reports")]
    pub report: String,

    #[schemars(description = "File path relative to the report root, e.g. 'var/log/messages'")]
    pub path: String,

    #[schemars(description = "Text to look for (case-insensitive substring by default)")]
    #[serde(alias = "substring")]
    pub query: String,

    #[schemars(description = "Context lines before each match (default 0, max 50)")]
    pub lines_before: Option<usize>,

    #[schemars(description = "Context lines after each match (default 0, max 50)")]
    pub lines_after: Option<usize>,

    #[schemars(description = "Maximum matches to return (default 50, max 200)")]
    pub max_matches: Option<usize>,

    #[schemars(description = "Match case exactly (default false)")]
    pub case_sensitive: Option<bool>,

    #[schemars(description = "Interpret the query as a regular expression (default false)")]
    pub regex: Option<bool>,

    #[schemars(
        description = "Bytes kept per returned line; longer lines are clipped and flagged line_truncated (default 4096, max 65536)"
    )]
    pub max_line_bytes: Option<usize>,
}
