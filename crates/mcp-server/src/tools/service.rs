use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Serialize;
use sos_core::{
    DomainConfig, DomainResolver, ReadOptions, Report, ReportCatalog, ReportDirectory,
    ReportFilter, SearchOptions, SosError,
};
use sos_protocol::DefaultLimits;
use tokio::sync::RwLock;

use super::error::{envelope_for, tool_error_envelope, tool_success};
use super::schemas::{
    DomainSourcesRequest, FindFilesRequest, ListDirRequest, QueryReportsRequest,
    ReadFileRequest, SearchFileRequest,
};
use crate::ServerSettings;

const INSTRUCTIONS: &str = "SOS report explorer. Each report is an extracted Linux diagnostic \
archive laid out like the captured root filesystem. Start with query_sos_reports to get a \
report_id. Use get_info_sources_for_domain (see list_info_domains) to learn which files cover a \
topic such as network_interfaces or hardware. Then use list_dir, find_files_by_name(_recursive), \
read_file (paginate with next_offset) and search_file. All paths are relative to the report root.";

struct ServiceState {
    reports_dir: PathBuf,
    resolver: DomainResolver,
    limits: DefaultLimits,
    catalog: RwLock<Arc<ReportCatalog>>,
}

/// SOS report MCP service
#[derive(Clone)]
pub struct SosReportService {
    state: Arc<ServiceState>,
    tool_router: ToolRouter<Self>,
}

impl SosReportService {
    pub fn new(reports_dir: PathBuf, domains: DomainConfig) -> Result<Self, SosError> {
        let catalog = ReportCatalog::scan(&reports_dir)?;
        log::info!(
            "{} reports, {} information domains",
            catalog.len(),
            domains.len()
        );
        Ok(Self {
            state: Arc::new(ServiceState {
                reports_dir,
                resolver: DomainResolver::new(Arc::new(domains)),
                limits: DefaultLimits::default(),
                catalog: RwLock::new(Arc::new(catalog)),
            }),
            tool_router: Self::tool_router(),
        })
    }

    pub fn from_settings(settings: &ServerSettings) -> anyhow::Result<Self> {
        let domains = DomainConfig::load_or_builtin(settings.domains_config.as_deref())
            .context("failed to load domain configuration")?;
        Self::new(settings.reports_dir.clone(), domains).with_context(|| {
            format!(
                "failed to scan reports directory {}",
                settings.reports_dir.display()
            )
        })
    }

    async fn refresh_catalog(&self) -> Result<Arc<ReportCatalog>, SosError> {
        let fresh = Arc::new(ReportCatalog::scan(&self.state.reports_dir)?);
        *self.state.catalog.write().await = Arc::clone(&fresh);
        Ok(fresh)
    }

    /// Looks the report up in the current snapshot, rescanning once if it is unknown.
    async fn open_report(&self, id: &str) -> Result<Report, SosError> {
        let current = Arc::clone(&*self.state.catalog.read().await);
        match current.report(id) {
            Err(SosError::UnknownReport { .. }) => {
                log::debug!("report '{}' not in snapshot, rescanning", id.trim());
                self.refresh_catalog().await?.report(id)
            }
            other => other,
        }
    }

    fn respond<T: Serialize>(&self, outcome: Result<T, SosError>) -> CallToolResult {
        match outcome {
            Ok(value) => tool_success(&value),
            Err(err) => {
                log::debug!("tool error [{}]: {err}", err.code());
                tool_error_envelope(envelope_for(&err, self.state.resolver.config()))
            }
        }
    }

    async fn find(&self, request: FindFilesRequest, recursive: bool) -> CallToolResult {
        let max_items = self.state.limits.find_items.apply(request.max_items);
        let outcome = self.open_report(&request.report).await.and_then(|report| {
            sos_core::find_files(
                &report,
                request.path.as_deref().unwrap_or_default(),
                &request.pattern,
                recursive,
                max_items,
            )
        });
        self.respond(outcome)
    }
}

#[tool_handler]
impl ServerHandler for SosReportService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl SosReportService {
    #[tool(
        description = "List available SOS reports with hostname, serial number, UUID and creation date. Call this FIRST: every other tool takes the report_id it returns. Filters: hostname (partial, case-insensitive), serial_number (exact), date_contains (partial)."
    )]
    pub async fn query_sos_reports(
        &self,
        Parameters(request): Parameters<QueryReportsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let max_items = self.state.limits.report_items.apply(request.max_items);
        let filter = ReportFilter {
            hostname: request.hostname,
            serial_number: request.serial_number,
            date_contains: request.date_contains,
        };
        let outcome = self
            .refresh_catalog()
            .await
            .map(|catalog| catalog.query(&filter, max_items));
        Ok(self.respond(outcome))
    }

    #[tool(
        description = "List the information domains (e.g. network_interfaces, hardware, logs) known to get_info_sources_for_domain, with descriptions."
    )]
    pub async fn list_info_domains(&self) -> Result<CallToolResult, McpError> {
        Ok(tool_success(&self.state.resolver.config().summaries()))
    }

    #[tool(
        description = "Show which files in a report hold information about a domain. Returns present sources in preference order (with confidence and notes) and the configured sources missing from this report."
    )]
    pub async fn get_info_sources_for_domain(
        &self,
        Parameters(request): Parameters<DomainSourcesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let resolver = &self.state.resolver;
        let outcome = match resolver.config().get(&request.domain) {
            Ok(_) => self
                .open_report(&request.report)
                .await
                .and_then(|report| resolver.resolve_domain(&request.domain, &report)),
            Err(err) => Err(err),
        };
        Ok(self.respond(outcome))
    }

    #[tool(
        description = "List the immediate entries of a directory inside a report (name, kind, size, symlink target), sorted by name. Results are capped; narrow the path when truncated."
    )]
    pub async fn list_dir(
        &self,
        Parameters(request): Parameters<ListDirRequest>,
    ) -> Result<CallToolResult, McpError> {
        let max_items = self.state.limits.list_items.apply(request.max_items);
        let outcome = self.open_report(&request.report).await.and_then(|report| {
            sos_core::list_dir(
                &report,
                request.path.as_deref().unwrap_or_default(),
                max_items,
            )
        });
        Ok(self.respond(outcome))
    }

    #[tool(
        description = "Find entries whose name matches a case-insensitive glob (e.g. 'ifcfg-*') directly inside one directory of a report."
    )]
    pub async fn find_files_by_name(
        &self,
        Parameters(request): Parameters<FindFilesRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.find(request, false).await)
    }

    #[tool(
        description = "Find entries whose name matches a case-insensitive glob anywhere below a directory of a report (symlinks are not followed)."
    )]
    pub async fn find_files_by_name_recursive(
        &self,
        Parameters(request): Parameters<FindFilesRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.find(request, true).await)
    }

    #[tool(
        description = "Read a file from a report as text, by byte window. Continue with offset=next_offset until eof is true."
    )]
    pub async fn read_file(
        &self,
        Parameters(request): Parameters<ReadFileRequest>,
    ) -> Result<CallToolResult, McpError> {
        let limit = self.state.limits.read_bytes.apply(request.limit) as u64;
        let options =
            ReadOptions::new(request.offset.unwrap_or(0), limit).strict(request.strict.unwrap_or(false));
        let outcome = self
            .open_report(&request.report)
            .await
            .and_then(|report| sos_core::read_file(&report, &request.path, options));
        Ok(self.respond(outcome))
    }

    #[tool(
        description = "Search a report file for lines containing a query (case-insensitive substring by default, optional regex), with optional context lines. Returns the first max_matches hits; truncated means more exist. Lines longer than max_line_bytes are clipped."
    )]
    pub async fn search_file(
        &self,
        Parameters(request): Parameters<SearchFileRequest>,
    ) -> Result<CallToolResult, McpError> {
        let limits = &self.state.limits;
        let options = SearchOptions {
            max_matches: limits.search_matches.apply(request.max_matches),
            lines_before: limits.search_context_lines.apply(request.lines_before),
            lines_after: limits.search_context_lines.apply(request.lines_after),
            case_sensitive: request.case_sensitive.unwrap_or(false),
            regex: request.regex.unwrap_or(false),
            max_line_bytes: limits.search_line_bytes.apply(request.max_line_bytes),
        };
        let outcome = self.open_report(&request.report).await.and_then(|report| {
            sos_core::search_file(&report, &request.path, &request.query, &options)
        });
        Ok(self.respond(outcome))
    }
}
