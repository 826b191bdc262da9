//! SOS report MCP server
//!
//! Gives AI agents bounded, read-only access to extracted SOS reports over MCP (stdio).
//!
//! ## Tools
//!
//! - `query_sos_reports` - find reports by hostname, serial number or capture date
//! - `list_info_domains` - list the information domains that map to report files
//! - `get_info_sources_for_domain` - which files of a report cover a domain
//! - `list_dir`, `find_files_by_name`, `find_files_by_name_recursive` - explore a report
//! - `read_file`, `search_file` - paginated reads and bounded line search
//!
//! ## Usage
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "sos": {
//!       "command": "sos-mcp",
//!       "args": ["--reports-dir", "/srv/sos_reports"]
//!     }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use rmcp::transport::stdio;
use rmcp::ServiceExt;

mod settings;
mod tools;

pub use settings::ServerSettings;
pub use tools::SosReportService;

pub async fn main_entry() -> Result<()> {
    // stdout carries the MCP protocol; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let settings = ServerSettings::parse();
    let service = SosReportService::from_settings(&settings)
        .context("failed to initialise SOS report service")?;

    log::info!(
        "Starting SOS report MCP server (reports dir: {})",
        settings.reports_dir.display()
    );

    let server = service.serve(stdio()).await?;
    server.waiting().await?;

    log::info!("SOS report MCP server stopped");
    Ok(())
}
