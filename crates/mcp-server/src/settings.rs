use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "sos-mcp", version, about = "MCP server for extracted SOS reports")]
pub struct ServerSettings {
    /// Directory holding one extracted report per subdirectory
    #[arg(long, env = "SOS_REPORTS_DIR", default_value = "./sos_reports")]
    pub reports_dir: PathBuf,

    /// Domain configuration file (JSON or TOML); the built-in mapping is used when absent
    #[arg(long, env = "SOS_DOMAINS_CONFIG")]
    pub domains_config: Option<PathBuf>,
}
