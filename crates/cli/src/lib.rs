//! `sos`: the SOS report tools as a command-line program.
//!
//! Every subcommand prints exactly one JSON document on stdout. A failure prints
//! `{"error": <envelope>}` instead and exits with status 1. Logs go to stderr.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use sos_core::{
    DomainConfig, DomainResolver, ReadOptions, Report, ReportCatalog, ReportDirectory,
    ReportFilter, SearchOptions, SosError,
};
use sos_protocol::{serialize_json_pretty, DefaultLimits, ErrorEnvelope};

#[derive(Parser)]
#[command(name = "sos")]
#[command(about = "Explore extracted SOS reports", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding one extracted report per subdirectory
    #[arg(
        long,
        global = true,
        env = "SOS_REPORTS_DIR",
        default_value = "./sos_reports"
    )]
    reports_dir: PathBuf,

    /// Domain configuration (JSON or TOML); the built-in one when omitted
    #[arg(long, global = true, env = "SOS_DOMAINS_CONFIG")]
    domains_config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List reports with hostname, serial number, UUID and creation date
    Reports(ReportsArgs),

    /// List the configured information domains
    Domains,

    /// Show which files of a report hold information about a domain
    Sources(SourcesArgs),

    /// List the entries of a directory inside a report
    Ls(LsArgs),

    /// Find entries whose name matches a case-insensitive glob
    Find(FindArgs),

    /// Read a byte window of a report file
    Cat(CatArgs),

    /// Search a report file line by line
    Grep(GrepArgs),

    /// Validate a domain configuration file and list its domains
    #[command(name = "check-config")]
    CheckConfig(CheckConfigArgs),
}

#[derive(Args)]
struct ReportsArgs {
    /// Hostname filter (partial, case-insensitive)
    #[arg(long)]
    hostname: Option<String>,

    /// Serial number filter (exact)
    #[arg(long)]
    serial_number: Option<String>,

    /// Creation date filter (partial)
    #[arg(long)]
    date_contains: Option<String>,

    #[arg(long)]
    max_items: Option<usize>,
}

#[derive(Args)]
struct SourcesArgs {
    /// Report id (or directory name)
    report: String,

    /// Information domain, e.g. network_interfaces
    domain: String,
}

#[derive(Args)]
struct LsArgs {
    report: String,

    /// Directory relative to the report root (default: the root)
    path: Option<String>,

    #[arg(long)]
    max_items: Option<usize>,
}

#[derive(Args)]
struct FindArgs {
    report: String,

    /// Filename glob, e.g. 'ifcfg-*'
    pattern: String,

    /// Directory to search, relative to the report root
    #[arg(long)]
    path: Option<String>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    #[arg(long)]
    max_items: Option<usize>,
}

#[derive(Args)]
struct CatArgs {
    report: String,

    path: String,

    /// Byte offset to start at (use next_offset to continue)
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Maximum bytes to read
    #[arg(long)]
    limit: Option<usize>,

    /// Fail on invalid UTF-8 instead of substituting U+FFFD
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct GrepArgs {
    report: String,

    path: String,

    query: String,

    /// Context lines before each match
    #[arg(short = 'B', long)]
    lines_before: Option<usize>,

    /// Context lines after each match
    #[arg(short = 'A', long)]
    lines_after: Option<usize>,

    #[arg(long)]
    max_matches: Option<usize>,

    #[arg(long)]
    case_sensitive: bool,

    /// Treat the query as a regular expression
    #[arg(long)]
    regex: bool,

    /// Bytes kept per printed line; longer lines are clipped
    #[arg(long)]
    max_line_bytes: Option<usize>,
}

#[derive(Args)]
struct CheckConfigArgs {
    file: PathBuf,
}

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

pub fn main_entry() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli);

    let (document, status) = match run(&cli) {
        Ok(value) => (value, ExitCode::SUCCESS),
        Err(envelope) => {
            log::debug!("{}: {}", envelope.code, envelope.message);
            (json!({ "error": envelope }), ExitCode::FAILURE)
        }
    };
    print_stdout(&serialize_json_pretty(&document)?)?;
    Ok(status)
}

fn run(cli: &Cli) -> Result<Value, ErrorEnvelope> {
    let limits = DefaultLimits::default();
    match &cli.command {
        Commands::Reports(args) => {
            let filter = ReportFilter {
                hostname: args.hostname.clone(),
                serial_number: args.serial_number.clone(),
                date_contains: args.date_contains.clone(),
            };
            let max_items = limits.report_items.apply(args.max_items);
            let catalog = ReportCatalog::scan(&cli.reports_dir).map_err(|err| err.to_envelope())?;
            encode(&catalog.query(&filter, max_items))
        }
        Commands::Domains => encode(&load_domains(cli)?.summaries()),
        Commands::Sources(args) => {
            let resolver = DomainResolver::new(Arc::new(load_domains(cli)?));
            let outcome = resolver
                .config()
                .get(&args.domain)
                .and_then(|_| open_report(cli, &args.report))
                .and_then(|report| resolver.resolve_domain(&args.domain, &report));
            encode(&outcome.map_err(|err| resolver.config().error_envelope(&err))?)
        }
        Commands::Ls(args) => {
            let max_items = limits.list_items.apply(args.max_items);
            let path = args.path.as_deref().unwrap_or_default();
            respond(
                open_report(cli, &args.report)
                    .and_then(|report| sos_core::list_dir(&report, path, max_items)),
            )
        }
        Commands::Find(args) => {
            let max_items = limits.find_items.apply(args.max_items);
            respond(open_report(cli, &args.report).and_then(|report| {
                sos_core::find_files(
                    &report,
                    args.path.as_deref().unwrap_or_default(),
                    &args.pattern,
                    args.recursive,
                    max_items,
                )
            }))
        }
        Commands::Cat(args) => {
            let limit = limits.read_bytes.apply(args.limit) as u64;
            let options = ReadOptions::new(args.offset, limit).strict(args.strict);
            respond(
                open_report(cli, &args.report)
                    .and_then(|report| sos_core::read_file(&report, &args.path, options)),
            )
        }
        Commands::Grep(args) => {
            let options = SearchOptions {
                max_matches: limits.search_matches.apply(args.max_matches),
                lines_before: limits.search_context_lines.apply(args.lines_before),
                lines_after: limits.search_context_lines.apply(args.lines_after),
                case_sensitive: args.case_sensitive,
                regex: args.regex,
                max_line_bytes: limits.search_line_bytes.apply(args.max_line_bytes),
            };
            respond(open_report(cli, &args.report).and_then(|report| {
                sos_core::search_file(&report, &args.path, &args.query, &options)
            }))
        }
        Commands::CheckConfig(args) => {
            respond(DomainConfig::from_file(&args.file).map(|config| config.summaries()))
        }
    }
}

fn load_domains(cli: &Cli) -> Result<DomainConfig, ErrorEnvelope> {
    DomainConfig::load_or_builtin(cli.domains_config.as_deref()).map_err(|err| err.to_envelope())
}

fn open_report(cli: &Cli, id: &str) -> Result<Report, SosError> {
    ReportCatalog::scan(&cli.reports_dir)?.report(id)
}

fn respond<T: Serialize>(outcome: Result<T, SosError>) -> Result<Value, ErrorEnvelope> {
    encode(&outcome.map_err(|err| err.to_envelope())?)
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ErrorEnvelope> {
    serde_json::to_value(value).map_err(|err| ErrorEnvelope {
        code: "internal".to_string(),
        message: format!("failed to serialize result: {err}"),
        details: None,
        hint: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn grep_context_flags_parse() {
        let cli = Cli::try_parse_from([
            "sos",
            "grep",
            "r1",
            "var/log/messages",
            "error",
            "-B",
            "2",
            "-A",
            "1",
            "--regex",
            "--max-line-bytes",
            "128",
        ])
        .unwrap();
        match cli.command {
            Commands::Grep(args) => {
                assert_eq!(args.lines_before, Some(2));
                assert_eq!(args.lines_after, Some(1));
                assert!(args.regex);
                assert!(!args.case_sensitive);
                assert_eq!(args.max_line_bytes, Some(128));
            }
            _ => panic!("expected grep"),
        }
    }
}
