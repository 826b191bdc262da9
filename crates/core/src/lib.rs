//! # SOS Core
//!
//! Report-scoped, bounded file access over extracted SOS reports, plus resolution of
//! information domains to the files that hold them.
//!
//! ## Pipeline
//!
//! ```text
//! (report id, domain | path)
//!     │
//!     ├──> ReportCatalog (report id -> canonical root)
//!     │
//!     ├──> DomainResolver
//!     │      ├─> sandbox (literal sources)
//!     │      └─> glob_expand (single-level globs)
//!     │             └─> present / missing partition
//!     │
//!     └──> sandbox
//!            └─> read_file | list_dir | search_file | find_files
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use sos_core::{DomainConfig, DomainResolver, ReportCatalog, ReportDirectory};
//!
//! fn main() -> sos_core::Result<()> {
//!     let catalog = ReportCatalog::scan(Path::new("./sos_reports"))?;
//!     let resolver = DomainResolver::new(Arc::new(DomainConfig::builtin()?.clone()));
//!     let report = catalog.report("web01_20251209_1430")?;
//!     let sources = resolver.resolve_domain("network_interfaces", &report)?;
//!     println!("{} present, {} missing", sources.sources.len(), sources.missing_sources.len());
//!     Ok(())
//! }
//! ```

mod catalog;
mod domains;
mod error;
mod finder;
mod lister;
mod metadata;
mod reader;
mod report;
mod resolver;
mod searcher;
mod util;

pub mod glob_expand;
pub mod sandbox;

pub use catalog::{ReportCatalog, ReportFilter};
pub use domains::{DomainConfig, DomainDefinition, SourceLocator, SourceSpec};
pub use error::{Result, SosError};
pub use finder::find_files;
pub use lister::list_dir;
pub use metadata::ReportMetadata;
pub use reader::{read_file, ReadOptions};
pub use report::{Report, ReportDirectory};
pub use resolver::DomainResolver;
pub use searcher::{search_file, SearchOptions};
