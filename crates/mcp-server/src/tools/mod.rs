//! MCP tool surface: request schemas, error envelopes and the service router.

mod error;
mod schemas;
mod service;

pub use service::SosReportService;
