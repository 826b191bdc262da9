use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::json;
use sos_core::{DomainConfig, SosError};
use sos_protocol::ErrorEnvelope;

fn hint_for(err: &SosError) -> Option<&'static str> {
    match err {
        SosError::UnknownReport { .. } => {
            Some("Call query_sos_reports to list valid report ids.")
        }
        SosError::UnknownDomain { .. } => {
            Some("Call list_info_domains, or pick one of details.available_domains.")
        }
        SosError::NotFound { .. } => {
            Some("Use list_dir or find_files_by_name_recursive to locate the file.")
        }
        SosError::NotAFile { .. } => Some("This is a directory; use list_dir instead."),
        SosError::NotADirectory { .. } => Some("This is a file; use read_file instead."),
        SosError::OutOfBounds { .. } => {
            Some("Paths are relative to the report root and cannot leave it.")
        }
        SosError::Decode { .. } => Some("Retry without strict to substitute invalid bytes."),
        SosError::InvalidPattern { .. } => {
            Some("Use single-level wildcards (*, ?, [...]); '**' is not supported.")
        }
        SosError::Config(_) | SosError::Io { .. } => None,
    }
}

pub(super) fn envelope_for(err: &SosError, domains: &DomainConfig) -> ErrorEnvelope {
    let mut envelope = domains.error_envelope(err);
    envelope.hint = hint_for(err).map(str::to_string);
    envelope
}

pub(super) fn tool_error_envelope(error: ErrorEnvelope) -> CallToolResult {
    let text = serde_json::to_string_pretty(&error)
        .unwrap_or_else(|_| format!("error: {}: {}", error.code, error.message));
    let mut result = CallToolResult::error(vec![Content::text(text)]);
    result.structured_content = Some(json!({ "error": error }));
    result
}

pub(super) fn internal_error(message: impl Into<String>) -> CallToolResult {
    tool_error_envelope(ErrorEnvelope {
        code: "internal".to_string(),
        message: message.into(),
        details: None,
        hint: None,
    })
}

/// Successful results carry the same value as pretty JSON text and as structured content.
pub(super) fn tool_success<T: Serialize>(value: &T) -> CallToolResult {
    let structured = match serde_json::to_value(value) {
        Ok(structured) => structured,
        Err(err) => return internal_error(format!("failed to serialize result: {err}")),
    };
    let text = match serde_json::to_string_pretty(&structured) {
        Ok(text) => text,
        Err(err) => return internal_error(format!("failed to serialize result: {err}")),
    };
    let mut result = CallToolResult::success(vec![Content::text(text)]);
    result.structured_content = Some(structured);
    result
}
