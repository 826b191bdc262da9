//! Identity metadata extracted from a report's own files.
//!
//! Everything here is best effort: unreadable or absent files yield `None`, and the report id
//! falls back to `unknown` components instead of failing discovery.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SosError;
use crate::sandbox;

const MAX_METADATA_BYTES: u64 = 4 * 1024 * 1024;

const HOSTNAME_FILES: [&str; 3] = ["etc/hostname", "hostname", "sos_commands/general/hostname"];
const DMIDECODE_FILES: [&str; 2] = ["sos_commands/hardware/dmidecode", "dmidecode"];

/// Layout of `date` output, used when only the directory mtime is left.
const UNIX_DATE_FORMAT: &str = "%a %b %e %H:%M:%S UTC %Y";

static DIGIT_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").unwrap_or_else(|_| unreachable!()));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportMetadata {
    pub hostname: Option<String>,
    pub serial_number: Option<String>,
    pub uuid: Option<String>,
    pub creation_date: Option<String>,
}

impl ReportMetadata {
    /// Reads identity files under `root`. Candidates that resolve outside the report
    /// (through `..` or a symlink) are ignored like absent ones.
    pub fn extract(root: &Path) -> Self {
        let root = match root.canonicalize() {
            Ok(root) => root,
            Err(err) => {
                log::warn!("cannot resolve report root {}: {err}", root.display());
                return Self::default();
            }
        };

        let dmidecode = first_readable(&root, &DMIDECODE_FILES);
        Self {
            hostname: first_readable(&root, &HOSTNAME_FILES)
                .map(|text| text.trim().to_string())
                .filter(|host| !host.is_empty()),
            serial_number: dmidecode
                .as_deref()
                .and_then(|text| system_information_field(text, "Serial Number")),
            uuid: dmidecode
                .as_deref()
                .and_then(|text| system_information_field(text, "UUID")),
            creation_date: creation_date(&root),
        }
    }

    /// `<sanitized-hostname>_<YYYYMMDD_HHMM>`.
    pub fn report_id(&self) -> String {
        format!(
            "{}_{}",
            sanitize_hostname(self.hostname.as_deref().unwrap_or_default()),
            format_compact_date(self.creation_date.as_deref().unwrap_or_default())
        )
    }
}

/// Reads a report file through the sandbox. `root` must be canonical.
fn read_text(root: &Path, rel: &str) -> Option<String> {
    let resolved = match sandbox::resolve(root, rel) {
        Ok(resolved) => resolved,
        Err(err @ SosError::OutOfBounds { .. }) => {
            log::warn!("metadata file {rel} rejected: {err}");
            return None;
        }
        Err(err) => {
            log::trace!("metadata file {rel} not usable: {err}");
            return None;
        }
    };
    if !resolved.canonical().is_file() {
        return None;
    }

    let file = match File::open(resolved.canonical()) {
        Ok(file) => file,
        Err(err) => {
            log::warn!("unreadable report metadata {}: {err}", resolved.display());
            return None;
        }
    };
    let mut buf = Vec::new();
    if let Err(err) = file.take(MAX_METADATA_BYTES).read_to_end(&mut buf) {
        log::warn!("unreadable report metadata {}: {err}", resolved.display());
        return None;
    }
    let text = String::from_utf8_lossy(&buf).into_owned();
    (!text.trim().is_empty()).then_some(text)
}

fn first_readable(root: &Path, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|rel| read_text(root, rel))
}

/// Reads `field` from the `System Information` section of dmidecode output.
fn system_information_field(dmidecode: &str, field: &str) -> Option<String> {
    let needle = format!("{field}:");
    let mut in_section = false;
    for line in dmidecode.lines() {
        if line.contains("System Information") {
            in_section = true;
            continue;
        }
        if !in_section || line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(['\t', ' ']) {
            break;
        }
        if let Some((_, value)) = line.split_once(&needle) {
            let value = value.trim();
            return (!value.is_empty() && value != "Not Specified").then(|| value.to_string());
        }
    }
    None
}

fn creation_date(root: &Path) -> Option<String> {
    if let Some(text) = read_text(root, "sos_commands/date/date_--utc") {
        return Some(text.trim().to_string());
    }

    if let Some(text) = read_text(root, "manifest.json") {
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(manifest) => {
                if let Some(start) = manifest.get("start") {
                    return Some(match start {
                        serde_json::Value::String(value) => value.clone(),
                        other => other.to_string(),
                    });
                }
            }
            Err(err) => log::warn!("malformed manifest.json in {}: {err}", root.display()),
        }
    }

    if let Some(text) = read_text(root, "date") {
        let local = text
            .lines()
            .find_map(|line| line.split_once("Local time:").map(|(_, v)| v.trim()));
        let first = text.lines().map(str::trim).find(|line| !line.is_empty());
        if let Some(value) = local.or(first) {
            return Some(value.to_string());
        }
    }

    if let Some(text) = read_text(root, "sos_commands/general/date") {
        return Some(text.trim().to_string());
    }

    directory_mtime(root)
}

fn directory_mtime(root: &Path) -> Option<String> {
    match fs::metadata(root).and_then(|meta| meta.modified()) {
        Ok(modified) => {
            let modified: DateTime<Utc> = modified.into();
            log::debug!("no capture date in {}, using its mtime", root.display());
            Some(modified.format(UNIX_DATE_FORMAT).to_string())
        }
        Err(err) => {
            log::warn!("no capture date or mtime for {}: {err}", root.display());
            None
        }
    }
}

pub(crate) fn sanitize_hostname(hostname: &str) -> String {
    let kept: String = hostname
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' { '-' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect();
    let collapsed = kept
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if collapsed.is_empty() {
        "unknown".to_string()
    } else {
        collapsed
    }
}

fn parse_iso(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
}

/// `date` output such as `Mon Dec  9 14:30:15 UTC 2025`. The weekday and zone are ignored.
fn parse_unix_date(raw: &str) -> Option<NaiveDateTime> {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    if parts.len() < 5 {
        return None;
    }
    let candidate = format!(
        "{} {} {} {}",
        parts[1],
        parts[2],
        parts[3],
        parts[parts.len() - 1]
    );
    ["%b %d %H:%M:%S %Y", "%b %d %H:%M %Y"]
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(&candidate, layout).ok())
}

/// First three numbers read as year, month and day.
fn parse_leading_numbers(raw: &str) -> Option<NaiveDate> {
    let mut numbers = DIGIT_RUNS
        .find_iter(raw)
        .map(|run| run.as_str().parse::<u32>().ok());
    let year = i32::try_from(numbers.next()??).ok()?;
    let month = numbers.next()??;
    let day = numbers.next()??;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Formats a capture date as `YYYYMMDD_HHMM`, or `unknown`.
///
/// ISO-8601 timestamps keep their own wall-clock time, `date` output is read positionally, and
/// anything else contributes its first three numbers as a date at `0000`.
pub(crate) fn format_compact_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return "unknown".to_string();
    }
    if let Some(stamp) = parse_iso(raw).or_else(|| parse_unix_date(raw)) {
        return stamp.format("%Y%m%d_%H%M").to_string();
    }
    match parse_leading_numbers(raw) {
        Some(date) => date.format("%Y%m%d_0000").to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    const DMIDECODE: &str = "\
# dmidecode 3.3
Handle 0x0001, DMI type 1, 27 bytes
System Information
\tManufacturer: Example Corp
\tProduct Name: Server 9000
\tSerial Number: SN-12345
\tUUID: 4c4c4544-0042-3510-8052-b4c04f4e4e32

Handle 0x0002, DMI type 2, 15 bytes
Base Board Information
\tSerial Number: BOARD-1
";

    #[test]
    fn sanitizes_hostnames() {
        assert_eq!(sanitize_hostname("Web01.Example.COM"), "web01examplecom");
        assert_eq!(sanitize_hostname("  my  host--name "), "my-host-name");
        assert_eq!(sanitize_hostname("..."), "unknown");
        assert_eq!(sanitize_hostname(""), "unknown");
    }

    #[test]
    fn formats_capture_dates() {
        assert_eq!(format_compact_date("Mon Dec  9 14:30:15 UTC 2025"), "20251209_1430");
        assert_eq!(format_compact_date("2025-12-09T14:30:15Z"), "20251209_1430");
        assert_eq!(format_compact_date("2025-12-09T04:05:00+02:00"), "20251209_0405");
        assert_eq!(format_compact_date("Sat Nov  1 08:05 CET 2025"), "20251101_0805");
        assert_eq!(format_compact_date("2025-12-09 14:30:15.123456"), "20251209_1430");
        assert_eq!(format_compact_date("2025/1/2"), "20250102_0000");
        assert_eq!(format_compact_date("Tue 2025-03-04 05:06:07 UTC"), "20250304_0000");
        assert_eq!(format_compact_date("2025/13/40"), "unknown");
        assert_eq!(format_compact_date("yesterday"), "unknown");
        assert_eq!(format_compact_date(""), "unknown");
    }

    #[test]
    fn reads_system_information_only() {
        assert_eq!(
            system_information_field(DMIDECODE, "Serial Number").as_deref(),
            Some("SN-12345")
        );
        assert_eq!(
            system_information_field(DMIDECODE, "UUID").as_deref(),
            Some("4c4c4544-0042-3510-8052-b4c04f4e4e32")
        );
        let unspecified = DMIDECODE.replace("SN-12345", "Not Specified");
        assert_eq!(system_information_field(&unspecified, "Serial Number"), None);
    }

    #[test]
    fn extracts_metadata_with_fallbacks() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("sos_commands/general")).unwrap();
        fs::write(root.join("sos_commands/general/hostname"), "db02\n").unwrap();
        fs::write(root.join("dmidecode"), DMIDECODE).unwrap();
        fs::write(
            root.join("date"),
            "      Local time: Tue 2025-03-04 05:06:07 UTC\n  Universal time: x\n",
        )
        .unwrap();

        let meta = ReportMetadata::extract(root);
        assert_eq!(meta.hostname.as_deref(), Some("db02"));
        assert_eq!(meta.serial_number.as_deref(), Some("SN-12345"));
        assert_eq!(
            meta.creation_date.as_deref(),
            Some("Tue 2025-03-04 05:06:07 UTC")
        );
        assert_eq!(meta.report_id(), "db02_20250304_0000");
    }

    #[test]
    fn manifest_start_is_used_when_date_utc_is_absent() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("etc")).unwrap();
        fs::write(tmp.path().join("etc/hostname"), "web01\n").unwrap();
        fs::write(
            tmp.path().join("manifest.json"),
            r#"{"start": "2025-12-09T14:30:15Z"}"#,
        )
        .unwrap();
        let meta = ReportMetadata::extract(tmp.path());
        assert_eq!(meta.report_id(), "web01_20251209_1430");
        assert_eq!(meta.uuid, None);
    }

    #[test]
    fn empty_report_falls_back_to_directory_mtime() {
        let tmp = tempfile::tempdir().unwrap();
        let meta = ReportMetadata::extract(tmp.path());
        assert_eq!(meta.hostname, None);
        assert_eq!(meta.serial_number, None);

        let modified: DateTime<Utc> = fs::metadata(tmp.path()).unwrap().modified().unwrap().into();
        assert_eq!(
            meta.creation_date,
            Some(modified.format(UNIX_DATE_FORMAT).to_string())
        );
        assert_eq!(
            meta.report_id(),
            format!("unknown_{}", modified.format("%Y%m%d_%H%M"))
        );
    }

    #[test]
    fn missing_root_gets_unknown_id() {
        let tmp = tempfile::tempdir().unwrap();
        let meta = ReportMetadata::extract(&tmp.path().join("gone"));
        assert_eq!(meta, ReportMetadata::default());
        assert_eq!(meta.report_id(), "unknown_unknown");
    }

    #[cfg(unix)]
    #[test]
    fn identity_files_outside_the_report_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("hostname"), "intruder\n").unwrap();
        fs::write(outside.join("dmidecode"), DMIDECODE).unwrap();

        let root = tmp.path().join("report");
        fs::create_dir_all(root.join("etc")).unwrap();
        fs::create_dir_all(root.join("sos_commands/general")).unwrap();
        std::os::unix::fs::symlink(outside.join("hostname"), root.join("etc/hostname")).unwrap();
        std::os::unix::fs::symlink(outside.join("dmidecode"), root.join("dmidecode")).unwrap();
        fs::write(root.join("sos_commands/general/hostname"), "db03\n").unwrap();
        // symlinks that stay inside the report are followed
        std::os::unix::fs::symlink("sos_commands/general/hostname", root.join("hostname"))
            .unwrap();

        let meta = ReportMetadata::extract(&root);
        assert_eq!(meta.hostname.as_deref(), Some("db03"));
        assert_eq!(meta.serial_number, None);
        assert_eq!(meta.uuid, None);
    }
}
