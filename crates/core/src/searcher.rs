use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};

use regex::{Regex, RegexBuilder};
use sos_protocol::{ContextLine, SearchMatch, SearchResult};

use crate::error::{Result, SosError};
use crate::report::Report;
use crate::sandbox;
use crate::util::decode_line;

/// Bytes kept per line when the caller does not choose a cap.
pub const DEFAULT_MAX_LINE_BYTES: usize = 4_096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub max_matches: usize,
    pub lines_before: usize,
    pub lines_after: usize,
    pub case_sensitive: bool,
    /// Treat the query as a regular expression instead of a literal substring.
    pub regex: bool,
    /// Longer lines are clipped to this many bytes before matching and in the result.
    pub max_line_bytes: usize,
}

impl SearchOptions {
    pub const fn new(max_matches: usize) -> Self {
        Self {
            max_matches,
            lines_before: 0,
            lines_after: 0,
            case_sensitive: false,
            regex: false,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    pub const fn context(mut self, lines_before: usize, lines_after: usize) -> Self {
        self.lines_before = lines_before;
        self.lines_after = lines_after;
        self
    }
}

fn build_matcher(query: &str, options: &SearchOptions) -> Result<Regex> {
    let pattern = if options.regex {
        query.to_string()
    } else {
        regex::escape(query)
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(!options.case_sensitive)
        .build()
        .map_err(|err| SosError::invalid_pattern(query, err.to_string()))
}

/// Reads one line into `buf`, keeping at most `cap` bytes and skipping the rest of an
/// overlong line. Returns `None` at EOF, otherwise whether the line was clipped.
fn read_capped_line<R: BufRead>(
    reader: &mut R,
    cap: usize,
    buf: &mut Vec<u8>,
) -> io::Result<Option<bool>> {
    buf.clear();
    let read = reader.by_ref().take(cap as u64).read_until(b'\n', buf)?;
    if read == 0 {
        return Ok(None);
    }
    if read < cap || buf.last() == Some(&b'\n') {
        return Ok(Some(false));
    }

    let mut clipped = false;
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            break;
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                clipped |= pos > 1 || (pos == 1 && available[0] != b'\r');
                reader.consume(pos + 1);
                break;
            }
            None => {
                let len = available.len();
                clipped = true;
                reader.consume(len);
            }
        }
    }
    if clipped {
        // never split a character at the cut
        if let Err(err) = std::str::from_utf8(buf) {
            if err.error_len().is_none() {
                buf.truncate(err.valid_up_to());
            }
        }
    }
    Ok(Some(clipped))
}

struct PendingAfter {
    item: usize,
    remaining: usize,
}

/// Returns the first `max_matches` matching lines of a report file, each with its context.
///
/// The scan is a single forward pass. Once the limit is reached it only continues far enough
/// to complete outstanding after-context and to find out whether another match exists.
pub fn search_file(
    report: &Report,
    path: &str,
    query: &str,
    options: &SearchOptions,
) -> Result<SearchResult> {
    let resolved = sandbox::resolve(report.root(), path)?;
    let canonical = resolved.canonical();
    let meta = std::fs::metadata(canonical).map_err(|err| SosError::io(canonical, err))?;
    if !meta.is_file() {
        return Err(SosError::NotAFile {
            path: resolved.relative().to_string(),
        });
    }
    let matcher = build_matcher(query, options)?;

    let file = File::open(canonical).map_err(|err| SosError::io(canonical, err))?;
    let mut reader = BufReader::new(file);
    let mut raw = Vec::new();
    let mut line_number = 0usize;
    let mut before: VecDeque<ContextLine> = VecDeque::with_capacity(options.lines_before);
    let mut pending: Vec<PendingAfter> = Vec::new();
    let mut items: Vec<SearchMatch> = Vec::new();
    let mut truncated = false;

    let line_cap = options.max_line_bytes.max(1);

    loop {
        let Some(line_truncated) = read_capped_line(&mut reader, line_cap, &mut raw)
            .map_err(|err| SosError::io(canonical, err))?
        else {
            break;
        };
        line_number += 1;
        let line = decode_line(&raw);

        for waiting in &mut pending {
            items[waiting.item].context_after.push(ContextLine {
                line_number,
                line: line.clone(),
                line_truncated,
            });
            waiting.remaining -= 1;
        }
        pending.retain(|waiting| waiting.remaining > 0);

        if matcher.is_match(&line) {
            if items.len() >= options.max_matches {
                truncated = true;
                break;
            }
            if options.lines_after > 0 {
                pending.push(PendingAfter {
                    item: items.len(),
                    remaining: options.lines_after,
                });
            }
            items.push(SearchMatch {
                line_number,
                line: line.clone(),
                line_truncated,
                context_before: before.iter().cloned().collect(),
                context_after: Vec::new(),
            });
        }

        if options.lines_before > 0 {
            if before.len() == options.lines_before {
                before.pop_front();
            }
            before.push_back(ContextLine {
                line_number,
                line,
                line_truncated,
            });
        }
    }

    log::debug!(
        "search '{query}' in {}: {} matches, truncated={truncated}",
        resolved.relative(),
        items.len()
    );

    Ok(SearchResult {
        report: report.id().to_string(),
        path: resolved.relative().to_string(),
        query: query.to_string(),
        items,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    const MESSAGES: &str = "\
Jan 1 boot ok
Jan 1 disk ERROR sda
Jan 1 net up
Jan 1 kernel: error in module
Jan 1 idle
Jan 1 error again\r
Jan 1 final error
";

    fn fixture() -> (tempfile::TempDir, Report) {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("var/log")).unwrap();
        fs::write(tmp.path().join("var/log/messages"), MESSAGES).unwrap();
        let report = Report::open("r1", tmp.path()).unwrap();
        (tmp, report)
    }

    fn line_numbers(result: &SearchResult) -> Vec<usize> {
        result.items.iter().map(|m| m.line_number).collect()
    }

    #[test]
    fn case_insensitive_by_default_and_truncates() {
        let (_tmp, report) = fixture();
        let options = SearchOptions::new(3).context(1, 1);
        let result = search_file(&report, "var/log/messages", "error", &options).unwrap();
        assert_eq!(line_numbers(&result), vec![2, 4, 6]);
        assert!(result.truncated);
        assert_eq!(result.items[2].line, "Jan 1 error again");
        assert_eq!(
            result.items[0].context_before,
            vec![ContextLine {
                line_number: 1,
                line: "Jan 1 boot ok".to_string(),
                line_truncated: false,
            }]
        );
        assert_eq!(result.items[2].context_after[0].line_number, 7);
    }

    #[test]
    fn context_is_clipped_at_file_edges() {
        let (_tmp, report) = fixture();
        let options = SearchOptions::new(10).context(5, 5);
        let result = search_file(&report, "var/log/messages", "boot", &options).unwrap();
        assert!(result.items[0].context_before.is_empty());
        assert_eq!(result.items[0].context_after.len(), 5);

        let result = search_file(&report, "var/log/messages", "final", &options).unwrap();
        assert_eq!(result.items[0].context_before.len(), 5);
        assert!(result.items[0].context_after.is_empty());
        assert!(!result.truncated);
    }

    #[test]
    fn exactly_max_matches_is_not_truncated() {
        let (_tmp, report) = fixture();
        let result =
            search_file(&report, "var/log/messages", "error", &SearchOptions::new(4)).unwrap();
        assert_eq!(line_numbers(&result), vec![2, 4, 6, 7]);
        assert!(!result.truncated);
    }

    #[test]
    fn case_sensitive_and_regex_modes() {
        let (_tmp, report) = fixture();
        let mut options = SearchOptions::new(50);
        options.case_sensitive = true;
        let result = search_file(&report, "var/log/messages", "ERROR", &options).unwrap();
        assert_eq!(line_numbers(&result), vec![2]);

        let mut options = SearchOptions::new(50);
        options.regex = true;
        let result = search_file(&report, "var/log/messages", r"^jan 1 (net|idle)", &options).unwrap();
        assert_eq!(line_numbers(&result), vec![3, 5]);

        let err = search_file(&report, "var/log/messages", "(", &options).unwrap_err();
        assert_eq!(err.code(), "invalid_pattern");
    }

    #[test]
    fn literal_queries_are_not_regexes() {
        let (_tmp, report) = fixture();
        let result =
            search_file(&report, "var/log/messages", "kernel:", &SearchOptions::new(5)).unwrap();
        assert_eq!(line_numbers(&result), vec![4]);
        let result = search_file(&report, "var/log/messages", ".*", &SearchOptions::new(5)).unwrap();
        assert!(result.items.is_empty());
    }

    #[test]
    fn overlong_lines_are_clipped_to_the_line_cap() {
        let tmp = tempfile::tempdir().unwrap();
        let mut huge = "x".repeat(5 * 1024 * 1024);
        huge.push_str(" error");
        let body = format!("error at start {huge}\nnext line\n\u{e9}\u{e9}\u{e9} error\n");
        fs::write(tmp.path().join("big.log"), body).unwrap();
        let report = Report::open("r1", tmp.path()).unwrap();

        let mut options = SearchOptions::new(5).context(0, 1);
        options.max_line_bytes = 64;
        let result = search_file(&report, "big.log", "error", &options).unwrap();
        assert_eq!(line_numbers(&result), vec![1, 3]);
        let first = &result.items[0];
        assert!(first.line_truncated);
        assert_eq!(first.line.len(), 64);
        assert!(first.line.starts_with("error at start xxx"));
        assert_eq!(first.context_after[0].line, "next line");
        assert!(!first.context_after[0].line_truncated);
        assert!(!result.items[1].line_truncated);

        // a cut inside a multi-byte character drops the partial character
        options.max_line_bytes = 3;
        let result = search_file(&report, "big.log", "\u{e9}", &options).unwrap();
        assert_eq!(result.items[0].line, "\u{e9}");
        assert!(result.items[0].line_truncated);
    }

    #[test]
    fn zero_matches_is_an_empty_result() {
        let (_tmp, report) = fixture();
        let result =
            search_file(&report, "var/log/messages", "panic", &SearchOptions::new(5)).unwrap();
        assert!(result.items.is_empty());
        assert!(!result.truncated);
    }

    #[test]
    fn rejects_directories_and_escapes() {
        let (_tmp, report) = fixture();
        let options = SearchOptions::new(5);
        assert_eq!(
            search_file(&report, "var/log", "x", &options).unwrap_err().code(),
            "not_a_file"
        );
        assert_eq!(
            search_file(&report, "../../etc/passwd", "root", &options)
                .unwrap_err()
                .code(),
            "out_of_bounds"
        );
    }
}
