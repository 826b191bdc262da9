use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use sos_protocol::FileReadResult;

use crate::error::{Result, SosError};
use crate::report::Report;
use crate::sandbox;
use crate::util::sha256_hex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Byte offset to start from.
    pub offset: u64,
    /// Maximum number of bytes to consume.
    pub limit: u64,
    /// Fail with [`SosError::Decode`] instead of substituting invalid UTF-8.
    pub strict: bool,
}

impl ReadOptions {
    pub const fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit,
            strict: false,
        }
    }

    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Length of an unfinished UTF-8 sequence at the end of `buf` (0 when the tail is complete or
/// not valid UTF-8 anyway).
fn incomplete_utf8_tail(buf: &[u8]) -> usize {
    for back in 1..=buf.len().min(4) {
        let byte = buf[buf.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return 0,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

/// Reads the byte window `[offset, offset + limit)` of a report file as text.
///
/// When the window would end inside a multi-byte character (and more of the file follows), the
/// window is shortened so `next_offset` lands on a character boundary.
pub fn read_file(report: &Report, path: &str, options: ReadOptions) -> Result<FileReadResult> {
    let resolved = sandbox::resolve(report.root(), path)?;
    let canonical = resolved.canonical();
    let meta = std::fs::metadata(canonical).map_err(|err| SosError::io(canonical, err))?;
    if !meta.is_file() {
        return Err(SosError::NotAFile {
            path: resolved.relative().to_string(),
        });
    }

    let total_size = meta.len();
    let start = options.offset.min(total_size);

    let mut file = File::open(canonical).map_err(|err| SosError::io(canonical, err))?;
    file.seek(SeekFrom::Start(start))
        .map_err(|err| SosError::io(canonical, err))?;
    let mut buf = Vec::new();
    file.take(options.limit)
        .read_to_end(&mut buf)
        .map_err(|err| SosError::io(canonical, err))?;

    let reached_end = start.saturating_add(buf.len() as u64) >= total_size;
    if !reached_end {
        let tail = incomplete_utf8_tail(&buf);
        if tail > 0 && tail < buf.len() {
            buf.truncate(buf.len() - tail);
        }
    }

    let returned = buf.len() as u64;
    let next_offset = start.saturating_add(returned);
    let (content, lossy) = match String::from_utf8(buf) {
        Ok(text) => (text, false),
        Err(err) if options.strict => {
            return Err(SosError::Decode {
                path: resolved.relative().to_string(),
                offset: start.saturating_add(err.utf8_error().valid_up_to() as u64),
            });
        }
        Err(err) => (String::from_utf8_lossy(err.as_bytes()).into_owned(), true),
    };

    Ok(FileReadResult {
        report: report.id().to_string(),
        path: resolved.relative().to_string(),
        offset: options.offset,
        limit: options.limit,
        next_offset,
        eof: next_offset >= total_size,
        total_size,
        returned,
        lossy,
        content_sha256: sha256_hex(&content),
        content,
    })
}
