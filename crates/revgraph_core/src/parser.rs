//! Incremental decoding of the history stream.
//!
//! The stream is a sequence of records in the layout produced by
//! [`LOG_FORMAT`](crate::git::LOG_FORMAT): a NUL, a header whose fields are
//! separated by US and terminated by RS, then a block of file change lines.
//! Chunks may split a record anywhere, including inside a UTF-8 sequence.

use crate::commit_id::CommitId;
use crate::error::{RevError, Result};
use crate::git::{FIELD_SEP, HEADER_END, RECORD_START};
use crate::types::{Commit, FileStatus};
use tracing::{debug, warn};

/// One file line of a change block, with paths not yet interned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFileChange {
    /// Destination path.
    pub path: String,
    /// Change status.
    pub status: FileStatus,
    /// Source path of a rename or copy.
    pub source: Option<String>,
    /// Rename or copy similarity.
    pub similarity: Option<u8>,
    /// 1-based merge parent the line was diffed against.
    pub merge_parent: u8,
}

/// A commit header and the file changes that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    /// The commit.
    pub commit: Commit,
    /// File lines of the record; empty when the log carried none.
    pub files: Vec<RawFileChange>,
}

/// Streaming record decoder.
///
/// `buf` holds unconsumed bytes and always starts at a record opener once
/// the first one has been seen. `scan_offset` marks how far `buf` has
/// already been searched for the next opener, so each byte is scanned once.
#[derive(Debug, Default)]
pub struct ChunkParser {
    buf: Vec<u8>,
    scan_offset: usize,
    started: bool,
    emitted: usize,
    skipped: usize,
    noise: usize,
}

impl ChunkParser {
    /// Creates an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a chunk and returns every record it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ParsedRecord> {
        self.buf.extend_from_slice(bytes);

        if !self.started {
            match self.buf.iter().position(|b| *b == RECORD_START) {
                Some(0) => {}
                Some(pos) => {
                    self.drop_noise(pos);
                }
                None => {
                    let len = self.buf.len();
                    self.drop_noise(len);
                    return Vec::new();
                }
            }
            self.started = true;
            self.scan_offset = 1;
        }

        let mut records = Vec::new();
        let mut start = 0;
        let mut from = self.scan_offset.max(1);

        while let Some(rel) = self.buf[from..].iter().position(|b| *b == RECORD_START) {
            let end = from + rel;
            if let Some(record) = self.decode(start + 1, end) {
                records.push(record);
            }
            start = end;
            from = end + 1;
        }

        self.buf.drain(..start);
        self.scan_offset = self.buf.len();
        records
    }

    /// Ends the stream.
    ///
    /// Returns the final record when its header is complete. The parser is
    /// empty afterwards and may be reused.
    ///
    /// # Errors
    ///
    /// `RevError::ParseTruncation` when the stream stopped inside a header.
    pub fn finish(&mut self) -> Result<Option<ParsedRecord>> {
        let buf = std::mem::take(&mut self.buf);
        let started = std::mem::replace(&mut self.started, false);
        self.scan_offset = 0;

        if !started || buf.is_empty() {
            return Ok(None);
        }
        if !buf.contains(&HEADER_END) {
            warn!(bytes = buf.len(), "stream ended inside a record header");
            return Err(RevError::ParseTruncation { bytes: buf.len() });
        }

        let body = without_partial_line(&buf[1..]);
        match parse_record(body) {
            Ok(record) => {
                self.emitted += 1;
                Ok(Some(record))
            }
            Err(reason) => {
                self.skipped += 1;
                warn!(%reason, "skipping malformed record");
                Ok(None)
            }
        }
    }

    /// Drops all buffered data without reporting it.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.scan_offset = 0;
        self.started = false;
    }

    /// Records emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Malformed records skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Bytes discarded before the first record.
    pub fn noise(&self) -> usize {
        self.noise
    }

    /// Bytes held for an incomplete record.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn drop_noise(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        let preview = String::from_utf8_lossy(&self.buf[..len.min(80)]).into_owned();
        warn!(bytes = len, %preview, "discarding bytes before first record");
        self.noise += len;
        self.buf.drain(..len);
    }

    fn decode(&mut self, from: usize, to: usize) -> Option<ParsedRecord> {
        match parse_record(&self.buf[from..to]) {
            Ok(record) => {
                self.emitted += 1;
                debug!(id = %record.commit.id, files = record.files.len(), "record parsed");
                Some(record)
            }
            Err(reason) => {
                self.skipped += 1;
                warn!(%reason, "skipping malformed record");
                None
            }
        }
    }
}

/// Cuts an unterminated last line off the file block of a final record.
fn without_partial_line(body: &[u8]) -> &[u8] {
    let Some(rs) = body.iter().position(|b| *b == HEADER_END) else {
        return body;
    };
    let end = body
        .iter()
        .rposition(|b| *b == b'\n')
        .filter(|nl| *nl > rs)
        .map_or(rs + 1, |nl| nl + 1);
    let tail = &body[end..];
    if tail.iter().all(u8::is_ascii_whitespace) {
        return body;
    }
    warn!(
        bytes = tail.len(),
        line = %String::from_utf8_lossy(tail),
        "stream ended inside a file line"
    );
    &body[..end]
}

fn parse_record(bytes: &[u8]) -> std::result::Result<ParsedRecord, String> {
    let rs = bytes
        .iter()
        .position(|b| *b == HEADER_END)
        .ok_or_else(|| "record without header terminator".to_string())?;

    let header = String::from_utf8_lossy(&bytes[..rs]);
    let fields: Vec<&str> = header.splitn(6, FIELD_SEP as char).collect();
    if fields.len() < 5 {
        return Err(format!("expected 6 header fields, found {}", fields.len()));
    }

    let (boundary, hash) = split_mark(fields[0]);
    let id = CommitId::from_hex(hash).map_err(|e| e.to_string())?;
    let parents = fields[1]
        .split_whitespace()
        .map(CommitId::from_hex)
        .collect::<Result<Vec<_>>>()
        .map_err(|e| format!("{}: {}", id.short(), e))?;
    let timestamp = fields[3]
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("{}: bad timestamp: {}", id.short(), e))?;

    let mut long_log = fields.get(5).map(|b| b.trim_end().to_string()).unwrap_or_default();

    let block = String::from_utf8_lossy(&bytes[rs + 1..]);
    let (files, extra) = parse_block_lines(&block);
    if !extra.is_empty() {
        if !long_log.is_empty() {
            long_log.push('\n');
        }
        long_log.push_str(&extra.join("\n"));
    }

    Ok(ParsedRecord {
        commit: Commit {
            id,
            parents,
            author: fields[2].to_string(),
            timestamp,
            short_log: fields[4].to_string(),
            long_log,
            boundary,
            synthetic: false,
        },
        files,
    })
}

fn split_mark(field: &str) -> (bool, &str) {
    match field.chars().next() {
        Some('-') => (true, &field[1..]),
        Some(c) if "<>^=+".contains(c) => (false, &field[c.len_utf8()..]),
        _ => (false, field),
    }
}

/// Parses the output of `diff-tree`, `diff-index` or a log file block.
///
/// Lines that are neither change lines nor merge-parent headers are ignored.
pub fn parse_file_block(text: &str) -> Vec<RawFileChange> {
    parse_block_lines(text).0
}

/// Parses a newline separated list of paths as untracked files.
pub fn parse_path_list(text: &str) -> Vec<RawFileChange> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| RawFileChange {
            path: unquote_path(line),
            status: FileStatus::Untracked,
            source: None,
            similarity: None,
            merge_parent: 1,
        })
        .collect()
}

fn parse_block_lines(text: &str) -> (Vec<RawFileChange>, Vec<String>) {
    let mut files = Vec::new();
    let mut extra = Vec::new();
    let mut parent: u8 = 0;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if is_object_name(line) {
            parent = parent.saturating_add(1);
            continue;
        }
        match parse_change_line(line, parent.max(1)) {
            Some(change) => files.push(change),
            None => extra.push(line.to_string()),
        }
    }

    (files, extra)
}

fn is_object_name(line: &str) -> bool {
    let line = line.trim();
    (line.len() == 40 || line.len() == 64) && line.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parses `M\tpath`, `R087\told\tnew` or the `--raw` form
/// `:100644 100644 a1 b2 M\tpath`.
fn parse_change_line(line: &str, merge_parent: u8) -> Option<RawFileChange> {
    let (meta, paths) = line.split_once('\t')?;
    let status_token = if meta.starts_with(':') {
        meta.split_whitespace().last()?
    } else {
        meta
    };

    let mut chars = status_token.chars();
    let status = FileStatus::from_letter(chars.next()?)?;
    let score = chars.as_str();
    if !score.is_empty() && !score.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut parts = paths.split('\t');
    let first = unquote_path(parts.next()?);

    if status.has_source() {
        let dest = unquote_path(parts.next()?);
        Some(RawFileChange {
            path: dest,
            status,
            source: Some(first),
            similarity: score.parse().ok(),
            merge_parent,
        })
    } else {
        Some(RawFileChange {
            path: first,
            status,
            source: None,
            similarity: None,
            merge_parent,
        })
    }
}

/// Undoes git's C-style path quoting.
///
/// Unquoted input is returned unchanged. Octal escapes are decoded as raw
/// bytes, so multibyte UTF-8 names round trip.
pub fn unquote_path(raw: &str) -> String {
    let raw = raw.trim_end_matches(['\r', '\n']);
    let inner = match raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        Some(inner) => inner,
        None => return raw.to_string(),
    };

    let bytes = inner.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 == bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let next = bytes[i + 1];
        let octal = bytes.get(i + 1..i + 4).filter(|d| d.iter().all(|b| (b'0'..=b'7').contains(b)));
        if let Some(digits) = octal {
            let value = digits
                .iter()
                .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
            match u8::try_from(value) {
                Ok(byte) => out.push(byte),
                Err(_) => out.extend_from_slice(&bytes[i..i + 4]),
            }
            i += 4;
            continue;
        }
        out.push(match next {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'v' => 0x0b,
            other => other,
        });
        i += 2;
    }

    String::from_utf8_lossy(&out).into_owned()
}
