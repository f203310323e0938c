//! Single-pass streaming file scanner.
//!
//! A file is consumed as a sequence of byte chunks. Each chunk feeds the
//! content hash, the size counter, the head/tail samples, and an incremental
//! UTF-8 decoder whose output is split into lines and classified. The file is
//! never held in memory as a whole, and chunk boundaries cannot change any
//! output: hash, fingerprint, line count, and every per-line match are the
//! same for any chunking of the same bytes.

#![allow(missing_docs)]

use std::fmt::Write as _;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::core::errors::{AuditError, Result};
use crate::core::paths::normalize_relative_path;
use crate::scanner::patterns::LinePatternRegistry;

/// Bytes kept at each end of a file for the duplicate fingerprint.
pub const SAMPLE_BYTES: usize = 128;

/// Default read size.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Size plus head/tail samples; a secondary duplicate check after a hash match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub size_bytes: u64,
    pub head_sample: Vec<u8>,
    pub tail_sample: Vec<u8>,
}

impl Fingerprint {
    /// SHA-256 over `size:hex(head):hex(tail)`, hex encoded.
    #[must_use]
    pub fn signature(&self) -> String {
        let material = format!(
            "{}:{}:{}",
            self.size_bytes,
            hex(&self.head_sample),
            hex(&self.tail_sample)
        );
        hex(&Sha256::digest(material.as_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentedLine {
    pub line: usize,
    /// Trimmed line text.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyMatch {
    pub line: usize,
    pub pattern: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportMatch {
    pub line: usize,
    pub symbol: String,
}

/// Per-file scan output. Produced once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub relative_path: String,
    pub line_count: usize,
    pub commented_lines: Vec<CommentedLine>,
    pub legacy_matches: Vec<LegacyMatch>,
    pub export_matches: Vec<ExportMatch>,
    /// Hex SHA-256 of the file content.
    pub hash: String,
    pub fingerprint: Option<Fingerprint>,
}

/// A file that could not be read to the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub relative_path: String,
    pub error: String,
}

/// Outcome of scanning one file. Failures are values, not errors, so one bad
/// file never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Scanned(ScanResult),
    Failed(ScanFailure),
}

impl ScanOutcome {
    #[must_use]
    pub fn relative_path(&self) -> &str {
        match self {
            Self::Scanned(result) => &result.relative_path,
            Self::Failed(failure) => &failure.relative_path,
        }
    }
}

// ---------------------------------------------------------------------------
// Incremental UTF-8 decoding
// ---------------------------------------------------------------------------

/// Stateful UTF-8 decoder.
///
/// Holds back a trailing incomplete multi-byte sequence until the next chunk
/// arrives. Invalid sequences become U+FFFD exactly as
/// `String::from_utf8_lossy` would replace them in the unchunked input.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, appending complete characters to `out`.
    pub fn decode(&mut self, chunk: &[u8], out: &mut String) {
        if self.pending.is_empty() {
            self.decode_bytes(chunk, out);
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            self.decode_bytes(&joined, out);
        }
    }

    /// Flush at end of stream; an unfinished sequence becomes one U+FFFD.
    pub fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            self.pending.clear();
            out.push(char::REPLACEMENT_CHARACTER);
        }
    }

    fn decode_bytes(&mut self, mut bytes: &[u8], out: &mut String) {
        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    out.push_str(text);
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&bytes[..valid]));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            bytes = &bytes[valid + bad..];
                        }
                        None => {
                            self.pending.extend_from_slice(&bytes[valid..]);
                            return;
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scan state
// ---------------------------------------------------------------------------

/// Incremental per-file scan state. Feed chunks in order, then `finish`.
pub struct FileScanState<'a> {
    patterns: &'a LinePatternRegistry,
    relative_path: String,
    hasher: Sha256,
    size_bytes: u64,
    head: Vec<u8>,
    tail: Vec<u8>,
    decoder: Utf8StreamDecoder,
    /// Decoded text not yet terminated by `\n`.
    carry: String,
    line_count: usize,
    commented_lines: Vec<CommentedLine>,
    legacy_matches: Vec<LegacyMatch>,
    export_matches: Vec<ExportMatch>,
}

impl<'a> FileScanState<'a> {
    pub fn new(patterns: &'a LinePatternRegistry, relative_path: impl Into<String>) -> Self {
        Self {
            patterns,
            relative_path: relative_path.into(),
            hasher: Sha256::new(),
            size_bytes: 0,
            head: Vec::with_capacity(SAMPLE_BYTES),
            tail: Vec::with_capacity(SAMPLE_BYTES),
            decoder: Utf8StreamDecoder::new(),
            carry: String::new(),
            line_count: 0,
            commented_lines: Vec::new(),
            legacy_matches: Vec::new(),
            export_matches: Vec::new(),
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.hasher.update(chunk);
        self.size_bytes += chunk.len() as u64;
        self.push_samples(chunk);

        let mut decoded = std::mem::take(&mut self.carry);
        self.decoder.decode(chunk, &mut decoded);
        self.carry = self.drain_complete_lines(decoded);
    }

    pub fn finish(mut self) -> ScanResult {
        let mut rest = std::mem::take(&mut self.carry);
        self.decoder.finish(&mut rest);
        let rest = self.drain_complete_lines(rest);
        // A trailing newline terminates the last line; only a non-empty
        // fragment counts as one more.
        if !rest.is_empty() {
            self.classify_line(&rest);
        }

        let hash = hex(&self.hasher.finalize());
        ScanResult {
            relative_path: self.relative_path,
            line_count: self.line_count,
            commented_lines: self.commented_lines,
            legacy_matches: self.legacy_matches,
            export_matches: self.export_matches,
            hash,
            fingerprint: Some(Fingerprint {
                size_bytes: self.size_bytes,
                head_sample: self.head,
                tail_sample: self.tail,
            }),
        }
    }

    /// Classify every `\n`-terminated line in `text`; return the remainder.
    fn drain_complete_lines(&mut self, text: String) -> String {
        let mut start = 0;
        for newline in memchr::memchr_iter(b'\n', text.as_bytes()) {
            self.classify_line(&text[start..newline]);
            start = newline + 1;
        }
        if start == 0 {
            text
        } else {
            text[start..].to_string()
        }
    }

    fn classify_line(&mut self, raw: &str) {
        self.line_count += 1;
        let line_no = self.line_count;
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        let signals = self.patterns.classify(line);
        if signals.commented_code {
            self.commented_lines.push(CommentedLine {
                line: line_no,
                text: line.trim().to_string(),
            });
        }
        self.legacy_matches
            .extend(signals.legacy.into_iter().map(|pattern| LegacyMatch {
                line: line_no,
                pattern,
            }));
        self.export_matches
            .extend(signals.exports.into_iter().map(|symbol| ExportMatch {
                line: line_no,
                symbol,
            }));
    }

    fn push_samples(&mut self, chunk: &[u8]) {
        if self.head.len() < SAMPLE_BYTES {
            let take = (SAMPLE_BYTES - self.head.len()).min(chunk.len());
            self.head.extend_from_slice(&chunk[..take]);
        }

        if chunk.len() >= SAMPLE_BYTES {
            self.tail.clear();
            self.tail.extend_from_slice(&chunk[chunk.len() - SAMPLE_BYTES..]);
        } else {
            self.tail.extend_from_slice(chunk);
            if self.tail.len() > SAMPLE_BYTES {
                let excess = self.tail.len() - SAMPLE_BYTES;
                self.tail.drain(..excess);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Streams files through [`FileScanState`] with a fixed chunk size.
#[derive(Clone, Copy)]
pub struct StreamingScanner<'a> {
    patterns: &'a LinePatternRegistry,
    chunk_size: usize,
}

impl<'a> StreamingScanner<'a> {
    pub fn new(patterns: &'a LinePatternRegistry, chunk_size: usize) -> Self {
        Self {
            patterns,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Scan one file under `root`. IO failures become [`ScanOutcome::Failed`].
    pub fn scan_file(&self, root: &Path, path: &Path) -> ScanOutcome {
        let relative_path = normalize_relative_path(root, path);
        let result = File::open(path)
            .map_err(|source| AuditError::io(path, source))
            .and_then(|file| self.scan_reader(relative_path.clone(), file));
        match result {
            Ok(scanned) => ScanOutcome::Scanned(scanned),
            Err(err) => ScanOutcome::Failed(ScanFailure {
                relative_path,
                error: err.to_string(),
            }),
        }
    }

    /// Scan any reader as if it were a file at `relative_path`.
    pub fn scan_reader<R: Read>(&self, relative_path: String, mut reader: R) -> Result<ScanResult> {
        let mut state = FileScanState::new(self.patterns, relative_path);
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => state.feed(&buf[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    return Err(AuditError::Scan {
                        path: state.relative_path.clone().into(),
                        details: err.to_string(),
                    });
                }
            }
        }
        Ok(state.finish())
    }
}

/// Lower-case hex encoding.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
}
