//! Recovery scanner for the carrier registry.
//!
//! The registry is nominally one JSON array of objects, but framing is not
//! trustworthy: objects may span lines, share a line, be truncated, or carry
//! doubled quotes. The scanner accumulates lines into a fragment buffer and,
//! whenever the buffer (minus trailing separators) ends with `}`, tries to
//! decode it. Decode failures never escape: the fragment is repaired,
//! resynchronised on object-start lines, or counted as skipped.
//!
//! Memory stays bounded by one fragment (capped by `max_fragment_bytes`)
//! plus the few records a single fragment can yield.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_json::Value;

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::model::CarrierRecord;
use crate::normalize::present;

/// Recovery counters. Advisory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub lines: u64,
    pub recovered: u64,
    pub skipped: u64,
}

/// Lazy, single-pass sequence of recovered carrier records.
///
/// Yields `Err` only for read failures, after which the sequence ends.
pub struct RecoveryScanner<R> {
    reader: R,
    source: PathBuf,
    dot_field: String,
    docket_fields: Vec<String>,
    progress_every: u64,
    max_fragment_bytes: usize,
    buffer: String,
    /// Buffer offsets of appended lines that open a new object.
    starts: Vec<usize>,
    line: Vec<u8>,
    pending: VecDeque<CarrierRecord>,
    stats: ScanStats,
    done: bool,
}

impl RecoveryScanner<BufReader<File>> {
    pub fn open(path: &Path, config: &LinkConfig) -> Result<Self, LinkError> {
        let file = File::open(path).map_err(|e| LinkError::missing(path, e))?;
        let mut scanner = Self::new(BufReader::with_capacity(1 << 16, file), config);
        scanner.source = path.to_path_buf();
        Ok(scanner)
    }
}

impl<R: BufRead> RecoveryScanner<R> {
    pub fn new(reader: R, config: &LinkConfig) -> Self {
        Self {
            reader,
            source: PathBuf::from("<carriers>"),
            dot_field: config.carriers.dot_field.clone(),
            docket_fields: config.carriers.docket_fields.iter().take(3).cloned().collect(),
            progress_every: config.carriers.progress_every,
            max_fragment_bytes: config.carriers.max_fragment_bytes,
            buffer: String::new(),
            starts: Vec::new(),
            line: Vec::new(),
            pending: VecDeque::new(),
            stats: ScanStats::default(),
            done: false,
        }
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    fn push_line(&mut self) {
        let raw = std::mem::take(&mut self.line);
        {
            let text = crate::text::decode(&raw);
            let mut line = text.trim();

            if !(line.is_empty() || line == "[" || line == "]") {
                if self.buffer.is_empty() {
                    line = strip_array_edges(line);
                }
                if line.starts_with('{') {
                    self.starts.push(self.buffer.len());
                }
                self.buffer.push_str(line);
                self.buffer.push('\n');
                self.at_line_end();
            }
        }
        self.line = raw;
    }

    fn at_line_end(&mut self) {
        if self.buffer.len() > self.max_fragment_bytes {
            warn!(
                "{}: fragment exceeded {} bytes at line {}, resynchronising",
                self.source.display(),
                self.max_fragment_bytes,
                self.stats.lines
            );
            self.release_head();
            if self.buffer.len() > self.max_fragment_bytes {
                self.resync();
                return;
            }
        }

        let candidate = trim_separators(&self.buffer);
        if !candidate.ends_with('}') {
            return;
        }
        match attempt(candidate) {
            Attempt::Parsed(value) => {
                self.buffer.clear();
                self.starts.clear();
                self.accept(value);
            }
            // nested object closed on this line; the record continues
            Attempt::Incomplete => {}
            Attempt::Failed => self.resync(),
        }
    }

    /// Split the buffer on object-start lines and salvage each segment.
    fn resync(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        let starts = std::mem::take(&mut self.starts);
        self.salvage_segments(&buffer, &starts);
    }

    /// Salvage every segment before the last object-start line. The object
    /// opened there may still be arriving, so it stays as the new fragment.
    fn release_head(&mut self) {
        let tail = match self.starts.last() {
            Some(&start) if start > 0 => start,
            _ => return,
        };
        let rest = self.buffer.split_off(tail);
        let head = std::mem::replace(&mut self.buffer, rest);
        let mut starts = std::mem::take(&mut self.starts);
        starts.pop();
        self.starts.push(0);
        self.salvage_segments(&head, &starts);
    }

    fn salvage_segments(&mut self, buffer: &str, starts: &[usize]) {
        let mut cuts: Vec<usize> = starts.iter().copied().filter(|&s| s > 0).collect();
        cuts.push(buffer.len());
        let mut from = 0;
        for to in cuts {
            let segment = trim_separators(&buffer[from..to]);
            if !segment.is_empty() {
                self.salvage(segment);
            }
            from = to;
        }
    }

    /// Recover what can be recovered from one segment. Exactly one fragment
    /// is counted as skipped for each span that cannot be decoded.
    fn salvage(&mut self, segment: &str) {
        if let Attempt::Parsed(value) = attempt(segment) {
            self.accept(value);
            return;
        }

        let spans = top_level_objects(segment);
        if spans.is_empty() || spans == [segment] {
            self.skip(segment);
            return;
        }
        for span in spans {
            match attempt(span) {
                Attempt::Parsed(value) => self.accept(value),
                _ => self.skip(span),
            }
        }
    }

    fn accept(&mut self, value: Value) {
        let Value::Object(fields) = value else {
            self.skip("<non-object value>");
            return;
        };

        let dot_number = identifier(fields.get(&self.dot_field));
        let mut dockets: [Option<String>; 3] = [None, None, None];
        for (slot, name) in dockets.iter_mut().zip(&self.docket_fields) {
            *slot = identifier(fields.get(name));
        }

        self.stats.recovered += 1;
        self.pending.push_back(CarrierRecord { dot_number, dockets, fields });
    }

    fn skip(&mut self, fragment: &str) {
        self.stats.skipped += 1;
        let preview: String = fragment.chars().take(80).collect();
        warn!(
            "{}: skipped malformed fragment before line {}: {}",
            self.source.display(),
            self.stats.lines,
            preview.replace('\n', " ")
        );
    }

    fn finish(&mut self) {
        if !trim_separators(&self.buffer).is_empty() {
            self.resync();
        }
        self.buffer.clear();
        self.starts.clear();
        info!(
            "{}: scan complete, {} lines, {} carriers recovered, {} fragments skipped",
            self.source.display(),
            self.stats.lines,
            self.stats.recovered,
            self.stats.skipped
        );
    }
}

impl<R: BufRead> Iterator for RecoveryScanner<R> {
    type Item = Result<CarrierRecord, LinkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }

            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Err(e) => {
                    self.done = true;
                    return Some(Err(LinkError::io(&self.source, e)));
                }
                Ok(0) => {
                    self.done = true;
                    self.finish();
                }
                Ok(_) => {
                    self.stats.lines += 1;
                    if self.progress_every > 0 && self.stats.lines % self.progress_every == 0 {
                        info!(
                            "scanned {} lines: {} carriers recovered, {} fragments skipped",
                            self.stats.lines, self.stats.recovered, self.stats.skipped
                        );
                    }
                    self.push_line();
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Fragment helpers
// ---------------------------------------------------------------------------

enum Attempt {
    Parsed(Value),
    /// Input ended inside a value: more lines may complete it.
    Incomplete,
    Failed,
}

/// Decode one fragment, falling back to collapsing doubled quotes once.
fn attempt(text: &str) -> Attempt {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Attempt::Parsed(value),
        Err(e) if e.is_eof() => Attempt::Incomplete,
        Err(_) => {
            if text.contains("\"\"") {
                if let Ok(value) = serde_json::from_str::<Value>(&text.replace("\"\"", "\"")) {
                    return Attempt::Parsed(value);
                }
            }
            Attempt::Failed
        }
    }
}

fn trim_separators(s: &str) -> &str {
    s.trim_end_matches(|c: char| c == ',' || c.is_whitespace()).trim_start()
}

/// `[{...},` → `{...},` and `{...}]` → `{...}` for compact first/last lines.
fn strip_array_edges(line: &str) -> &str {
    let mut line = line;
    if let Some(rest) = line.strip_prefix('[') {
        if rest.trim_start().starts_with('{') {
            line = rest.trim_start();
        }
    }
    if line.starts_with('{') {
        if let Some(rest) = line.strip_suffix(']') {
            let rest = rest.trim_end();
            if rest.ends_with('}') || rest.ends_with("},") {
                line = rest;
            }
        }
    }
    line
}

/// Balanced top-level `{...}` spans, string-aware. Unclosed trailing objects
/// are not returned.
fn top_level_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                b'\n' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    spans
}

/// Registry identifier as text: strings trimmed, numbers in decimal, and
/// null / empty / `None` as absent.
fn identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => present(s).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
