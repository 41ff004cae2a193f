//! Chunk buffer: groups records by payload until they are flushed to a run.

use std::collections::btree_map::{self, BTreeMap};
use std::str;
use std::vec;

use bytesize::{KIB, MIB};
use memchr::memchr_iter;

use crate::record::{self, Record, RecordError};

/// Exponent applied to the input size to get a buffer size. Grows sub-linearly so that both the number of runs and
/// the per-run memory stay bounded as the input grows.
pub const BUFFER_SIZE_EXPONENT: f64 = 0.6;

/// Estimates a read buffer size for an input of `total_size` bytes.
///
/// The raw size `total_size ^ 0.6` is rounded down to a step that starts at 1 MiB and is divided by ten while it
/// exceeds both the raw size and 1 KiB. The result is never smaller than 1 KiB.
pub fn estimate_buffer_size(total_size: u64) -> usize {
    let raw = (total_size as f64).powf(BUFFER_SIZE_EXPONENT) as u64;

    let mut step = MIB;
    while step > KIB && raw < step {
        step /= 10;
    }

    return KIB.max(raw / step * step) as usize;
}

/// Records grouped by payload. Keys are kept in arrival order and sorted only when the buffer is drained.
#[derive(Debug, Default)]
pub struct GroupedBuffer {
    groups: BTreeMap<String, Vec<i64>>,
    len: usize,
    mem_size: usize,
    malformed: usize,
}

impl GroupedBuffer {
    pub fn new() -> Self {
        GroupedBuffer::default()
    }

    /// Adds a record to its payload group.
    pub fn push(&mut self, item: Record) {
        self.mem_size += run_line_size(item.key, &item.payload);
        self.len += 1;
        self.groups.entry(item.payload).or_default().push(item.key);
    }

    /// Parses a raw line (without terminator) and adds it. Malformed lines are counted and skipped.
    pub fn push_line(&mut self, line: &[u8]) -> Result<(), RecordError> {
        let result = record::split_line(line).and_then(|(key, payload)| {
            let payload = str::from_utf8(payload).map_err(RecordError::InvalidEncoding)?;
            Ok((key, payload))
        });

        let (key, payload) = match result {
            Ok(parsed) => parsed,
            Err(err) => {
                self.malformed += 1;
                return Err(err);
            }
        };

        match self.groups.get_mut(payload) {
            Some(keys) => keys.push(key),
            None => {
                self.groups.insert(payload.to_owned(), vec![key]);
            }
        }
        self.mem_size += run_line_size(key, payload);
        self.len += 1;

        return Ok(());
    }

    /// Returns the number of records in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of distinct payloads.
    pub fn groups(&self) -> usize {
        self.groups.len()
    }

    /// Returns the number of bytes the buffered records take as run lines (keys in canonical form, without
    /// terminators).
    pub fn mem_size(&self) -> usize {
        self.mem_size
    }

    /// Returns the number of malformed lines skipped by [`GroupedBuffer::push_line`].
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

impl IntoIterator for GroupedBuffer {
    type Item = Record;
    type IntoIter = GroupedIter;

    /// Drains the buffer in record order: payloads ascending, keys ascending within a payload.
    fn into_iter(self) -> Self::IntoIter {
        GroupedIter {
            groups: self.groups.into_iter(),
            current: None,
        }
    }
}

/// Sorted iterator over a drained [`GroupedBuffer`].
pub struct GroupedIter {
    groups: btree_map::IntoIter<String, Vec<i64>>,
    current: Option<(String, vec::IntoIter<i64>)>,
}

impl Iterator for GroupedIter {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((payload, keys)) = &mut self.current {
                if let Some(key) = keys.next() {
                    return Some(Record::new(key, payload.as_str()));
                }
            }

            let (payload, mut keys) = self.groups.next()?;
            keys.sort_unstable();
            self.current = Some((payload, keys.into_iter()));
        }
    }
}

/// Unterminated tail of the last read, prepended to the first line of the next one.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingLine(Vec<u8>);

impl PendingLine {
    pub fn new() -> Self {
        PendingLine::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Folds the tail left at the end of the stream into the buffer as a final line.
    pub fn finish(self, buffer: &mut GroupedBuffer) {
        if !self.is_empty() {
            push_logged(buffer, trim_cr(&self.0));
        }
    }
}

/// Splits `bytes` into lines and folds every complete line into `buffer`.
///
/// The pending tail of the previous read is prepended to the first line. The unterminated tail of `bytes` is
/// returned as the new pending line.
pub fn consume(pending: PendingLine, bytes: &[u8], buffer: &mut GroupedBuffer) -> PendingLine {
    let mut pending = pending;
    let mut start = 0;

    for end in memchr_iter(b'\n', bytes) {
        let line = &bytes[start..end];
        if pending.is_empty() {
            push_logged(buffer, trim_cr(line));
        } else {
            pending.0.extend_from_slice(line);
            push_logged(buffer, trim_cr(&pending.0));
            pending.0.clear();
        }
        start = end + 1;
    }

    pending.0.extend_from_slice(&bytes[start..]);

    return pending;
}

fn run_line_size(key: i64, payload: &str) -> usize {
    itoa::Buffer::new().format(key).len() + 1 + payload.len()
}

fn push_logged(buffer: &mut GroupedBuffer, line: &[u8]) {
    if let Err(err) = buffer.push_line(line) {
        log::trace!("skipping malformed line {:?}: {}", String::from_utf8_lossy(line), err);
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}
