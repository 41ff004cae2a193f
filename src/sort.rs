//! External sorter.

use std::error::Error;
use std::ffi::OsString;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;

use crate::buffer::{self, GroupedBuffer, PendingLine};
use crate::chunk::ExternalChunk;
use crate::merger::BinaryHeapMerger;
use crate::store::RunStore;

/// Suffix appended to the source file stem to get the default output file name.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "Sorted";

const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory creation or removal error.
    TempDir(io::Error),
    /// Source file opening or reading error.
    InputError(io::Error),
    /// Run or output file I/O error.
    IO(io::Error),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(match &self {
            SortError::TempDir(err) => err,
            SortError::InputError(err) => err,
            SortError::IO(err) => err,
        })
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory not created or removed: {}", err),
            SortError::InputError(err) => write!(f, "input file error: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
        }
    }
}

/// Sorting summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortStats {
    /// Read buffer size used to split the input.
    pub buffer_size: usize,
    /// Number of runs the input was split into.
    pub runs: usize,
    /// Number of records written to the output.
    pub records: usize,
    /// Number of skipped malformed lines.
    pub malformed: usize,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone, Debug, Default)]
pub struct ExternalSorterBuilder {
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Input read buffer size.
    buffer_size: Option<usize>,
    /// Run and output file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Output file name suffix.
    output_suffix: Option<String>,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> ExternalSorter {
        ExternalSorter {
            tmp_dir: self.tmp_dir,
            buffer_size: self.buffer_size,
            rw_buf_size: self.rw_buf_size,
            output_suffix: self.output_suffix.unwrap_or_else(|| DEFAULT_OUTPUT_SUFFIX.to_string()),
        }
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets input read buffer size, overriding the size estimated from the input size.
    /// Each read of that many bytes produces at most one run. Zero is treated as one.
    pub fn with_buffer_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.buffer_size = Some(buf_size.max(1));
        return self;
    }

    /// Sets run and output file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.rw_buf_size = Some(buf_size.max(1));
        return self;
    }

    /// Sets the suffix appended to the source file stem for the default output path.
    pub fn with_output_suffix(mut self, suffix: &str) -> ExternalSorterBuilder {
        self.output_suffix = Some(suffix.to_string());
        return self;
    }
}

/// External sorter of `<key>.<payload>` line files.
///
/// The input is read in buffer-sized blocks; the records of each block are grouped by payload and written to a
/// sorted run. The runs are then merged into the output file and removed.
#[derive(Clone, Debug)]
pub struct ExternalSorter {
    tmp_dir: Option<Box<Path>>,
    buffer_size: Option<usize>,
    rw_buf_size: Option<usize>,
    output_suffix: String,
}

impl ExternalSorter {
    /// Returns the default output path for `source`: `<stem><suffix>.<extension>` in the source directory.
    pub fn output_path_for(&self, source: &Path) -> PathBuf {
        let mut name = OsString::from(source.file_stem().unwrap_or_default());
        name.push(&self.output_suffix);
        if let Some(extension) = source.extension() {
            name.push(".");
            name.push(extension);
        }

        return source.with_file_name(name);
    }

    /// Sorts `source` into the default output path.
    /// Returns the output path.
    pub fn sort_file(&self, source: &Path) -> Result<PathBuf, SortError> {
        let output = self.output_path_for(source);
        self.sort_file_to(source, &output)?;

        return Ok(output);
    }

    /// Sorts `source` into `output`.
    ///
    /// The temporary run directory is removed whether the sort succeeds or fails.
    pub fn sort_file_to(&self, source: &Path, output: &Path) -> Result<SortStats, SortError> {
        log::info!("sorting {} into {}", source.display(), output.display());

        let result = self.sort_runs(source, output);
        match &result {
            Ok(stats) => log::info!(
                "sorting done ({} records, {} runs, {} malformed lines skipped)",
                stats.records,
                stats.runs,
                stats.malformed
            ),
            Err(err) => log::error!("sorting {} failed: {}", source.display(), err),
        }

        return result;
    }

    fn sort_runs(&self, source: &Path, output: &Path) -> Result<SortStats, SortError> {
        let input = fs::File::open(source).map_err(SortError::InputError)?;
        let input_size = input.metadata().map_err(SortError::InputError)?.len();
        let buffer_size = self.buffer_size.unwrap_or_else(|| buffer::estimate_buffer_size(input_size));

        log::info!(
            "input size: {}, buffer size: {}",
            ByteSize(input_size),
            ByteSize(buffer_size as u64)
        );

        let mut store = RunStore::begin(&self.tmp_base(source)).map_err(SortError::TempDir)?;

        let (runs, malformed) = self.split(input, buffer_size, &mut store)?;
        log::info!("input split into {} runs", runs.len());

        let records = self.merge(&runs, output)?;
        log::info!("{} runs merged", runs.len());

        store.end().map_err(SortError::TempDir)?;

        return Ok(SortStats {
            buffer_size,
            runs: runs.len(),
            records,
            malformed,
        });
    }

    fn tmp_base(&self, source: &Path) -> PathBuf {
        match &self.tmp_dir {
            Some(tmp_dir) => tmp_dir.to_path_buf(),
            None => match source.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }

    /// Splits the input into sorted runs, one run per read buffer that produced records.
    /// Returns the run paths and the number of malformed lines skipped.
    fn split(
        &self,
        input: fs::File,
        buffer_size: usize,
        store: &mut RunStore,
    ) -> Result<(Vec<PathBuf>, usize), SortError> {
        let mut reader = match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, input),
            None => io::BufReader::new(input),
        };

        let mut chunk_buf = GroupedBuffer::new();

        // the byte order mark may be longer than one read buffer, so the head is read on its own
        let mut head = [0; BOM.len()];
        let head_len = read_full(&mut reader, &mut head).map_err(SortError::InputError)?;
        let head = &head[..head_len];
        let head = head.strip_prefix(&BOM[..]).unwrap_or(head);
        let mut pending = buffer::consume(PendingLine::new(), head, &mut chunk_buf);

        let mut read_buf = vec![0; buffer_size];
        let mut runs = Vec::new();
        let mut malformed = 0;

        loop {
            let read = read_full(&mut reader, &mut read_buf).map_err(SortError::InputError)?;
            if read == 0 {
                break;
            }

            pending = buffer::consume(pending, &read_buf[..read], &mut chunk_buf);
            if !chunk_buf.is_empty() {
                malformed += chunk_buf.malformed();
                runs.push(self.create_chunk(store, chunk_buf)?);
                chunk_buf = GroupedBuffer::new();
            }
        }

        pending.finish(&mut chunk_buf);
        malformed += chunk_buf.malformed();
        if !chunk_buf.is_empty() {
            runs.push(self.create_chunk(store, chunk_buf)?);
        }

        log::debug!("external sort preparation done");

        return Ok((runs, malformed));
    }

    fn create_chunk(&self, store: &mut RunStore, buffer: GroupedBuffer) -> Result<PathBuf, SortError> {
        let path = store.new_run_path();

        log::debug!(
            "saving chunk {} ({} records, {} payloads, {})",
            path.display(),
            buffer.len(),
            buffer.groups(),
            ByteSize(buffer.mem_size() as u64)
        );
        ExternalChunk::build(&path, buffer, self.rw_buf_size).map_err(SortError::IO)?;

        return Ok(path);
    }

    /// Merges the runs into `output`. Every run reader is closed when this returns.
    /// Returns the number of records written.
    fn merge(&self, runs: &[PathBuf], output: &Path) -> Result<usize, SortError> {
        let chunks = runs
            .iter()
            .map(|path| ExternalChunk::open(path, self.rw_buf_size))
            .collect::<io::Result<Vec<_>>>()
            .map_err(SortError::IO)?;
        let merger = BinaryHeapMerger::new(chunks);

        let output_file = fs::File::create(output).map_err(SortError::IO)?;
        let mut output_writer = match self.rw_buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, output_file),
            None => io::BufWriter::new(output_file),
        };

        let mut written = 0;
        for record in merger {
            let record = record.map_err(SortError::IO)?;
            record.write_line(&mut output_writer).map_err(SortError::IO)?;
            written += 1;
        }
        output_writer.flush().map_err(SortError::IO)?;

        return Ok(written);
    }
}

impl Default for ExternalSorter {
    fn default() -> Self {
        ExternalSorterBuilder::new().build()
    }
}

/// Reads until `buf` is full or the input ends, so that every read except the last one is exactly one buffer.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    return Ok(filled);
}
