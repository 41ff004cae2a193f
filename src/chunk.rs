//! Sorted runs stored on the file system, one `<key>.<payload>` line per record.

use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::record::Record;

/// External chunk: a run file read back line by line. The file is closed when the chunk is dropped.
pub struct ExternalChunk {
    path: PathBuf,
    reader: io::BufReader<fs::File>,
    line: Vec<u8>,
}

impl ExternalChunk {
    /// Writes `items` to a new run file at `path`. Items must already be sorted.
    /// Returns the number of records written.
    pub fn build(path: &Path, items: impl IntoIterator<Item = Record>, buf_size: Option<usize>) -> io::Result<usize> {
        let file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;

        let mut chunk_writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        let written = Self::dump(&mut chunk_writer, items)?;
        chunk_writer.flush()?;

        return Ok(written);
    }

    /// Opens a run file for reading.
    pub fn open(path: &Path, buf_size: Option<usize>) -> io::Result<Self> {
        let file = fs::File::open(path)?;

        let reader = match buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        return Ok(ExternalChunk {
            path: path.to_path_buf(),
            reader,
            line: Vec::new(),
        });
    }

    /// Returns the run file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dump<W: Write>(chunk_writer: &mut W, items: impl IntoIterator<Item = Record>) -> io::Result<usize> {
        let mut written = 0;
        for item in items.into_iter() {
            item.write_line(chunk_writer)?;
            written += 1;
        }

        return Ok(written);
    }
}

impl Iterator for ExternalChunk {
    type Item = io::Result<Record>;

    /// Returns the next record of the run. Lines that do not parse are skipped, the same way the chunking phase
    /// skips them.
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => return Some(Err(err)),
            }

            let line = self.line.strip_suffix(b"\n").unwrap_or(&self.line);
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            match Record::parse_bytes(line) {
                Ok(record) => return Some(Ok(record)),
                Err(err) => log::warn!(
                    "skipping malformed line {:?} in {}: {}",
                    String::from_utf8_lossy(line),
                    self.path.display(),
                    err
                ),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io;

    use rstest::*;

    use super::ExternalChunk;
    use crate::record::Record;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    #[case(None)]
    #[case(Some(4))]
    fn test_chunk(tmp_dir: tempfile::TempDir, #[case] buf_size: Option<usize>) {
        let path = tmp_dir.path().join("part_0");
        let saved = Vec::from_iter((0..100).map(|i| Record::new(i, format!("item.{:03}", i))));

        let written = ExternalChunk::build(&path, saved.clone(), buf_size).unwrap();
        assert_eq!(written, 100);

        let chunk = ExternalChunk::open(&path, buf_size).unwrap();
        assert_eq!(chunk.path(), path.as_path());

        let restored: io::Result<Vec<Record>> = chunk.collect();
        assert_eq!(restored.unwrap(), saved);
    }

    #[rstest]
    fn test_chunk_file_format(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("part_0");
        let items = vec![Record::new(42, "apple"), Record::new(5, "")];

        ExternalChunk::build(&path, items, None).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "42.apple\n5.\n");
    }

    #[rstest]
    fn test_chunk_already_exists(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("part_0");
        fs::write(&path, "").unwrap();

        let result = ExternalChunk::build(&path, vec![Record::new(1, "a")], None);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::AlreadyExists);
    }

    #[rstest]
    fn test_chunk_skips_malformed_lines(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("part_0");
        fs::write(&path, "1.a\r\ngarbage\n2.b").unwrap();

        let chunk = ExternalChunk::open(&path, None).unwrap();
        let restored: io::Result<Vec<Record>> = chunk.collect();

        assert_eq!(restored.unwrap(), vec![Record::new(1, "a"), Record::new(2, "b")]);
    }
}
