//! Test input generator.

use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::Path;

use bytesize::ByteSize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::record::Record;

/// Seed used when none is given, so that generated files are reproducible.
pub const DEFAULT_SEED: u64 = 10001;

/// Upper bound (exclusive) of generated keys.
const MAX_KEY: i64 = 10_000;
/// Maximum length of a line without its terminator.
const MAX_LINE_LEN: usize = 15;
/// Minimum payload length.
const MIN_PAYLOAD_LEN: usize = 2;

const SYMBOLS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Writes files of random `<key>.<payload>` lines.
pub struct FileGenerator {
    size: u64,
    seed: u64,
}

impl FileGenerator {
    /// Creates a generator producing files of at least `size` bytes.
    pub fn new(size: u64) -> Self {
        FileGenerator {
            size,
            seed: DEFAULT_SEED,
        }
    }

    /// Sets random generator seed.
    pub fn with_seed(mut self, seed: u64) -> FileGenerator {
        self.seed = seed;
        return self;
    }

    /// Writes lines to `path` until the requested size is reached.
    /// Returns the number of bytes written.
    pub fn generate(&self, path: &Path) -> io::Result<u64> {
        log::info!("generating {} into {}", ByteSize(self.size), path.display());

        let mut writer = io::BufWriter::new(fs::File::create(path)?);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut line = Vec::with_capacity(MAX_LINE_LEN + 1);
        let mut written = 0;

        while written < self.size {
            line.clear();
            Self::random_record(&mut rng).write_line(&mut line)?;
            writer.write_all(&line)?;
            written += line.len() as u64;
        }
        writer.flush()?;

        log::info!("generated {} ({} bytes)", path.display(), written);

        return Ok(written);
    }

    fn random_record(rng: &mut impl Rng) -> Record {
        let key = rng.gen_range(0..MAX_KEY);
        let key_len = itoa::Buffer::new().format(key).len();

        let payload_len = rng.gen_range(MIN_PAYLOAD_LEN..MAX_LINE_LEN - key_len - 1);
        let payload: String = (0..payload_len)
            .map(|_| SYMBOLS[rng.gen_range(0..SYMBOLS.len())] as char)
            .collect();

        return Record::new(key, payload);
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;

    use super::{FileGenerator, MAX_LINE_LEN};
    use crate::record::Record;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(10_000)]
    fn test_generate(tmp_dir: tempfile::TempDir, #[case] size: u64) {
        let path = tmp_dir.path().join("BigFile.txt");

        let written = FileGenerator::new(size).generate(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();

        assert_eq!(written, content.len() as u64);
        assert!(written >= size);
        assert!(written < size + MAX_LINE_LEN as u64 + 1);

        for line in content.lines() {
            let record = Record::parse(line).unwrap();
            assert!((0..10_000).contains(&record.key));
            assert!(record.payload.len() >= 2);
            assert!(line.len() <= MAX_LINE_LEN);
            assert!(record.payload.bytes().all(|b| b.is_ascii_alphabetic()));
        }
    }

    #[rstest]
    fn test_generate_is_reproducible(tmp_dir: tempfile::TempDir) {
        let first = tmp_dir.path().join("first.txt");
        let second = tmp_dir.path().join("second.txt");
        let other = tmp_dir.path().join("other.txt");

        FileGenerator::new(4096).with_seed(7).generate(&first).unwrap();
        FileGenerator::new(4096).with_seed(7).generate(&second).unwrap();
        FileGenerator::new(4096).with_seed(8).generate(&other).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
        assert_ne!(fs::read(&first).unwrap(), fs::read(&other).unwrap());
    }
}
