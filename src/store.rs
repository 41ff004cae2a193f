//! Temporary run storage.

use std::io;
use std::path::{Path, PathBuf};

use tempfile;

/// Prefix of the temporary run directories.
const RUN_DIR_PREFIX: &str = ".ext-sort-";

/// Directory holding the runs of a single sort call.
///
/// The directory and every run file in it are removed by [`RunStore::end`] or, on any other exit path, when the
/// store is dropped.
pub struct RunStore {
    dir: tempfile::TempDir,
    runs: usize,
}

impl RunStore {
    /// Creates a fresh uniquely named run directory inside `base`.
    pub fn begin(base: &Path) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(RUN_DIR_PREFIX).tempdir_in(base)?;

        log::info!("using {} as a temporary directory", dir.path().display());

        return Ok(RunStore { dir, runs: 0 });
    }

    /// Returns the path of the run directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the path for the next run: `part_0`, `part_1`, ...
    pub fn new_run_path(&mut self) -> PathBuf {
        let path = self.dir.path().join(format!("part_{}", self.runs));
        self.runs += 1;

        return path;
    }

    /// Returns the number of run paths handed out so far.
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Removes the run directory with all its files.
    pub fn end(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;

        log::debug!("temporary directory {} removed", path.display());

        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;

    use super::RunStore;

    #[fixture]
    fn base_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    fn test_run_paths(base_dir: tempfile::TempDir) {
        let mut store = RunStore::begin(base_dir.path()).unwrap();
        assert!(store.path().is_dir());
        assert!(store.path().starts_with(base_dir.path()));

        let first = store.new_run_path();
        let second = store.new_run_path();

        assert_eq!(first, store.path().join("part_0"));
        assert_eq!(second, store.path().join("part_1"));
        assert_eq!(store.runs(), 2);
    }

    #[rstest]
    fn test_unique_directories(base_dir: tempfile::TempDir) {
        let first = RunStore::begin(base_dir.path()).unwrap();
        let second = RunStore::begin(base_dir.path()).unwrap();

        assert_ne!(first.path(), second.path());
    }

    #[rstest]
    fn test_end_removes_runs(base_dir: tempfile::TempDir) {
        let mut store = RunStore::begin(base_dir.path()).unwrap();
        let dir = store.path().to_path_buf();
        fs::write(store.new_run_path(), "1.a\n").unwrap();
        fs::write(store.new_run_path(), "2.b\n").unwrap();

        store.end().unwrap();

        assert!(!dir.exists());
        assert_eq!(fs::read_dir(base_dir.path()).unwrap().count(), 0);
    }

    #[rstest]
    fn test_drop_removes_runs(base_dir: tempfile::TempDir) {
        let dir = {
            let mut store = RunStore::begin(base_dir.path()).unwrap();
            fs::write(store.new_run_path(), "1.a\n").unwrap();
            store.path().to_path_buf()
        };

        assert!(!dir.exists());
    }
}
