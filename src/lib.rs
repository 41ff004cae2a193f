//! `line-ext-sort` is an external merge sort for text files made of `<number>.<text>` lines.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. Sorting is achieved in two passes. During the
//! first pass it sorts chunks of data that each fit in RAM, during the second pass it merges the sorted chunks
//! together. For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! * **Line format:**
//!   every line is `<key>.<payload>` where the key is a signed integer and the payload is any text (only the
//!   first `.` separates). Lines that do not follow the format are skipped.
//! * **Order:**
//!   lines are ordered by payload (byte-wise) and then by key (numerically).
//! * **Bounded memory:**
//!   the input is read in blocks whose size grows sub-linearly with the input size (see
//!   [`buffer::estimate_buffer_size`]); each block becomes one sorted run on disk and all runs are merged in a
//!   single streaming pass.
//! * **Cleanup:**
//!   runs live in a private temporary directory that is removed when the sort finishes or fails.
//!
//! # Example
//!
//! ```no_run
//! use std::path;
//!
//! use line_ext_sort::{ExternalSorter, ExternalSorterBuilder};
//!
//! fn main() {
//!     let sorter: ExternalSorter = ExternalSorterBuilder::new()
//!         .with_tmp_dir(path::Path::new("./"))
//!         .build();
//!
//!     let output = sorter.sort_file(path::Path::new("BigFile.txt")).unwrap();
//!     println!("sorted into {}", output.display());
//! }
//! ```

pub mod buffer;
pub mod chunk;
pub mod generator;
pub mod merger;
pub mod record;
pub mod sort;
pub mod store;

pub use buffer::{estimate_buffer_size, GroupedBuffer, PendingLine};
pub use chunk::ExternalChunk;
pub use generator::FileGenerator;
pub use merger::BinaryHeapMerger;
pub use record::{Record, RecordError};
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortError, SortStats};
pub use store::RunStore;
