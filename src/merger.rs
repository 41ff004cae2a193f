//! Binary heap merger.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Binary heap merger implementation.
/// Merges multiple sorted inputs into a single sorted output holding at most one item per input in memory.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of items,
/// *n* is the number of chunks (inputs).
///
/// Equal items coming from different inputs are returned in input order.
pub struct BinaryHeapMerger<T, E, C>
where
    T: Ord,
    C: IntoIterator<Item = Result<T, E>>,
{
    // binary heap is max-heap by default so we reverse it to convert it to min-heap
    items: BinaryHeap<Reverse<(T, usize)>>,
    chunks: Vec<C::IntoIter>,
    seeded: usize,
    failed: Option<E>,
}

impl<T, E, C> BinaryHeapMerger<T, E, C>
where
    T: Ord,
    C: IntoIterator<Item = Result<T, E>>,
{
    /// Creates an instance of a binary heap merger using chunks as inputs.
    /// Chunk items should be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `chunks` - Chunks to be merged in a single sorted one
    pub fn new<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
    {
        let chunks = Vec::from_iter(chunks.into_iter().map(|c| c.into_iter()));
        let items = BinaryHeap::with_capacity(chunks.len());

        return BinaryHeapMerger {
            chunks,
            items,
            seeded: 0,
            failed: None,
        };
    }

    /// Returns the number of merged inputs.
    pub fn chunks(&self) -> usize {
        self.chunks.len()
    }

    fn pull(&mut self, idx: usize) -> Result<(), E> {
        if let Some(item) = self.chunks[idx].next() {
            self.items.push(Reverse((item?, idx)));
        }

        return Ok(());
    }
}

impl<T, E, C> Iterator for BinaryHeapMerger<T, E, C>
where
    T: Ord,
    C: IntoIterator<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    /// Returns the next item from the inputs in ascending order.
    /// An input error is returned in place of that input's next item; the input is not read any further.
    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.failed.take() {
            return Some(Err(err));
        }

        while self.seeded < self.chunks.len() {
            let idx = self.seeded;
            self.seeded += 1;
            if let Err(err) = self.pull(idx) {
                return Some(Err(err));
            }
        }

        let Reverse((result, idx)) = self.items.pop()?;
        if let Err(err) = self.pull(idx) {
            self.failed = Some(err);
        }

        return Some(Ok(result));
    }
}
