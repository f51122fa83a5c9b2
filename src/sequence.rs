/// Storage sequences underlying column backends
///
/// A Sequence is the lowest-level storage for a column's values. Two
/// implementations back the two column backends:
/// - ArraySequence: one contiguous buffer, O(1) access, O(N) delete
/// - ChunkedSequence: a list of chunks of roughly √N values each,
///   O(log √N) access, O(√N) delete

use crate::error::{FrameError, Result};
use std::fmt::Debug;

/// Trait for sequence storage operations
pub trait Sequence<T: Clone> {
    /// Return the number of elements in the sequence
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reference to the value at index (0-based)
    fn get(&self, index: usize) -> Result<&T>;

    /// Overwrite the value at index
    fn set(&mut self, index: usize, value: T) -> Result<()>;

    /// Remove and return the value at index, shifting subsequent elements
    fn delete(&mut self, index: usize) -> Result<T>;

    /// Iterate over all values in order
    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_>;

    fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

/// Simple contiguous array implementation.
#[derive(Debug, Clone, Default)]
pub struct ArraySequence<T: Clone> {
    data: Vec<T>,
}

impl<T: Clone> ArraySequence<T> {
    pub fn from_vec(data: Vec<T>) -> Self {
        ArraySequence { data }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: Clone + Debug> Sequence<T> for ArraySequence<T> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, index: usize) -> Result<&T> {
        self.data
            .get(index)
            .ok_or_else(|| FrameError::index(index, self.data.len()))
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(index)
            .ok_or_else(|| FrameError::index(index, len))?;
        *slot = value;
        Ok(())
    }

    fn delete(&mut self, index: usize) -> Result<T> {
        if index >= self.data.len() {
            return Err(FrameError::index(index, self.data.len()));
        }
        Ok(self.data.remove(index))
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.data.iter())
    }

    fn to_vec(&self) -> Vec<T> {
        self.data.clone()
    }
}

/// Chunked storage using sqrt decomposition.
///
/// Invariants:
/// - `chunk_starts[i]` is the global index of the first value of chunk i
/// - no chunk is empty
/// - chunks are built at the ideal size and only shrink; a chunk that falls
///   below a quarter of the ideal size merges into its smaller neighbour
#[derive(Debug, Clone)]
pub struct ChunkedSequence<T: Clone> {
    chunks: Vec<Vec<T>>,
    chunk_starts: Vec<usize>,
    size: usize,
}

impl<T: Clone> ChunkedSequence<T> {
    const MIN_CHUNK_SIZE: usize = 8;
    const MAX_CHUNK_SIZE: usize = 8192;

    /// Build a sequence with evenly sized chunks.
    pub fn from_vec(data: Vec<T>) -> Self {
        let mut seq = ChunkedSequence {
            chunks: Vec::new(),
            chunk_starts: Vec::new(),
            size: data.len(),
        };
        let chunk_size = seq.ideal_chunk_size();
        let mut start = 0;
        let mut rest = data;
        while !rest.is_empty() {
            let tail = rest.split_off(chunk_size.min(rest.len()));
            let len = rest.len();
            seq.chunks.push(rest);
            seq.chunk_starts.push(start);
            start += len;
            rest = tail;
        }
        seq
    }

    #[cfg(test)]
    fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn ideal_chunk_size(&self) -> usize {
        let sqrt = (self.size as f64).sqrt() as usize;
        sqrt.clamp(Self::MIN_CHUNK_SIZE, Self::MAX_CHUNK_SIZE)
    }

    /// Locate (chunk, offset) for a global index by binary search on
    /// chunk starts.
    fn locate(&self, index: usize) -> Result<(usize, usize)> {
        if index >= self.size {
            return Err(FrameError::index(index, self.size));
        }
        let chunk = match self.chunk_starts.binary_search(&index) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        Ok((chunk, index - self.chunk_starts[chunk]))
    }

    fn shift_starts_after(&mut self, chunk: usize) {
        for start in self.chunk_starts.iter_mut().skip(chunk + 1) {
            *start -= 1;
        }
    }

    fn maybe_merge(&mut self, chunk: usize) {
        if self.chunks.len() <= 1 {
            return;
        }
        let ideal = self.ideal_chunk_size();
        if self.chunks[chunk].len() >= ideal / 4 {
            return;
        }

        // Merge into whichever neighbour is smaller, if the result stays bounded
        let next_len = self.chunks.get(chunk + 1).map(Vec::len);
        let prev_len = chunk.checked_sub(1).map(|p| self.chunks[p].len());
        let target = match (prev_len, next_len) {
            (Some(p), Some(n)) if n <= p => chunk + 1,
            (Some(_), _) => chunk - 1,
            (None, Some(_)) => chunk + 1,
            (None, None) => return,
        };
        let (low, high) = if target < chunk { (target, chunk) } else { (chunk, target) };
        if self.chunks[low].len() + self.chunks[high].len() > 2 * ideal {
            return;
        }
        let moved = self.chunks.remove(high);
        self.chunk_starts.remove(high);
        self.chunks[low].extend(moved);
    }
}

impl<T: Clone + Debug> Sequence<T> for ChunkedSequence<T> {
    fn len(&self) -> usize {
        self.size
    }

    fn get(&self, index: usize) -> Result<&T> {
        let (chunk, offset) = self.locate(index)?;
        Ok(&self.chunks[chunk][offset])
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        let (chunk, offset) = self.locate(index)?;
        self.chunks[chunk][offset] = value;
        Ok(())
    }

    fn delete(&mut self, index: usize) -> Result<T> {
        let (chunk, offset) = self.locate(index)?;
        let value = self.chunks[chunk].remove(offset);
        self.size -= 1;
        self.shift_starts_after(chunk);

        if self.chunks[chunk].is_empty() {
            self.chunks.remove(chunk);
            self.chunk_starts.remove(chunk);
        } else {
            self.maybe_merge(chunk);
        }
        Ok(value)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.chunks.iter().flat_map(|chunk| chunk.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_sequence_basic() {
        let mut seq = ArraySequence::from_vec(vec![10, 20, 30]);
        assert_eq!(seq.len(), 3);
        assert_eq!(*seq.get(2).unwrap(), 30);
        seq.set(0, 5).unwrap();
        assert_eq!(seq.to_vec(), vec![5, 20, 30]);
    }

    #[test]
    fn test_array_sequence_delete() {
        let mut seq = ArraySequence::from_vec(vec![1, 2, 3]);
        assert_eq!(seq.delete(1).unwrap(), 2);
        assert_eq!(seq.to_vec(), vec![1, 3]);
        assert!(seq.delete(5).is_err());
    }

    #[test]
    fn test_chunked_from_vec_splits_evenly() {
        let seq = ChunkedSequence::from_vec((0..1000).collect::<Vec<i32>>());
        assert_eq!(seq.len(), 1000);
        // sqrt(1000) = 31 values per chunk
        assert_eq!(seq.chunk_count(), 33);
        for i in [0usize, 31, 32, 500, 999] {
            assert_eq!(*seq.get(i).unwrap(), i as i32);
        }
    }

    #[test]
    fn test_chunked_delete_maintains_indices() {
        let mut seq = ChunkedSequence::from_vec((0..20).map(|i| i * 10).collect::<Vec<i32>>());

        assert_eq!(seq.delete(10).unwrap(), 100);
        assert_eq!(seq.len(), 19);
        assert_eq!(*seq.get(9).unwrap(), 90);
        assert_eq!(*seq.get(10).unwrap(), 110);

        assert_eq!(seq.delete(0).unwrap(), 0);
        assert_eq!(*seq.get(0).unwrap(), 10);

        let last = seq.len() - 1;
        assert_eq!(seq.delete(last).unwrap(), 190);
    }

    #[test]
    fn test_chunked_delete_everything() {
        let mut seq = ChunkedSequence::from_vec((0..300).collect::<Vec<i32>>());
        let mut expected: Vec<i32> = (0..300).collect();
        while !expected.is_empty() {
            let index = expected.len() / 3;
            assert_eq!(seq.delete(index).unwrap(), expected.remove(index));
            assert_eq!(seq.len(), expected.len());
        }
        assert_eq!(seq.chunk_count(), 0);
        assert!(seq.get(0).is_err());
    }

    #[test]
    fn test_chunked_merge_keeps_order() {
        let mut seq = ChunkedSequence::from_vec((0..2000).collect::<Vec<i32>>());
        // Hollow out one chunk so it has to merge into a neighbour
        for _ in 0..40 {
            seq.delete(100).unwrap();
        }
        let expected: Vec<i32> = (0..100).chain(140..2000).collect();
        assert_eq!(seq.to_vec(), expected);
    }

    #[test]
    fn test_chunked_error_handling() {
        let mut seq: ChunkedSequence<i32> = ChunkedSequence::from_vec(Vec::new());
        assert!(seq.get(0).is_err());
        assert!(seq.set(0, 1).is_err());
        assert!(seq.delete(0).is_err());
        assert!(seq.is_empty());
    }
}
