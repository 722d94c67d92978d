use bytes::Bytes;

use crate::path::{PathId, PathMask};

/// A contiguous range of the connection-level byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    seq: u64,
    payload: Bytes,
    data_fin: bool,
    path_mask: PathMask,
}

impl Segment {
    pub fn new(seq: u64, payload: Bytes) -> Self {
        Self {
            seq,
            payload,
            data_fin: false,
            path_mask: PathMask::default(),
        }
    }

    /// A segment that closes the stream.
    pub fn data_fin(seq: u64, payload: Bytes) -> Self {
        Self {
            data_fin: true,
            ..Self::new(seq, payload)
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn end_seq(&self) -> u64 {
        self.seq + self.payload.len() as u64
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn is_data_fin(&self) -> bool {
        self.data_fin
    }

    pub fn path_mask(&self) -> PathMask {
        self.path_mask
    }

    pub fn mark_sent_on(&mut self, path: PathId) {
        self.path_mask.insert(path);
    }

    /// Splits off the first `at` bytes and returns them, `self` keeps the
    /// remainder.
    ///
    /// The data-fin flag stays with the remainder, both halves remember the
    /// paths the whole segment was sent on.
    ///
    /// # Panics
    ///
    /// Panics if `at > self.len()`.
    pub fn split_to(&mut self, at: usize) -> Segment {
        let head = self.payload.split_to(at);
        let seq = self.seq;
        self.seq += at as u64;
        Segment {
            seq,
            payload: head,
            data_fin: false,
            path_mask: self.path_mask,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_to() {
        let mut segment = Segment::data_fin(100, Bytes::from(vec![7u8; 3000]));
        segment.mark_sent_on(PathId::from(2));

        let head = segment.split_to(1200);
        assert_eq!(head.seq(), 100);
        assert_eq!(head.len(), 1200);
        assert_eq!(head.end_seq(), 1300);
        assert!(!head.is_data_fin());
        assert!(head.path_mask().contains(PathId::from(2)));

        assert_eq!(segment.seq(), 1300);
        assert_eq!(segment.len(), 1800);
        assert!(segment.is_data_fin());
    }
}
