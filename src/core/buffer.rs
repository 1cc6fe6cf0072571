use std::sync::Arc;

use parking_lot::RwLock;

/// One immutable, contiguously-read slice of encoder stdout.
///
/// The chunk-size target is 1 MiB (see [`crate::core::CHUNK_READ_TARGET`])
/// but the real size is whatever one short read returned — chunks are
/// never split or coalesced after the fact.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub bytes: Arc<[u8]>,
}

#[derive(Default)]
struct BufferInner {
    chunks: Vec<Chunk>,
    finished: bool,
}

/// Append-only ordered sequence of [`Chunk`]s with concurrent reader access.
///
/// `completed` (the chunk count) and `finished` are both guarded by the same
/// lock so that `completed == chunks.len()` holds at every externally
/// observable moment. The buffer performs no I/O of its own — it is pure
/// in-memory bookkeeping; [`crate::core::job::TranscodeJob`] is the only
/// writer.
pub struct ChunkedBuffer {
    inner: RwLock<BufferInner>,
}

impl ChunkedBuffer {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BufferInner::default()),
        }
    }

    /// Append a new chunk, returning the new completed count.
    pub fn append(&self, bytes: Arc<[u8]>) -> usize {
        let mut inner = self.inner.write();
        let index = inner.chunks.len();
        inner.chunks.push(Chunk { index, bytes });
        inner.chunks.len()
    }

    /// Return the chunk at `index`, or `None` if out of range.
    ///
    /// Safe to call concurrently with `append`: earlier chunks are
    /// immutable once appended, and `Arc<[u8]>` makes the returned slice
    /// independent of future appends.
    pub fn get(&self, index: usize) -> Option<Chunk> {
        let inner = self.inner.read();
        inner.chunks.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finished(&self) -> bool {
        self.inner.read().finished
    }

    /// Idempotent: transitions `finished` to true.
    pub fn mark_finished(&self) {
        self.inner.write().finished = true;
    }
}

impl Default for ChunkedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_is_monotone_and_len_matches() {
        let buf = ChunkedBuffer::new();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.append(Arc::from(&b"a"[..])), 1);
        assert_eq!(buf.append(Arc::from(&b"bb"[..])), 2);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn get_out_of_range_returns_none() {
        let buf = ChunkedBuffer::new();
        buf.append(Arc::from(&b"a"[..]));
        assert!(buf.get(0).is_some());
        assert!(buf.get(1).is_none());
    }

    #[test]
    fn chunks_are_immutable_once_appended() {
        let buf = ChunkedBuffer::new();
        buf.append(Arc::from(&b"hello"[..]));
        let first = buf.get(0).unwrap();
        buf.append(Arc::from(&b"world"[..]));
        let first_again = buf.get(0).unwrap();
        assert_eq!(&*first.bytes, &*first_again.bytes);
        assert_eq!(&*first.bytes, b"hello");
    }

    #[test]
    fn mark_finished_is_idempotent() {
        let buf = ChunkedBuffer::new();
        assert!(!buf.finished());
        buf.mark_finished();
        buf.mark_finished();
        assert!(buf.finished());
    }
}
