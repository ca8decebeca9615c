//! Per-row key stream registry

use crate::{Error, KeyStream, KeyStreamPair, Result};

/// Ordered key streams indexed by row position.
///
/// Lives for the whole client session. Mutation goes through `&mut self`, so
/// callers sharing a store across tasks must wrap it in a lock.
#[derive(Debug, Default)]
pub struct KeyStreamStore {
    streams: Vec<KeyStream>,
}

impl KeyStreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&KeyStream> {
        self.streams.get(index)
    }

    /// Append both streams, returning their new positions
    pub fn append(&mut self, pair: KeyStreamPair) -> (usize, usize) {
        let index_a = self.streams.len();
        self.streams.push(pair.a);
        self.streams.push(pair.b);
        (index_a, index_a + 1)
    }

    /// Check that `a` and `b` name two distinct existing rows
    pub fn check_pair(&self, a: usize, b: usize) -> Result<()> {
        if a == b {
            return Err(Error::DuplicateIndex(a));
        }
        let len = self.streams.len();
        for index in [a, b] {
            if index >= len {
                return Err(Error::IndexOutOfBounds { index, len });
            }
        }
        Ok(())
    }

    /// Install `pair` at rows `a` and `b`, returning the streams they held.
    ///
    /// Both indices are validated before either slot is touched, so a failed
    /// call leaves the store unchanged.
    pub fn swap_at(&mut self, a: usize, b: usize, pair: KeyStreamPair) -> Result<(KeyStream, KeyStream)> {
        self.check_pair(a, b)?;
        let old_a = std::mem::replace(&mut self.streams[a], pair.a);
        let old_b = std::mem::replace(&mut self.streams[b], pair.b);
        tracing::debug!(a, b, "Replaced key streams");
        Ok((old_a, old_b))
    }

    /// Drop every stream (session teardown)
    pub fn clear(&mut self) {
        self.streams.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(tag: &str) -> KeyStream {
        KeyStream::new(vec![format!("{}0", tag), format!("{}1", tag)])
    }

    fn pair(a: &str, b: &str) -> KeyStreamPair {
        KeyStreamPair::new(stream(a), stream(b))
    }

    #[test]
    fn test_append_returns_consecutive_indices() {
        let mut store = KeyStreamStore::new();
        for k in 0..4 {
            let indices = store.append(pair("a", "b"));
            assert_eq!(indices, (2 * k, 2 * k + 1));
        }
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn test_swap_returns_previous_and_installs_new() {
        let mut store = KeyStreamStore::new();
        store.append(pair("a", "b"));
        store.append(pair("c", "d"));

        let (old_a, old_b) = store.swap_at(3, 0, pair("e", "f")).unwrap();
        assert_eq!(old_a, stream("d"));
        assert_eq!(old_b, stream("a"));

        assert_eq!(store.get(3), Some(&stream("e")));
        assert_eq!(store.get(0), Some(&stream("f")));
        assert_eq!(store.get(1), Some(&stream("b")));
        assert_eq!(store.get(2), Some(&stream("c")));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_swap_out_of_range_leaves_store_untouched() {
        let mut store = KeyStreamStore::new();
        store.append(pair("a", "b"));

        let err = store.swap_at(0, 2, pair("x", "y")).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { index: 2, len: 2 }));
        assert_eq!(store.get(0), Some(&stream("a")));
        assert_eq!(store.get(1), Some(&stream("b")));
    }

    #[test]
    fn test_swap_duplicate_index_rejected() {
        let mut store = KeyStreamStore::new();
        store.append(pair("a", "b"));
        assert!(matches!(
            store.swap_at(1, 1, pair("x", "y")),
            Err(Error::DuplicateIndex(1))
        ));
    }

    #[test]
    fn test_clear_empties_store() {
        let mut store = KeyStreamStore::new();
        store.append(pair("a", "b"));
        store.clear();
        assert!(store.is_empty());
        assert!(store.swap_at(0, 1, pair("x", "y")).is_err());
    }
}
