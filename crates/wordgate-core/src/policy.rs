//! Bounded denylist store and per-worker snapshots.
//!
//! The [`PolicyStore`] is owned by the proxy's accept loop and mutated only
//! through control-channel commands. Every accepted client connection gets
//! an owned [`PolicySnapshot`] cloned at accept time, so a later `BLOCK` or
//! `UNBLOCK` is visible only to workers accepted after it. That staleness
//! window is deliberate: it removes every lock from the request path.

use crate::error::{PolicyError, Result};

/// Default maximum number of denylisted words.
pub const DEFAULT_CAPACITY: usize = 10;

/// Default maximum length of a single word, in bytes.
pub const DEFAULT_MAX_WORD_LEN: usize = 50;

/// Mutable denylist, bounded in word count and per-word length.
///
/// Words are case-sensitive literal substrings, not patterns. Adding a word
/// past capacity is rejected rather than evicting an older entry, so the
/// operator learns (via the proxy log) that the command had no effect.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    words: Vec<String>,
    capacity: usize,
    max_word_len: usize,
}

impl PolicyStore {
    /// Creates an empty store with the default bounds.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CAPACITY, DEFAULT_MAX_WORD_LEN)
    }

    /// Creates an empty store with explicit capacity and word-length bounds.
    pub fn with_limits(capacity: usize, max_word_len: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity),
            capacity,
            max_word_len,
        }
    }

    /// Appends a word to the denylist.
    ///
    /// Rejects empty words, words longer than the configured bound, and any
    /// word once the store is at capacity. The store is unchanged on error.
    pub fn add(&mut self, word: &str) -> Result<()> {
        if word.is_empty() {
            return Err(PolicyError::EmptyWord);
        }
        if word.len() > self.max_word_len {
            return Err(PolicyError::WordTooLong {
                max: self.max_word_len,
            });
        }
        if self.words.len() >= self.capacity {
            return Err(PolicyError::Full(self.capacity));
        }
        self.words.push(word.to_string());
        Ok(())
    }

    /// Removes every word from the denylist.
    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Returns true if any stored word occurs in `text` as a literal,
    /// case-sensitive substring.
    pub fn matches(&self, text: &str) -> bool {
        self.words.iter().any(|w| text.contains(w.as_str()))
    }

    /// Returns an owned copy of the current denylist for one worker.
    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            words: self.words.clone(),
        }
    }

    /// Number of words currently stored.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns true if no words are stored.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Maximum number of words the store accepts.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Maximum accepted word length, in bytes.
    pub fn max_word_len(&self) -> usize {
        self.max_word_len
    }

    /// The stored words, in insertion order.
    pub fn words(&self) -> &[String] {
        &self.words
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable copy of the denylist owned by one worker.
///
/// Taken from [`PolicyStore::snapshot`] when the connection is accepted;
/// never updated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySnapshot {
    words: Vec<String>,
}

impl PolicySnapshot {
    /// Returns true if any snapshotted word occurs in `text` as a literal,
    /// case-sensitive substring.
    pub fn matches(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    /// Returns the first snapshotted word occurring in `text`, if any.
    ///
    /// Used by deep inspection to log which word triggered the re-fetch.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.words
            .iter()
            .find(|w| text.contains(w.as_str()))
            .map(String::as_str)
    }

    /// Number of words in the snapshot.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns true if the snapshot holds no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(words: &[&str]) -> PolicyStore {
        let mut store = PolicyStore::new();
        for word in words {
            store.add(word).unwrap();
        }
        store
    }

    #[test]
    fn starts_empty() {
        let store = PolicyStore::new();
        assert!(store.is_empty());
        assert_eq!(store.capacity(), DEFAULT_CAPACITY);
        assert_eq!(store.max_word_len(), DEFAULT_MAX_WORD_LEN);
    }

    #[test]
    fn add_and_match_substring() {
        let store = store_with(&["blocked"]);
        assert!(store.matches("http://example.test/blocked-page"));
        assert!(!store.matches("http://example.test/open-page"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let store = store_with(&["Blocked"]);
        assert!(!store.matches("http://example.test/blocked-page"));
        assert!(store.matches("http://example.test/Blocked-page"));
    }

    #[test]
    fn matches_any_stored_word() {
        let store = store_with(&["alpha", "beta"]);
        assert!(store.matches("a beta page"));
        assert!(store.matches("an alpha page"));
        assert!(!store.matches("a gamma page"));
    }

    #[test]
    fn clear_empties_the_store() {
        let mut store = store_with(&["alpha", "beta"]);
        store.clear();
        assert!(store.is_empty());
        assert!(!store.matches("alpha"));
    }

    #[test]
    fn rejects_word_at_capacity() {
        let mut store = PolicyStore::with_limits(2, 50);
        store.add("one").unwrap();
        store.add("two").unwrap();
        assert_eq!(store.add("three"), Err(PolicyError::Full(2)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn rejects_over_long_word() {
        let mut store = PolicyStore::with_limits(10, 4);
        assert_eq!(
            store.add("toolong"),
            Err(PolicyError::WordTooLong { max: 4 })
        );
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_empty_word() {
        let mut store = PolicyStore::new();
        assert_eq!(store.add(""), Err(PolicyError::EmptyWord));
    }

    #[test]
    fn snapshot_is_independent_of_later_updates() {
        let mut store = store_with(&["alpha"]);
        let snapshot = store.snapshot();

        store.add("beta").unwrap();
        assert!(store.matches("beta"));
        assert!(!snapshot.matches("beta"));
        assert!(snapshot.matches("alpha"));

        store.clear();
        assert!(snapshot.matches("alpha"));
    }

    #[test]
    fn snapshot_first_match_reports_word() {
        let store = store_with(&["alpha", "beta"]);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.first_match("page with beta inside"), Some("beta"));
        assert_eq!(snapshot.first_match("clean page"), None);
    }

    #[test]
    fn empty_snapshot_matches_nothing() {
        let snapshot = PolicySnapshot::default();
        assert!(snapshot.is_empty());
        assert!(!snapshot.matches("anything"));
    }
}
