// Copyright (c) 2024-2025 txflow Contributors.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory reference backend
//!
//! [`MemoryStore`] is a small key/value store whose handles buffer writes and
//! apply them atomically on commit, making the crate usable and testable
//! without an external database. It also enforces the at-most-once handle
//! state machine from the [`ResourceHandle`] contract, so tests exercising
//! double-completion bugs fail loudly here instead of corrupting state.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{HandleState, ResourceError, ResourceFactory, ResourceHandle};

struct StoreInner {
    rows: BTreeMap<String, String>,
    handles_opened: u64,
}

/// Shared in-memory key/value store.
///
/// Cloning is cheap and yields another view of the same store, so a test can
/// keep one clone for assertions while the transaction manager owns another
/// as its [`ResourceFactory`].
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                rows: BTreeMap::new(),
                handles_opened: 0,
            })),
        }
    }

    /// Read a committed value
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().rows.get(key).cloned()
    }

    /// Check whether a committed row exists
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().rows.contains_key(key)
    }

    /// Number of committed rows
    pub fn len(&self) -> usize {
        self.inner.lock().rows.len()
    }

    /// Check whether the store holds no committed rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of handles ever opened against this store.
    ///
    /// Lets tests verify how many physical transactions a call chain used.
    pub fn handles_opened(&self) -> u64 {
        self.inner.lock().handles_opened
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceFactory for MemoryStore {
    type Handle = MemoryHandle;

    fn open(&self) -> Result<MemoryHandle, ResourceError> {
        self.inner.lock().handles_opened += 1;
        Ok(MemoryHandle {
            store: Arc::clone(&self.inner),
            buffer: Vec::new(),
            state: HandleState::Idle,
        })
    }
}

/// A buffering handle into a [`MemoryStore`].
///
/// Writes made through [`MemoryHandle::put`] stay in a private buffer until
/// `commit` applies them to the shared store; `rollback` discards them.
pub struct MemoryHandle {
    store: Arc<Mutex<StoreInner>>,
    buffer: Vec<(String, String)>,
    state: HandleState,
}

impl MemoryHandle {
    /// Current lifecycle state of this handle
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Buffer a write; visible to the store only after commit
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), ResourceError> {
        if self.state != HandleState::Active {
            return Err(ResourceError::HandleMisuse {
                operation: "write",
                state: self.state.as_str(),
            });
        }
        self.buffer.push((key.into(), value.into()));
        Ok(())
    }

    fn transition(&mut self, operation: &'static str, to: HandleState) -> Result<(), ResourceError> {
        let expected = match to {
            HandleState::Active => HandleState::Idle,
            _ => HandleState::Active,
        };
        if self.state != expected {
            return Err(ResourceError::HandleMisuse {
                operation,
                state: self.state.as_str(),
            });
        }
        self.state = to;
        Ok(())
    }
}

impl ResourceHandle for MemoryHandle {
    fn begin(&mut self) -> Result<(), ResourceError> {
        self.transition("begin", HandleState::Active)
    }

    fn commit(&mut self) -> Result<(), ResourceError> {
        self.transition("commit", HandleState::Committed)?;
        let mut inner = self.store.lock();
        for (key, value) in self.buffer.drain(..) {
            inner.rows.insert(key, value);
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ResourceError> {
        self.transition("rollback", HandleState::RolledBack)?;
        self.buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_applies_buffered_writes() {
        let store = MemoryStore::new();
        let mut handle = store.open().unwrap();

        handle.begin().unwrap();
        handle.put("member/alice", "alice").unwrap();
        assert!(!store.contains("member/alice"));

        handle.commit().unwrap();
        assert_eq!(store.get("member/alice").as_deref(), Some("alice"));
    }

    #[test]
    fn test_rollback_discards_buffered_writes() {
        let store = MemoryStore::new();
        let mut handle = store.open().unwrap();

        handle.begin().unwrap();
        handle.put("member/bob", "bob").unwrap();
        handle.rollback().unwrap();

        assert!(store.is_empty());
    }

    #[test]
    fn test_write_before_begin_is_misuse() {
        let store = MemoryStore::new();
        let mut handle = store.open().unwrap();

        let err = handle.put("k", "v").unwrap_err();
        assert!(matches!(
            err,
            ResourceError::HandleMisuse { operation: "write", state: "idle" }
        ));
    }

    #[test]
    fn test_double_commit_is_misuse() {
        let store = MemoryStore::new();
        let mut handle = store.open().unwrap();

        handle.begin().unwrap();
        handle.commit().unwrap();

        let err = handle.commit().unwrap_err();
        assert!(matches!(
            err,
            ResourceError::HandleMisuse { operation: "commit", state: "committed" }
        ));
    }

    #[test]
    fn test_commit_after_rollback_is_misuse() {
        let store = MemoryStore::new();
        let mut handle = store.open().unwrap();

        handle.begin().unwrap();
        handle.rollback().unwrap();

        let err = handle.commit().unwrap_err();
        assert!(matches!(err, ResourceError::HandleMisuse { .. }));
        assert_eq!(handle.state(), HandleState::RolledBack);
    }

    #[test]
    fn test_handles_opened_counter() {
        let store = MemoryStore::new();
        let _a = store.open().unwrap();
        let _b = store.open().unwrap();
        assert_eq!(store.handles_opened(), 2);
    }
}
