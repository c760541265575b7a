// Copyright (c) 2024-2025 txflow Contributors.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-chain transaction context
//!
//! A [`TransactionContext`] is the explicit replacement for thread-local
//! active-transaction tracking: one context per logical call chain, threaded
//! through calls by the application. It records the stack of transaction
//! frames for that chain. The top frame is the active transaction; frames
//! beneath it are suspended (a `REQUIRES_NEW` owner sits above the frame it
//! suspended until it completes).
//!
//! Independent call chains use independent contexts; operations on one chain
//! are strictly sequential, so the interior mutex is uncontended and exists
//! only so a context value can be cloned into closures and across threads.

use std::sync::Arc;

use parking_lot::Mutex;

use super::error::TxError;
use super::state::TxnId;
use crate::resource::ResourceError;

/// A physical transaction owned by some frame on the stack
#[derive(Debug)]
pub(crate) struct PhysicalTxn<H> {
    pub id: TxnId,
    pub handle: H,
    pub rollback_only: bool,
}

/// One logical frame; `physical` is present iff the frame owns the physical
/// transaction (`is_new` in the public token)
struct Frame<H> {
    serial: u64,
    physical: Option<PhysicalTxn<H>>,
}

/// The frame popped by a completion
#[derive(Debug)]
pub(crate) struct PoppedFrame<H> {
    pub physical: Option<PhysicalTxn<H>>,
}

struct ContextInner<H> {
    frames: Vec<Frame<H>>,
}

/// Process-local record of the transaction stack for one call chain.
///
/// Cheap to clone; all clones share the same stack.
pub struct TransactionContext<H> {
    inner: Arc<Mutex<ContextInner<H>>>,
}

impl<H> Clone for TransactionContext<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H> Default for TransactionContext<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> TransactionContext<H> {
    /// Create an empty context for a new call chain
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ContextInner { frames: Vec::new() })),
        }
    }

    /// Check whether a transaction is active on this chain
    pub fn is_active(&self) -> bool {
        !self.inner.lock().frames.is_empty()
    }

    /// Number of open frames (joined frames included)
    pub fn depth(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// Identifier of the physical transaction the active frame runs in
    pub fn current_id(&self) -> Option<TxnId> {
        let inner = self.inner.lock();
        owner_of_top(&inner.frames).map(|p| p.id)
    }

    /// Check whether the active transaction has been marked rollback-only
    pub fn is_rollback_only(&self) -> bool {
        let inner = self.inner.lock();
        owner_of_top(&inner.frames).map(|p| p.rollback_only).unwrap_or(false)
    }

    /// Run `f` against the handle of the active physical transaction.
    ///
    /// This is how application code writes through the transaction it runs
    /// in. The context is locked for the duration of `f`; do not begin or
    /// complete transactions from inside it.
    pub fn with_resource<R>(
        &self,
        f: impl FnOnce(&mut H) -> Result<R, ResourceError>,
    ) -> Result<R, TxError> {
        let mut inner = self.inner.lock();
        let physical = owner_of_top_mut(&mut inner.frames).ok_or(TxError::NoActiveTransaction)?;
        f(&mut physical.handle).map_err(TxError::from)
    }

    /// Push an owning frame with a freshly begun physical transaction
    pub(crate) fn push_owner(&self, serial: u64, id: TxnId, handle: H) {
        self.inner.lock().frames.push(Frame {
            serial,
            physical: Some(PhysicalTxn {
                id,
                handle,
                rollback_only: false,
            }),
        });
    }

    /// Try to push a joined frame over the active transaction.
    ///
    /// Returns the owner's id, or `None` (pushing nothing) when the chain has
    /// no active transaction to join.
    pub(crate) fn push_joined(&self, serial: u64) -> Option<TxnId> {
        let mut inner = self.inner.lock();
        let owner_id = owner_of_top(&inner.frames).map(|p| p.id)?;
        inner.frames.push(Frame {
            serial,
            physical: None,
        });
        Some(owner_id)
    }

    /// Pop the frame identified by `serial`.
    ///
    /// The frame must be the innermost one; completing a token twice or out
    /// of stack order is a loud error, never a silent double completion.
    pub(crate) fn pop(&self, serial: u64) -> Result<PoppedFrame<H>, TxError> {
        let mut inner = self.inner.lock();
        match inner.frames.pop() {
            Some(frame) if frame.serial == serial => Ok(PoppedFrame {
                physical: frame.physical,
            }),
            Some(frame) => {
                inner.frames.push(frame);
                Err(TxError::CompletionMismatch(
                    "transaction is not the innermost active frame".to_string(),
                ))
            }
            None => Err(TxError::CompletionMismatch(
                "transaction already completed".to_string(),
            )),
        }
    }

    /// Mark the active physical transaction rollback-only; returns its id
    pub(crate) fn mark_rollback_only(&self) -> Option<TxnId> {
        let mut inner = self.inner.lock();
        let physical = owner_of_top_mut(&mut inner.frames)?;
        physical.rollback_only = true;
        Some(physical.id)
    }
}

/// Physical transaction the top frame runs in: the nearest owner at or below
/// the top of the stack
fn owner_of_top<H>(frames: &[Frame<H>]) -> Option<&PhysicalTxn<H>> {
    frames.iter().rev().find_map(|f| f.physical.as_ref())
}

fn owner_of_top_mut<H>(frames: &mut [Frame<H>]) -> Option<&mut PhysicalTxn<H>> {
    frames.iter_mut().rev().find_map(|f| f.physical.as_mut())
}
