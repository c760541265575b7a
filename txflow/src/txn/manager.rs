// Copyright (c) 2024-2025 txflow Contributors.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction manager implementation
//!
//! The engine behind every transactional boundary. `begin` opens or joins a
//! transaction according to the propagation mode, `complete` decides and
//! issues the physical outcome, and `execute` wraps a unit of work so the two
//! are always paired on every exit path.
//!
//! The invariant everything here protects: a physical transaction is begun
//! and completed exactly once, at the frame that created it, and once any
//! descendant marks it rollback-only it can never be committed. An owning
//! frame that tries anyway gets a physical rollback and the
//! [`UnexpectedRollback`](CompletionOutcome::UnexpectedRollback) signal.

use std::sync::atomic::{AtomicU64, Ordering};

use super::context::TransactionContext;
use super::error::{ExecError, TxError};
use super::policy::{FailureSpec, TxAction};
use super::state::{CompletionOutcome, Propagation, Transaction, TransactionDefinition, TxnId};
use crate::resource::{ResourceFactory, ResourceHandle};

/// Transaction manager: opens, joins, suspends, and completes transactions
/// according to propagation semantics.
///
/// One manager serves any number of call chains; each chain threads its own
/// [`TransactionContext`] through its calls.
pub struct TransactionManager<F: ResourceFactory> {
    factory: F,
    next_txn_id: AtomicU64,
    next_serial: AtomicU64,
    /// Physical commits issued (for monitoring)
    total_committed: AtomicU64,
    /// Physical rollbacks issued (for monitoring)
    total_rolled_back: AtomicU64,
    /// Subset of rollbacks that surfaced as unexpected (for monitoring)
    total_unexpected: AtomicU64,
}

impl<F: ResourceFactory> TransactionManager<F> {
    /// Create a new transaction manager over a resource factory
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            next_txn_id: AtomicU64::new(1),
            next_serial: AtomicU64::new(1),
            total_committed: AtomicU64::new(0),
            total_rolled_back: AtomicU64::new(0),
            total_unexpected: AtomicU64::new(0),
        }
    }

    /// Create a fresh context for a new call chain
    pub fn context(&self) -> TransactionContext<F::Handle> {
        TransactionContext::new()
    }

    /// Open or join a transaction for one frame.
    ///
    /// `Required` joins the chain's active transaction when there is one.
    /// Otherwise, and always for `RequiresNew`, any active transaction is
    /// suspended beneath a freshly begun physical transaction. The returned
    /// token must be handed to [`complete`](Self::complete) exactly once.
    pub fn begin(
        &self,
        ctx: &TransactionContext<F::Handle>,
        definition: &TransactionDefinition,
    ) -> Result<Transaction, TxError> {
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst);

        match definition.propagation() {
            Propagation::Required => {
                if let Some(owner_id) = ctx.push_joined(serial) {
                    log::debug!("Joining transaction {} for '{}'", owner_id, definition.label());
                    return Ok(Transaction::new(serial, owner_id, definition, false));
                }
            }
            Propagation::RequiresNew => {
                if let Some(suspended) = ctx.current_id() {
                    log::debug!(
                        "Suspending transaction {} for '{}'",
                        suspended,
                        definition.label()
                    );
                }
            }
        }

        let mut handle = self.factory.open()?;
        handle.begin()?;
        let id = TxnId::from_u64(self.next_txn_id.fetch_add(1, Ordering::SeqCst));
        ctx.push_owner(serial, id, handle);
        log::debug!(
            "Began physical transaction {} for '{}' ({})",
            id,
            definition.label(),
            definition.propagation()
        );
        Ok(Transaction::new(serial, id, definition, true))
    }

    /// Complete one frame, deciding commit vs rollback from the frame's
    /// declared rules and the (optional) failure raised by its body.
    ///
    /// A joined frame never touches the physical transaction: a rollback
    /// decision only marks the owner rollback-only and returns normally. The
    /// owning frame issues the single physical completion and pops itself,
    /// resuming any suspended transaction beneath it. Completing the same
    /// token twice, or out of stack order, is a loud
    /// [`CompletionMismatch`](TxError::CompletionMismatch).
    pub fn complete(
        &self,
        ctx: &TransactionContext<F::Handle>,
        tx: &Transaction,
        failure: Option<&dyn FailureSpec>,
    ) -> Result<CompletionOutcome, TxError> {
        let action = tx.rules().decide(failure);
        let popped = ctx.pop(tx.serial())?;

        let mut physical = match popped.physical {
            Some(physical) => physical,
            None => {
                // Joined frame: defer any rollback to the owning frame.
                if action == TxAction::Rollback {
                    if let Some(owner) = ctx.mark_rollback_only() {
                        log::warn!(
                            "Participating frame '{}' failed, marking {} rollback-only",
                            tx.label(),
                            owner
                        );
                    }
                    return Ok(CompletionOutcome::RolledBack);
                }
                log::debug!("Released joined frame '{}' on {}", tx.label(), tx.id());
                return Ok(CompletionOutcome::Committed);
            }
        };

        let outcome = if action == TxAction::Rollback {
            physical.handle.rollback()?;
            log::info!("Rolled back {} at '{}'", tx.id(), tx.label());
            CompletionOutcome::RolledBack
        } else if physical.rollback_only {
            // Tried to commit, found the rollback-only mark. Never commit;
            // surface the mismatch unless this frame saw a failure itself.
            physical.handle.rollback()?;
            if failure.is_some() {
                log::info!("Rolled back {} at '{}' (rollback-only)", tx.id(), tx.label());
                CompletionOutcome::RolledBack
            } else {
                log::warn!(
                    "Commit attempt on {} at '{}' found rollback-only mark, rolled back",
                    tx.id(),
                    tx.label()
                );
                CompletionOutcome::UnexpectedRollback
            }
        } else {
            physical.handle.commit()?;
            log::info!("Committed {} at '{}'", tx.id(), tx.label());
            CompletionOutcome::Committed
        };

        match outcome {
            CompletionOutcome::Committed => {
                self.total_committed.fetch_add(1, Ordering::Relaxed);
            }
            CompletionOutcome::RolledBack => {
                self.total_rolled_back.fetch_add(1, Ordering::Relaxed);
            }
            CompletionOutcome::UnexpectedRollback => {
                self.total_rolled_back.fetch_add(1, Ordering::Relaxed);
                self.total_unexpected.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(resumed) = ctx.current_id() {
            log::debug!("Resumed suspended transaction {}", resumed);
        }
        Ok(outcome)
    }

    /// Run a unit of work inside a transactional boundary.
    ///
    /// The scoped replacement for decorator-driven boundaries: `begin`, run
    /// the body, then `complete` on every exit path, without ever
    /// suppressing the body's own failure. A body that succeeds over a
    /// transaction a descendant already poisoned gets
    /// [`TxError::UnexpectedRollback`].
    pub fn execute<T, E, B>(
        &self,
        ctx: &TransactionContext<F::Handle>,
        definition: &TransactionDefinition,
        body: B,
    ) -> Result<T, ExecError<E>>
    where
        E: FailureSpec,
        B: FnOnce() -> Result<T, E>,
    {
        let tx = self.begin(ctx, definition)?;
        match body() {
            Ok(value) => match self.complete(ctx, &tx, None)? {
                CompletionOutcome::UnexpectedRollback => Err(TxError::UnexpectedRollback.into()),
                _ => Ok(value),
            },
            Err(failure) => {
                // The original failure always wins over completion errors.
                if let Err(completion_err) = self.complete(ctx, &tx, Some(&failure)) {
                    log::error!(
                        "Completion after failure in '{}' also failed: {}",
                        definition.label(),
                        completion_err
                    );
                }
                Err(ExecError::Failure(failure))
            }
        }
    }

    /// Total physical commits issued
    pub fn total_committed(&self) -> u64 {
        self.total_committed.load(Ordering::Relaxed)
    }

    /// Total physical rollbacks issued
    pub fn total_rolled_back(&self) -> u64 {
        self.total_rolled_back.load(Ordering::Relaxed)
    }

    /// Rollbacks that surfaced as [`CompletionOutcome::UnexpectedRollback`]
    pub fn total_unexpected_rollbacks(&self) -> u64 {
        self.total_unexpected.load(Ordering::Relaxed)
    }
}
