// Copyright (c) 2024-2025 txflow Contributors.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction engine error types

use thiserror::Error;

use crate::resource::ResourceError;

/// Errors raised by the transaction engine itself
#[derive(Error, Debug)]
pub enum TxError {
    /// The owning frame tried to commit but a descendant had marked the
    /// transaction rollback-only; the transaction was physically rolled back.
    #[error("Transaction silently rolled back: marked rollback-only by a nested operation")]
    UnexpectedRollback,

    /// A frame token was completed twice or out of stack order.
    #[error("Completion mismatch: {0}")]
    CompletionMismatch(String),

    /// A resource operation was requested with no active transaction.
    #[error("No active transaction in this context")]
    NoActiveTransaction,

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),
}

/// Error surfaced by [`TransactionManager::execute`](super::TransactionManager::execute):
/// either the wrapped body's own failure, propagated unchanged after
/// completion ran, or an engine error raised at the boundary.
#[derive(Error, Debug)]
pub enum ExecError<E: std::error::Error> {
    #[error(transparent)]
    Failure(E),

    #[error(transparent)]
    Tx(#[from] TxError),
}

impl<E: std::error::Error> ExecError<E> {
    /// The body's failure, if that is what this error carries
    pub fn failure(&self) -> Option<&E> {
        match self {
            ExecError::Failure(e) => Some(e),
            ExecError::Tx(_) => None,
        }
    }

    /// Check for the unexpected-rollback signal
    pub fn is_unexpected_rollback(&self) -> bool {
        matches!(self, ExecError::Tx(TxError::UnexpectedRollback))
    }
}
