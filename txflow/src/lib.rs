// Copyright (c) 2024-2025 txflow Contributors.
// SPDX-License-Identifier: Apache-2.0
//
//! txflow - A declarative transaction-propagation core
//!
//! txflow is the minimal engine behind declarative transaction management:
//! it decides, per call frame, whether to open, join, suspend, commit, or
//! roll back a transaction, independent of any particular storage backend or
//! application framework.
//!
//! # Features
//!
//! - **Propagation modes**: `REQUIRED` joins the caller's transaction,
//!   `REQUIRES_NEW` suspends it behind an independent physical transaction
//! - **Rollback rules**: failures carry an explicit rollback-eligibility
//!   tag; per-boundary `rollback_for` / `no_rollback_for` rules override it
//! - **Rollback-only marking**: a nested frame's failure makes the shared
//!   transaction uncommittable, surfacing as an unexpected-rollback signal
//!   at the frame that tries to commit anyway
//! - **Explicit context**: no thread-local state; each call chain threads a
//!   [`TransactionContext`] through its calls
//! - **Pluggable resources**: any store exposing begin/commit/rollback plugs
//!   in through [`ResourceFactory`]; an in-memory reference backend ships in
//!   [`resource::memory`]
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = MemoryStore::new();
//! let manager = TransactionManager::new(store.clone());
//! let ctx = manager.context();
//!
//! manager.execute(&ctx, &TransactionDefinition::required("signup"), || {
//!     ctx.with_resource(|h| h.put("member/alice", "alice"))?;
//!     Ok(())
//! })?;
//! ```

pub mod resource;
pub mod txn;

// Re-export the public API at the crate root
pub use resource::memory::{MemoryHandle, MemoryStore};
pub use resource::{HandleState, ResourceError, ResourceFactory, ResourceHandle};
pub use txn::{
    CompletionOutcome, ExecError, FailureSpec, Propagation, RollbackRules, Transaction,
    TransactionContext, TransactionDefinition, TransactionManager, TxAction, TxError, TxnId,
};

/// txflow version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// txflow crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
