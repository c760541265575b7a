// Copyright (c) 2024-2025 txflow Contributors.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction propagation engine
//!
//! This module implements declarative transaction boundaries over an abstract
//! resource layer: propagation modes, exception-driven rollback rules,
//! rollback-only marking across nested frames, and the unexpected-rollback
//! mismatch signal.
//!
//! # Features
//! - `REQUIRED` / `REQUIRES_NEW` propagation with suspension and resumption
//! - Declarative rollback rules (`rollback_for` / `no_rollback_for`) over a
//!   tagged failure classification
//! - Rollback-only marking: a joined frame's failure poisons the shared
//!   physical transaction for every ancestor
//! - Loud detection of double or out-of-order completion

pub mod context;
pub mod error;
pub mod manager;
pub mod policy;
pub mod state;

pub use context::TransactionContext;
pub use error::{ExecError, TxError};
pub use manager::TransactionManager;
pub use policy::{FailureSpec, RollbackRules, TxAction};
pub use state::{CompletionOutcome, Propagation, Transaction, TransactionDefinition, TxnId};
