// Copyright (c) 2024-2025 txflow Contributors.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction state types
//!
//! This module defines the value types of the propagation engine: transaction
//! identifiers, propagation modes, completion outcomes, the per-call-site
//! [`TransactionDefinition`], and the [`Transaction`] frame token handed out
//! by `begin` and consumed by `complete`.

use serde::{Deserialize, Serialize};

use super::policy::RollbackRules;

/// Unique identifier for a physical transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxnId(u64);

impl TxnId {
    /// Create a TxnId from a raw sequence value
    pub fn from_u64(id: u64) -> Self {
        TxnId(id)
    }

    /// Get the underlying ID value
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Propagation modes governing how a nested transactional call relates to its
/// caller's transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Propagation {
    /// Join the caller's transaction if one is active, otherwise start one
    Required,
    /// Always start an independent physical transaction, suspending any
    /// active one for the duration of the call
    RequiresNew,
}

impl Propagation {
    /// Get string representation for display
    pub fn as_str(&self) -> &'static str {
        match self {
            Propagation::Required => "REQUIRED",
            Propagation::RequiresNew => "REQUIRES_NEW",
        }
    }
}

impl std::fmt::Display for Propagation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Propagation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "REQUIRED" => Ok(Propagation::Required),
            "REQUIRES NEW" | "REQUIRES_NEW" => Ok(Propagation::RequiresNew),
            _ => Err(format!("Unknown propagation mode: {}", s)),
        }
    }
}

/// How a completed frame ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionOutcome {
    /// Committed (physically at an owning frame, logically at a joined one)
    Committed,
    /// Rolled back (physically at an owning frame; at a joined frame this
    /// means the rollback was deferred to the owner via the rollback-only mark)
    RolledBack,
    /// The owning frame tried to commit but a descendant had already forced
    /// the transaction into rollback-only state; a physical rollback was
    /// issued instead
    UnexpectedRollback,
}

impl CompletionOutcome {
    /// Get string representation for display
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionOutcome::Committed => "COMMITTED",
            CompletionOutcome::RolledBack => "ROLLED_BACK",
            CompletionOutcome::UnexpectedRollback => "UNEXPECTED_ROLLBACK",
        }
    }

    /// Check whether this outcome means the transaction's effects are gone
    pub fn is_rollback(&self) -> bool {
        !matches!(self, CompletionOutcome::Committed)
    }
}

impl std::fmt::Display for CompletionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declarative description of one transactional boundary.
///
/// The replacement for an annotation-driven decorator: callers build a
/// definition once per boundary and pass it to
/// [`TransactionManager::execute`](super::TransactionManager::execute).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDefinition {
    label: String,
    propagation: Propagation,
    rules: RollbackRules,
}

impl TransactionDefinition {
    /// A `REQUIRED` boundary with default rollback rules
    pub fn required(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            propagation: Propagation::Required,
            rules: RollbackRules::default(),
        }
    }

    /// A `REQUIRES_NEW` boundary with default rollback rules
    pub fn requires_new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            propagation: Propagation::RequiresNew,
            rules: RollbackRules::default(),
        }
    }

    /// Force rollback for a failure kind that would commit by default
    pub fn rollback_for(mut self, kind: impl Into<String>) -> Self {
        self.rules = self.rules.rollback_for(kind);
        self
    }

    /// Force commit for a failure kind that would roll back by default
    pub fn no_rollback_for(mut self, kind: impl Into<String>) -> Self {
        self.rules = self.rules.no_rollback_for(kind);
        self
    }

    /// Human-readable name of this boundary, carried into log output
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Propagation mode of this boundary
    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    /// Declared rollback rules of this boundary
    pub fn rules(&self) -> &RollbackRules {
        &self.rules
    }
}

/// Token for one logical transaction frame.
///
/// Returned by `begin`, consumed exactly once by `complete`. The serial ties
/// the token to its stack frame so double or out-of-order completion is
/// detected at runtime.
#[derive(Debug)]
pub struct Transaction {
    serial: u64,
    id: TxnId,
    label: String,
    propagation: Propagation,
    is_new: bool,
    rules: RollbackRules,
}

impl Transaction {
    pub(crate) fn new(
        serial: u64,
        id: TxnId,
        definition: &TransactionDefinition,
        is_new: bool,
    ) -> Self {
        Self {
            serial,
            id,
            label: definition.label.clone(),
            propagation: definition.propagation,
            is_new,
            rules: definition.rules.clone(),
        }
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    pub(crate) fn rules(&self) -> &RollbackRules {
        &self.rules
    }

    /// Identifier of the physical transaction this frame runs in
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Label of the boundary that opened this frame
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Propagation mode this frame was opened with
    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    /// True if this frame created the physical transaction and therefore owns
    /// its commit or rollback
    pub fn is_new(&self) -> bool {
        self.is_new
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[{}, {}, {}]",
            self.label,
            self.id,
            self.propagation,
            if self.is_new { "new" } else { "joined" }
        )
    }
}
