// Copyright (c) 2024-2025 txflow Contributors.
// SPDX-License-Identifier: Apache-2.0
//
//! Rollback policy
//!
//! A pure decision layer: given an optional failure and the rules declared at
//! a transactional boundary, decide whether the frame should commit or roll
//! back. Nothing here touches the context stack or the resource layer.
//!
//! Instead of a checked/unchecked type distinction, every application failure
//! kind carries an explicit rollback-eligibility attribute through the
//! [`FailureSpec`] trait. Explicit per-boundary rules override that default
//! classification in either direction.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Classification contract for application failures.
///
/// Implemented by the error types a transactional body can return. `kind`
/// names the failure for rule matching; `rollback_eligible` is the default
/// classification applied when no explicit rule matches (`true` corresponds
/// to a runtime-class failure, `false` to a declared/expected one).
pub trait FailureSpec: std::error::Error {
    /// Stable name of this failure kind, matched against declared rules
    fn kind(&self) -> &str;

    /// Default classification: does this failure roll the transaction back
    /// when no explicit rule matches its kind?
    fn rollback_eligible(&self) -> bool;
}

/// Action a frame should take on completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxAction {
    Commit,
    Rollback,
}

/// Declared rollback rules for one transactional boundary.
///
/// `rollback_for` forces rollback for kinds that would commit by default;
/// `no_rollback_for` forces commit for kinds that would roll back by default.
/// A kind named in both sets rolls back: a contradictory declaration resolves
/// toward the safe side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRules {
    rollback_for: BTreeSet<String>,
    no_rollback_for: BTreeSet<String>,
}

impl RollbackRules {
    /// Rules with only the default classification
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kind that must roll back
    pub fn rollback_for(mut self, kind: impl Into<String>) -> Self {
        self.rollback_for.insert(kind.into());
        self
    }

    /// Add a kind that must commit
    pub fn no_rollback_for(mut self, kind: impl Into<String>) -> Self {
        self.no_rollback_for.insert(kind.into());
        self
    }

    /// Check whether a kind is explicitly forced to roll back
    pub fn forces_rollback(&self, kind: &str) -> bool {
        self.rollback_for.contains(kind)
    }

    /// Check whether a kind is explicitly forced to commit
    pub fn forces_commit(&self, kind: &str) -> bool {
        !self.forces_rollback(kind) && self.no_rollback_for.contains(kind)
    }

    /// Decide the completion action for an optional failure.
    ///
    /// No failure always commits. Otherwise explicit rules win over the
    /// failure's own `rollback_eligible` attribute.
    pub fn decide(&self, failure: Option<&dyn FailureSpec>) -> TxAction {
        let failure = match failure {
            Some(failure) => failure,
            None => return TxAction::Commit,
        };
        if self.forces_rollback(failure.kind()) {
            return TxAction::Rollback;
        }
        if self.forces_commit(failure.kind()) {
            return TxAction::Commit;
        }
        if failure.rollback_eligible() {
            TxAction::Rollback
        } else {
            TxAction::Commit
        }
    }
}
