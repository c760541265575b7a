// Copyright (c) 2024-2025 txflow Contributors.
// SPDX-License-Identifier: Apache-2.0
//
//! Resource layer: the contract between the transaction engine and a backing store
//!
//! The engine never talks to a store directly. It acquires a [`ResourceHandle`]
//! through a [`ResourceFactory`] whenever a frame must own a physical
//! transaction, and issues exactly one `begin` and exactly one `commit` or
//! `rollback` against it. A handle is exclusively owned by the transaction
//! frame that opened it and is never shared across call chains.
//!
//! Misusing a handle (committing twice, committing after a rollback, writing
//! before `begin`) is a programming error and fails loudly with
//! [`ResourceError::HandleMisuse`] rather than being silently ignored.

pub mod memory;

use thiserror::Error;

/// Errors raised by the resource layer
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Handle misuse: cannot {operation} while handle is {state}")]
    HandleMisuse {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Resource unavailable: {0}")]
    Unavailable(String),
}

/// Lifecycle states of a physical resource handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Opened but no physical transaction begun yet
    Idle,
    /// Physical transaction in progress
    Active,
    /// Physical transaction committed; handle is spent
    Committed,
    /// Physical transaction rolled back; handle is spent
    RolledBack,
}

impl HandleState {
    /// Get string representation for display and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleState::Idle => "idle",
            HandleState::Active => "active",
            HandleState::Committed => "committed",
            HandleState::RolledBack => "rolled back",
        }
    }
}

impl std::fmt::Display for HandleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One physical connection/session to a backing store.
///
/// Each operation may be called at most once per handle, in the order
/// `begin` then `commit` or `rollback`.
pub trait ResourceHandle: Send {
    /// Begin the physical transaction on this handle
    fn begin(&mut self) -> Result<(), ResourceError>;

    /// Commit the physical transaction, consuming the handle's usefulness
    fn commit(&mut self) -> Result<(), ResourceError>;

    /// Roll back the physical transaction, consuming the handle's usefulness
    fn rollback(&mut self) -> Result<(), ResourceError>;
}

/// Opens fresh [`ResourceHandle`]s for the transaction engine.
///
/// The engine calls `open` whenever propagation requires a new physical
/// transaction (an outermost `Required` frame or any `RequiresNew` frame).
pub trait ResourceFactory: Send + Sync {
    /// The concrete handle type this factory produces
    type Handle: ResourceHandle;

    /// Open a new handle against the backing store
    fn open(&self) -> Result<Self::Handle, ResourceError>;
}
