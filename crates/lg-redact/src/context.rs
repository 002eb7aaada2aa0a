//! Per-call-chain governance context.
//!
//! A [`GovernanceContext`] is passed explicitly from the code that owns a
//! logical operation down to the engine. It is `Copy`, so moving it into a
//! spawned future or closure carries the relax decision across `.await`
//! points without any thread-local state; concurrent operations that were
//! never handed the context cannot observe it.

use serde::{Deserialize, Serialize};

/// Context carried by one logical logging operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceContext {
    relaxed: bool,
}

impl GovernanceContext {
    /// A context that applies governance normally.
    pub const fn governed() -> Self {
        Self { relaxed: false }
    }

    /// A context that bypasses redaction.
    pub const fn relaxed() -> Self {
        Self { relaxed: true }
    }

    /// Whether redaction is bypassed.
    pub fn is_relaxed(&self) -> bool {
        self.relaxed
    }

    /// Return a copy with the relax flag set.
    pub fn with_relaxed(mut self, relaxed: bool) -> Self {
        self.relaxed = relaxed;
        self
    }

    /// Combine with an enclosing context; a relaxed parent stays relaxed.
    pub fn inherit(self, parent: GovernanceContext) -> Self {
        Self {
            relaxed: self.relaxed || parent.relaxed,
        }
    }
}
