//! statetree_core: hierarchical state-machine engine.
//!
//! Design goals:
//! - Pure, testable logic (no I/O, no runtime).
//! - Explicit types; no macro wizardry.
//! - Small, stable public API surface.

pub mod error;

/// Hierarchical state tree, faults and engine phases.
pub mod machine;

pub use error::{CoreError, Result};
pub use machine::{Machine, StateBehavior, StateDef, StateTree, TreeBuilder};
