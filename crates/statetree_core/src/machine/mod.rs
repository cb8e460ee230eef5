//! statetree_core::machine
//!
//! Hierarchical state machine: composite and leaf states, entry points,
//! shallow/deep history.
//!
//! Key ideas:
//! - States are declared with [`StateDef`] and validated by [`TreeBuilder`]
//! - Instances are created lazily by per-state factories and cached per run
//! - Transitions exit leaf-to-root up to the lowest common ancestor, then
//!   enter root-to-leaf; exits never interleave with enters
//! - Protocol violations are [`Fault`]s (reported, non-fatal); broken
//!   definitions and misuse of the engine are [`CoreError`](crate::error::CoreError)s

mod behavior;
mod definition;
mod events;
mod fault;
mod node;
mod phase;
mod topology;
mod tree;

pub use behavior::{Context, Entry, EventContext, EventOutcome, StateBehavior, TransitionRequest};
pub use definition::{EntryRoute, Machine, StateDef, TreeBuilder, DEFAULT_ENTRY};
pub use events::{TransitionEvent, TransitionKind};
pub use fault::{Fault, FaultReason};
pub use phase::{advance, available_commands, Command, Phase, ALL_PHASES};
pub use topology::{StateShape, TreeTopology};
pub use tree::{Dispatch, FaultHook, StateTree};
