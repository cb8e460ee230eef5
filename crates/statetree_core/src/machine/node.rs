use std::collections::BTreeMap;

use super::behavior::StateBehavior;
use super::definition::{EntryRoute, Machine, StateDef};

/// Cached instance of a state.
///
/// Structure is copied from the definition; `current` is the history
/// pointer and survives exits until the tree is stopped or reset.
pub(crate) struct StateNode<M: Machine> {
    pub(crate) key: M::Key,
    pub(crate) parent: Option<M::Key>,
    pub(crate) children: Vec<M::Key>,
    pub(crate) initial: Option<M::Key>,
    pub(crate) entry_points: BTreeMap<u32, EntryRoute<M::Key>>,
    /// Direct child that was active last (or is active now).
    pub(crate) current: Option<M::Key>,
    pub(crate) behavior: Box<dyn StateBehavior<M> + Send>,
}

impl<M: Machine> StateNode<M> {
    pub(crate) fn from_def(def: &StateDef<M>) -> Self {
        tracing::trace!(state = ?def.key, "instantiating state");
        Self {
            key: def.key,
            parent: def.parent,
            children: def.children.clone(),
            initial: def.initial,
            entry_points: def.entry_points.clone(),
            current: None,
            behavior: def.instantiate(),
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
