//! Transition events, published after every completed engine step.
//!
//! Hosts subscribe through [`StateTree::subscribe_transitions`](super::StateTree::subscribe_transitions)
//! and may forward them to whatever observability they use.

/// What kind of step produced the event.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TransitionKind {
    Start,
    /// `transition_to` / `transition_to_entry` (entry point 0 is the default).
    Direct { entry_point: u32 },
    History { deep: bool },
    Stop,
}

/// Emitted after a transition completed.
///
/// `from` is `None` on start, `to` is `None` on stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent<K> {
    /// Monotonic within one run; restarts at 1 after `reset()`.
    pub sequence: u64,
    pub kind: TransitionKind,
    pub from: Option<K>,
    pub to: Option<K>,
}
