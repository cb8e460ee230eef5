//! Reference machine used by the walk tool.
//!
//! ```text
//! Root (initial A)
//! ├── A (initial A1; entry 1 -> A2, entry 2 -> B)
//! │   ├── A1
//! │   ├── A2
//! │   └── B
//! └── C
//! ```

use statetree_core::error::Result;
use statetree_core::machine::{
    Context, Entry, EventContext, EventOutcome, Fault, Machine, StateBehavior, StateDef,
    StateTree, TreeBuilder,
};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemoState {
    Root,
    A,
    A1,
    A2,
    B,
    C,
}

pub const ALL_DEMO_STATES: [DemoState; 6] = [
    DemoState::Root,
    DemoState::A,
    DemoState::A1,
    DemoState::A2,
    DemoState::B,
    DemoState::C,
];

impl DemoState {
    pub const fn label(self) -> &'static str {
        match self {
            DemoState::Root => "Root",
            DemoState::A => "A",
            DemoState::A1 => "A1",
            DemoState::A2 => "A2",
            DemoState::B => "B",
            DemoState::C => "C",
        }
    }

    /// Case-insensitive lookup by label.
    pub fn from_label(label: &str) -> Option<Self> {
        ALL_DEMO_STATES
            .into_iter()
            .find(|state| state.label().eq_ignore_ascii_case(label))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoEvent {
    /// A1 -> A2 -> B, anything else in A -> C.
    Next,
    /// From C: back into A through shallow history.
    Back,
    /// Anywhere: restart from the root's initial state.
    Home,
}

impl DemoEvent {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "next" => Some(DemoEvent::Next),
            "back" => Some(DemoEvent::Back),
            "home" => Some(DemoEvent::Home),
            _ => None,
        }
    }
}

/// Controllable of the reference machine: a record of what happened.
#[derive(Debug, Default)]
pub struct WalkLog {
    pub lines: Vec<String>,
}

pub struct Demo;

impl Machine for Demo {
    type Key = DemoState;
    type Controllable = WalkLog;
    type Event = DemoEvent;
}

/// Logs every callback and implements the event table of [`DemoEvent`].
struct Announce;

impl Announce {
    fn record(ctx: &mut Context<'_, Demo>, line: String) {
        info!("{line}");
        ctx.controllable_mut().lines.push(line);
    }
}

impl StateBehavior<Demo> for Announce {
    fn on_enter(&mut self, entry: Entry, ctx: &mut Context<'_, Demo>) {
        let line = format!("enter {} ({entry:?})", ctx.key().label());
        Self::record(ctx, line);
    }

    fn on_exit(&mut self, ctx: &mut Context<'_, Demo>) {
        let line = format!("exit {}", ctx.key().label());
        Self::record(ctx, line);
    }

    fn on_event(&mut self, event: &DemoEvent, ctx: &mut EventContext<'_, Demo>) -> EventOutcome {
        use DemoEvent::*;
        use DemoState::*;

        match (ctx.key(), event) {
            (A1, Next) => ctx.transition_to(A2),
            (A2, Next) => ctx.transition_to(B),
            (A, Next) => ctx.transition_to(C),
            (C, Back) => ctx.transition_to_history(A, false),
            (Root, Home) => ctx.transition_to(Root),
            _ => return EventOutcome::Unhandled,
        }
        EventOutcome::Handled
    }

    fn on_error(&mut self, fault: &Fault<DemoState>, ctx: &mut Context<'_, Demo>) {
        let line = format!("fault {fault}");
        Self::record(ctx, line);
    }
}

/// Build the reference tree with a fresh [`WalkLog`].
pub fn build() -> Result<StateTree<Demo>> {
    use DemoState::*;

    TreeBuilder::new()
        .state(StateDef::new(Root, || Announce).initial(A))
        .state(
            StateDef::new(A, || Announce)
                .parent(Root)
                .initial(A1)
                .entry_point(1, A2)
                .entry_point(2, B),
        )
        .state(StateDef::new(A1, || Announce).parent(A))
        .state(StateDef::new(A2, || Announce).parent(A))
        .state(StateDef::new(B, || Announce).parent(A))
        .state(StateDef::new(C, || Announce).parent(Root))
        .build(WalkLog::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_case_insensitively() {
        for state in ALL_DEMO_STATES {
            assert_eq!(DemoState::from_label(state.label()), Some(state));
        }
        assert_eq!(DemoState::from_label("a2"), Some(DemoState::A2));
        assert_eq!(DemoState::from_label("Z"), None);
    }

    #[test]
    fn next_walks_through_a_then_leaves() {
        let mut tree = build().unwrap();
        tree.start().unwrap();

        let leaves: Vec<_> = (0..3)
            .map(|_| tree.dispatch(&DemoEvent::Next).unwrap().leaf)
            .collect();
        assert_eq!(leaves, [DemoState::A2, DemoState::B, DemoState::C]);

        let back = tree.dispatch(&DemoEvent::Back).unwrap();
        assert_eq!(back.leaf, DemoState::B);
    }

    #[test]
    fn home_restarts_from_root() {
        let mut tree = build().unwrap();
        tree.start().unwrap();
        tree.transition_to(DemoState::C).unwrap();

        let home = tree.dispatch(&DemoEvent::Home).unwrap();
        assert_eq!(home.handled_by, Some(DemoState::Root));
        assert_eq!(home.leaf, DemoState::A1);
    }
}
