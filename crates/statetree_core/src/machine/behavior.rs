use std::ops::{Deref, DerefMut};

use super::definition::Machine;
use super::fault::Fault;

/// How a state is being entered.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Entry {
    /// Default entry: start, explicit target with entry point 0, or descent
    /// through initial children.
    Default,
    /// Ancestor of an explicit target, entered on the way down.
    Transit,
    /// Explicit entry point (never 0).
    Point(u32),
    /// Resumed from history.
    History { deep: bool },
}

/// Result of offering an event to a state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EventOutcome {
    Handled,
    /// Let the parent state try.
    Unhandled,
    /// Handling went wrong; reported as `UnknownError`, no bubbling.
    Failed,
}

/// Callbacks of one application state.
///
/// Every method has a no-op default so states only implement what they use.
pub trait StateBehavior<M: Machine> {
    fn on_enter(&mut self, _entry: Entry, _ctx: &mut Context<'_, M>) {}

    fn on_exit(&mut self, _ctx: &mut Context<'_, M>) {}

    fn on_event(&mut self, _event: &M::Event, _ctx: &mut EventContext<'_, M>) -> EventOutcome {
        EventOutcome::Unhandled
    }

    /// A fault originated in this state.
    fn on_error(&mut self, _fault: &Fault<M::Key>, _ctx: &mut Context<'_, M>) {}

    /// The tree is stopping and drops this instance afterwards.
    fn on_dispose(&mut self, _ctx: &mut Context<'_, M>) {}
}

impl<M: Machine> StateBehavior<M> for () {}

/// What a callback may see and touch.
pub struct Context<'a, M: Machine> {
    key: M::Key,
    parent: Option<M::Key>,
    controllable: &'a mut M::Controllable,
}

impl<'a, M: Machine> Context<'a, M> {
    pub(crate) fn new(
        key: M::Key,
        parent: Option<M::Key>,
        controllable: &'a mut M::Controllable,
    ) -> Self {
        Self {
            key,
            parent,
            controllable,
        }
    }

    /// Key of the state receiving the callback.
    pub fn key(&self) -> M::Key {
        self.key
    }

    pub fn parent(&self) -> Option<M::Key> {
        self.parent
    }

    pub fn controllable(&self) -> &M::Controllable {
        &*self.controllable
    }

    pub fn controllable_mut(&mut self) -> &mut M::Controllable {
        &mut *self.controllable
    }
}

/// Transition requested from an event handler.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TransitionRequest<K> {
    To { target: K, entry_point: u32 },
    History { target: K, deep: bool },
}

/// Context handed to [`StateBehavior::on_event`].
///
/// Handlers cannot re-enter the tree; they leave a request that the tree
/// applies once the handler has returned `Handled`.
pub struct EventContext<'a, M: Machine> {
    inner: Context<'a, M>,
    request: Option<TransitionRequest<M::Key>>,
}

impl<'a, M: Machine> EventContext<'a, M> {
    pub(crate) fn new(inner: Context<'a, M>) -> Self {
        Self {
            inner,
            request: None,
        }
    }

    pub fn transition_to(&mut self, target: M::Key) {
        self.transition_to_entry(target, super::definition::DEFAULT_ENTRY);
    }

    pub fn transition_to_entry(&mut self, target: M::Key, entry_point: u32) {
        self.set_request(TransitionRequest::To {
            target,
            entry_point,
        });
    }

    pub fn transition_to_history(&mut self, target: M::Key, deep: bool) {
        self.set_request(TransitionRequest::History { target, deep });
    }

    pub fn request(&self) -> Option<TransitionRequest<M::Key>> {
        self.request
    }

    pub(crate) fn into_request(self) -> Option<TransitionRequest<M::Key>> {
        self.request
    }

    fn set_request(&mut self, request: TransitionRequest<M::Key>) {
        if let Some(previous) = self.request.replace(request) {
            tracing::debug!(state = ?self.inner.key, ?previous, ?request, "transition request replaced");
        }
    }
}

impl<'a, M: Machine> Deref for EventContext<'a, M> {
    type Target = Context<'a, M>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<'a, M: Machine> DerefMut for EventContext<'a, M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
