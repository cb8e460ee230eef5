use std::collections::HashMap;
use std::fmt;

use tokio::sync::broadcast;

use crate::error::{CoreError, Domain, ErrorKind, Result};

use super::behavior::{Context, Entry, EventContext, EventOutcome, StateBehavior, TransitionRequest};
use super::definition::{Definitions, EntryRoute, Machine, DEFAULT_ENTRY};
use super::events::{TransitionEvent, TransitionKind};
use super::fault::{Fault, FaultReason};
use super::node::StateNode;
use super::phase::{advance, Command, Phase};
use super::topology::{StateShape, TreeTopology};

/// Host-level fault hook. Without one, faults are logged through `tracing`.
pub type FaultHook<K> = Box<dyn FnMut(&Fault<K>) + Send>;

type BehaviorBox<M> = Box<dyn StateBehavior<M> + Send>;

/// Lagging subscribers lose the oldest events instead of stalling the tree.
const TRANSITION_EVENT_CAPACITY: usize = 32;

/// Outcome of [`StateTree::dispatch`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Dispatch<K> {
    /// State whose handler returned `Handled`, if any.
    pub handled_by: Option<K>,
    /// Current leaf after any requested transition.
    pub leaf: K,
}

/// How to continue below a state once it has been entered.
#[derive(Debug, Copy, Clone)]
enum Descent {
    Default,
    Point(u32),
    Shallow,
    Deep,
}

impl Descent {
    fn for_entry_point(entry_point: u32) -> (Entry, Self) {
        if entry_point == DEFAULT_ENTRY {
            (Entry::Default, Descent::Default)
        } else {
            (Entry::Point(entry_point), Descent::Point(entry_point))
        }
    }
}

/// A running hierarchical state machine.
///
/// Owns the validated definitions, the lazily filled instance cache, the
/// current leaf and the controllable. Transitions always run every exit
/// callback (leaf to root) before the first enter callback (root to leaf).
pub struct StateTree<M: Machine> {
    defs: Definitions<M>,
    nodes: HashMap<M::Key, StateNode<M>>,
    leaf: Option<M::Key>,
    phase: Phase,
    controllable: Option<M::Controllable>,
    fault_hook: Option<FaultHook<M::Key>>,
    transitions: broadcast::Sender<TransitionEvent<M::Key>>,
    sequence: u64,
}

/// Engine control (host facing).
impl<M: Machine> StateTree<M> {
    pub(crate) fn from_definitions(defs: Definitions<M>, controllable: M::Controllable) -> Self {
        let (transitions, _rx) = broadcast::channel(TRANSITION_EVENT_CAPACITY);

        Self {
            defs,
            nodes: HashMap::new(),
            leaf: None,
            phase: Phase::Uninitialized,
            controllable: Some(controllable),
            fault_hook: None,
            transitions,
            sequence: 0,
        }
    }

    /// Enter the root and descend through initial children.
    ///
    /// The root's `on_enter` doubles as the machine-level setup hook.
    /// Returns the entered leaf.
    pub fn start(&mut self) -> Result<M::Key> {
        let next = advance(self.phase, Command::Start)?;
        if self.controllable.is_none() {
            return Err(detached());
        }
        self.phase = next;

        let root = self.defs.root;
        tracing::debug!(?root, "starting state tree");
        self.enter_state(root, Entry::Default)?;
        let leaf = self.descend(root, Descent::Default)?;

        self.publish(TransitionKind::Start, None, Some(leaf));
        Ok(leaf)
    }

    /// Exit the active path (the root's `on_exit` is the teardown hook),
    /// dispose every cached state children-first, clear the cache and hand
    /// the controllable back.
    pub fn stop(&mut self) -> Result<Option<M::Controllable>> {
        let next = advance(self.phase, Command::Stop)?;
        let from = self.leaf;
        tracing::debug!(leaf = ?from, cached = self.nodes.len(), "stopping state tree");

        let mut cursor = self.leaf;
        while let Some(key) = cursor {
            self.exit_state(key)?;
            cursor = self.defs.parent_of(key);
        }
        self.dispose_subtree(self.defs.root)?;

        self.nodes.clear();
        self.leaf = None;
        self.phase = next;
        self.publish(TransitionKind::Stop, from, None);

        Ok(self.controllable.take())
    }

    /// Forget cached instances and bookkeeping. Does not start the tree.
    pub fn reset(&mut self) -> Result<()> {
        self.phase = advance(self.phase, Command::Reset)?;
        self.nodes.clear();
        self.leaf = None;
        self.sequence = 0;
        Ok(())
    }

    /// Attach a controllable, returning the previous one.
    ///
    /// Refused while started: states may hold expectations about it.
    pub fn attach(&mut self, controllable: M::Controllable) -> Result<Option<M::Controllable>> {
        if self.phase == Phase::Started {
            return Err(CoreError::warn()
                .domain(Domain::Engine)
                .kind(ErrorKind::InvalidState)
                .msg("cannot attach a controllable while the tree is started")
                .build());
        }
        Ok(self.controllable.replace(controllable))
    }

    pub fn set_fault_hook(&mut self, hook: impl FnMut(&Fault<M::Key>) + Send + 'static) {
        self.fault_hook = Some(Box::new(hook));
    }

    /// Go back to logging faults through `tracing`.
    pub fn clear_fault_hook(&mut self) {
        self.fault_hook = None;
    }

    pub fn subscribe_transitions(&self) -> broadcast::Receiver<TransitionEvent<M::Key>> {
        self.transitions.subscribe()
    }
}

/// Transitions.
impl<M: Machine> StateTree<M> {
    pub fn transition_to(&mut self, target: M::Key) -> Result<M::Key> {
        self.transition_to_entry(target, DEFAULT_ENTRY)
    }

    /// Move to `target`, entering it through `entry_point` (0 = initial child).
    ///
    /// Returns the deepest entered state. Re-targeting the current leaf
    /// reports `StateReentered` and changes nothing.
    pub fn transition_to_entry(&mut self, target: M::Key, entry_point: u32) -> Result<M::Key> {
        let from = self.ensure_started()?;
        self.node_mut(target)?;

        if from == target {
            self.report(Fault::new(FaultReason::StateReentered, target))?;
            return Ok(from);
        }

        tracing::debug!(?from, to = ?target, entry_point, "transition");
        let (entry, descent) = Descent::for_entry_point(entry_point);
        let boundary = self.exit_towards(target)?;
        self.enter_towards(boundary, target, entry)?;
        let leaf = self.descend(target, descent)?;

        self.publish(TransitionKind::Direct { entry_point }, Some(from), Some(leaf));
        Ok(leaf)
    }

    /// Move to `target`, resuming its history.
    ///
    /// Shallow history resumes the remembered child, which then takes its
    /// default entry. Deep history keeps following remembered children.
    /// Without history both fall back to the default entry. A leaf target
    /// has no history: the fault is reported and a plain transition follows.
    pub fn transition_to_history(&mut self, target: M::Key, deep: bool) -> Result<M::Key> {
        let from = self.ensure_started()?;
        let is_leaf = self.node_mut(target)?.is_leaf();

        if from == target {
            self.report(Fault::new(FaultReason::StateReentered, target))?;
            return Ok(from);
        }

        let (entry, descent) = if is_leaf {
            let reason = if deep {
                FaultReason::UnhandledDeepHistory
            } else {
                FaultReason::UnhandledShallowHistory
            };
            self.report(Fault::new(reason, target))?;
            (Entry::Default, Descent::Default)
        } else if deep {
            (Entry::History { deep }, Descent::Deep)
        } else {
            (Entry::History { deep }, Descent::Shallow)
        };

        tracing::debug!(?from, to = ?target, deep, "history transition");
        let boundary = self.exit_towards(target)?;
        self.enter_towards(boundary, target, entry)?;
        let leaf = self.descend(target, descent)?;

        self.publish(TransitionKind::History { deep }, Some(from), Some(leaf));
        Ok(leaf)
    }

    /// Offer `event` to the current leaf, then to each ancestor until one
    /// handles it. A transition requested by the handling state is applied
    /// before returning.
    pub fn dispatch(&mut self, event: &M::Event) -> Result<Dispatch<M::Key>> {
        let leaf = self.ensure_started()?;
        tracing::trace!(?leaf, ?event, "dispatch");

        let mut cursor = Some(leaf);
        while let Some(key) = cursor {
            let (outcome, request) = self.offer(key, event)?;
            match outcome {
                EventOutcome::Handled => {
                    let leaf = match request {
                        Some(request) => self.apply(request)?,
                        None => leaf,
                    };
                    return Ok(Dispatch {
                        handled_by: Some(key),
                        leaf,
                    });
                }
                EventOutcome::Failed => {
                    self.report(Fault::new(FaultReason::UnknownError, key))?;
                    return Ok(Dispatch {
                        handled_by: None,
                        leaf,
                    });
                }
                EventOutcome::Unhandled => {
                    if let Some(request) = request {
                        tracing::debug!(state = ?key, ?request, "ignoring request of unhandled event");
                    }
                    cursor = self.defs.parent_of(key);
                }
            }
        }

        self.report(Fault::new(FaultReason::UnhandledEvent, leaf))?;
        Ok(Dispatch {
            handled_by: None,
            leaf,
        })
    }

    fn apply(&mut self, request: TransitionRequest<M::Key>) -> Result<M::Key> {
        match request {
            TransitionRequest::To {
                target,
                entry_point,
            } => self.transition_to_entry(target, entry_point),
            TransitionRequest::History { target, deep } => self.transition_to_history(target, deep),
        }
    }
}

/// Introspection.
impl<M: Machine> StateTree<M> {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn root(&self) -> M::Key {
        self.defs.root
    }

    pub fn current_leaf(&self) -> Option<M::Key> {
        self.leaf
    }

    /// Active states from the root down to the current leaf.
    pub fn active_path(&self) -> Vec<M::Key> {
        let mut path = Vec::new();
        let mut cursor = self.leaf;
        while let Some(key) = cursor {
            path.push(key);
            cursor = self.defs.parent_of(key);
        }
        path.reverse();
        path
    }

    /// History pointer of `key`: its active or last active direct child.
    pub fn current_child(&self, key: M::Key) -> Option<M::Key> {
        self.nodes.get(&key).and_then(|node| node.current)
    }

    pub fn is_active(&self, key: M::Key) -> bool {
        match self.leaf {
            Some(leaf) => leaf == key || self.defs.is_ancestor_of(key, leaf),
            None => false,
        }
    }

    /// True when `ancestor` is a proper ancestor of `key`.
    pub fn is_ancestor_of(&self, ancestor: M::Key, key: M::Key) -> bool {
        self.defs.is_ancestor_of(ancestor, key)
    }

    /// True when `key` is a proper descendant of `ancestor`.
    pub fn is_descendant_of(&self, key: M::Key, ancestor: M::Key) -> bool {
        self.defs.is_ancestor_of(ancestor, key)
    }

    pub fn is_instantiated(&self, key: M::Key) -> bool {
        self.nodes.contains_key(&key)
    }

    pub fn instantiated_count(&self) -> usize {
        self.nodes.len()
    }

    /// Structure of the instantiated states, in definition order.
    pub fn topology(&self) -> TreeTopology<M::Key> {
        let states = self
            .defs
            .order
            .iter()
            .filter_map(|key| self.nodes.get(key))
            .map(|node| StateShape {
                key: node.key,
                parent: node.parent,
                children: node.children.clone(),
                initial: node.initial,
                entry_points: node.entry_points.keys().copied().collect(),
            })
            .collect();

        TreeTopology {
            root: self.defs.root,
            states,
        }
    }

    pub fn controllable(&self) -> Option<&M::Controllable> {
        self.controllable.as_ref()
    }

    pub fn controllable_mut(&mut self) -> Option<&mut M::Controllable> {
        self.controllable.as_mut()
    }
}

/// Internal plumbing.
impl<M: Machine> StateTree<M> {
    fn ensure_started(&self) -> Result<M::Key> {
        match (self.phase, self.leaf) {
            (Phase::Started, Some(leaf)) => Ok(leaf),
            (phase, _) => Err(CoreError::warn()
                .domain(Domain::Transition)
                .kind(ErrorKind::InvalidState)
                .msgf(format_args!("state tree is {}, not started", phase.label()))
                .build()),
        }
    }

    fn node_mut(&mut self, key: M::Key) -> Result<&mut StateNode<M>> {
        let def = self.defs.get(key)?;
        Ok(self
            .nodes
            .entry(key)
            .or_insert_with(|| StateNode::from_def(def)))
    }

    /// Run `f` on the behavior of `key`, instantiating it on first use.
    fn with_behavior<R>(
        &mut self,
        key: M::Key,
        f: impl FnOnce(&mut BehaviorBox<M>, &mut Context<'_, M>) -> R,
    ) -> Result<R> {
        let def = self.defs.get(key)?;
        let controllable = self.controllable.as_mut().ok_or_else(detached)?;
        let node = self
            .nodes
            .entry(key)
            .or_insert_with(|| StateNode::from_def(def));

        let mut ctx = Context::new(key, node.parent, controllable);
        Ok(f(&mut node.behavior, &mut ctx))
    }

    fn offer(
        &mut self,
        key: M::Key,
        event: &M::Event,
    ) -> Result<(EventOutcome, Option<TransitionRequest<M::Key>>)> {
        let def = self.defs.get(key)?;
        let controllable = self.controllable.as_mut().ok_or_else(detached)?;
        let node = self
            .nodes
            .entry(key)
            .or_insert_with(|| StateNode::from_def(def));

        let mut ctx = EventContext::new(Context::new(key, node.parent, controllable));
        let outcome = node.behavior.on_event(event, &mut ctx);
        Ok((outcome, ctx.into_request()))
    }

    fn enter_state(&mut self, key: M::Key, entry: Entry) -> Result<()> {
        if let Some(parent) = self.defs.parent_of(key) {
            self.node_mut(parent)?.current = Some(key);
        }
        tracing::trace!(state = ?key, ?entry, "enter");
        self.with_behavior(key, |behavior, ctx| behavior.on_enter(entry, ctx))?;
        self.leaf = Some(key);
        Ok(())
    }

    fn exit_state(&mut self, key: M::Key) -> Result<()> {
        tracing::trace!(state = ?key, "exit");
        self.with_behavior(key, |behavior, ctx| behavior.on_exit(ctx))?;
        self.leaf = self.defs.parent_of(key);
        Ok(())
    }

    /// Exit from the current leaf upwards, stopping below the lowest proper
    /// ancestor of `target`. Returns that ancestor (`None` when the root
    /// itself was exited).
    fn exit_towards(&mut self, target: M::Key) -> Result<Option<M::Key>> {
        let mut cursor = self.leaf;
        while let Some(key) = cursor {
            if self.defs.is_ancestor_of(key, target) {
                break;
            }
            self.exit_state(key)?;
            cursor = self.defs.parent_of(key);
        }
        Ok(cursor)
    }

    /// Enter every state strictly below `boundary` down to `target`.
    fn enter_towards(&mut self, boundary: Option<M::Key>, target: M::Key, entry: Entry) -> Result<()> {
        let mut path = Vec::new();
        let mut cursor = Some(target);
        while let Some(key) = cursor {
            if Some(key) == boundary {
                break;
            }
            path.push(key);
            cursor = self.defs.parent_of(key);
        }

        while let Some(key) = path.pop() {
            let entry = if path.is_empty() { entry } else { Entry::Transit };
            self.enter_state(key, entry)?;
        }
        Ok(())
    }

    /// Keep entering children of `key` until a leaf is reached.
    fn descend(&mut self, mut key: M::Key, mut descent: Descent) -> Result<M::Key> {
        loop {
            let node = self.node_mut(key)?;
            let initial = node.initial;
            let history = node.current;
            let route = match descent {
                Descent::Point(point) => node.entry_points.get(&point).copied(),
                _ => None,
            };
            let by_default = |child: M::Key| (child, Entry::Default, Descent::Default);

            let step = match descent {
                Descent::Default => initial.map(by_default),
                Descent::Point(point) => match route {
                    Some(EntryRoute { child, child_entry }) => {
                        let (entry, next) = Descent::for_entry_point(child_entry);
                        Some((child, entry, next))
                    }
                    None => {
                        let fault = Fault::new(FaultReason::UnhandledEntryPoint, key)
                            .with_entry_point(point);
                        self.report(fault)?;
                        initial.map(by_default)
                    }
                },
                Descent::Shallow => history
                    .map(|child| (child, Entry::History { deep: false }, Descent::Default))
                    .or_else(|| initial.map(by_default)),
                Descent::Deep => history
                    .map(|child| (child, Entry::History { deep: true }, Descent::Deep))
                    .or_else(|| initial.map(by_default)),
            };

            match step {
                None => return Ok(key),
                Some((child, entry, next)) => {
                    self.enter_state(child, entry)?;
                    key = child;
                    descent = next;
                }
            }
        }
    }

    /// Dispose cached states below and including `key`, children first.
    fn dispose_subtree(&mut self, key: M::Key) -> Result<()> {
        let children = self.defs.get(key)?.children.clone();
        for child in children {
            self.dispose_subtree(child)?;
        }
        if self.nodes.contains_key(&key) {
            tracing::trace!(state = ?key, "dispose");
            self.with_behavior(key, |behavior, ctx| behavior.on_dispose(ctx))?;
        }
        Ok(())
    }

    /// Hand a fault to its state, then to the host hook (or the log).
    fn report(&mut self, fault: Fault<M::Key>) -> Result<()> {
        if self.controllable.is_some() {
            self.with_behavior(fault.state, |behavior, ctx| behavior.on_error(&fault, ctx))?;
        }
        match self.fault_hook.as_mut() {
            Some(hook) => hook(&fault),
            None => fault.log(),
        }
        Ok(())
    }

    fn publish(&mut self, kind: TransitionKind, from: Option<M::Key>, to: Option<M::Key>) {
        self.sequence += 1;
        // No receivers is fine; lagging receivers drop old events.
        let _ = self.transitions.send(TransitionEvent {
            sequence: self.sequence,
            kind,
            from,
            to,
        });
    }
}

impl<M: Machine> fmt::Debug for StateTree<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTree")
            .field("phase", &self.phase)
            .field("root", &self.defs.root)
            .field("leaf", &self.leaf)
            .field("cached", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

fn detached() -> CoreError {
    CoreError::warn()
        .domain(Domain::Engine)
        .kind(ErrorKind::InvalidState)
        .msg("no controllable attached")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{StateDef, TreeBuilder};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum K {
        Root,
        On,
        Off,
    }

    struct Switch;
    impl Machine for Switch {
        type Key = K;
        type Controllable = u32;
        type Event = ();
    }

    fn switch() -> StateTree<Switch> {
        TreeBuilder::new()
            .state(StateDef::plain(K::Root).initial(K::Off))
            .state(StateDef::plain(K::On).parent(K::Root))
            .state(StateDef::plain(K::Off).parent(K::Root))
            .build(0)
            .unwrap()
    }

    #[test]
    fn dispatch_requires_started_tree() {
        let mut tree = switch();
        let err = tree.dispatch(&()).unwrap_err();
        assert_eq!(err.domain, Domain::Transition);
        assert_eq!(err.kind, ErrorKind::InvalidState);
    }

    #[test]
    fn faults_without_hook_are_only_logged() {
        let mut tree = switch();
        tree.set_fault_hook(|_| panic!("hook was cleared"));
        tree.clear_fault_hook();
        tree.start().unwrap();

        assert_eq!(tree.transition_to(K::Off).unwrap(), K::Off);
        assert_eq!(tree.dispatch(&()).unwrap().handled_by, None);
    }

    #[test]
    fn is_active_covers_leaf_and_ancestors() {
        let mut tree = switch();
        assert!(!tree.is_active(K::Root));
        tree.start().unwrap();
        tree.transition_to(K::On).unwrap();

        assert!(tree.is_active(K::Root));
        assert!(tree.is_active(K::On));
        assert!(!tree.is_active(K::Off));
        assert_eq!(tree.current_child(K::Root), Some(K::On));
    }

    #[test]
    fn controllable_is_reachable_and_replaceable() {
        let mut tree = switch();
        *tree.controllable_mut().unwrap() = 7;
        assert_eq!(tree.attach(9).unwrap(), Some(7));
        assert_eq!(tree.controllable(), Some(&9));
    }

    #[test]
    fn debug_shows_phase_and_leaf() {
        let mut tree = switch();
        tree.start().unwrap();
        let rendered = format!("{tree:?}");
        assert!(rendered.contains("Started"), "{rendered}");
        assert!(rendered.contains("Off"), "{rendered}");
    }
}
