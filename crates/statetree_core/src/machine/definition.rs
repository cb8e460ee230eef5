use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use crate::error::{CoreError, Result};

use super::behavior::StateBehavior;
use super::tree::StateTree;

/// Type bundle describing one application state machine.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Screen { Root, Login, Home }
///
/// struct App;
/// impl Machine for App {
///     type Key = Screen;
///     type Controllable = Session;
///     type Event = Input;
/// }
/// ```
pub trait Machine: 'static {
    /// Stable identity of a state.
    type Key: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;
    /// Caller-owned object the states act upon.
    type Controllable;
    /// Payload delivered by [`StateTree::dispatch`].
    type Event: fmt::Debug;
}

/// Entry point id reserved for the default (initial-child) entry.
pub const DEFAULT_ENTRY: u32 = 0;

/// Where an entry point leads: a direct child, entered via its own entry point.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EntryRoute<K> {
    pub child: K,
    pub child_entry: u32,
}

pub(crate) type Factory<M> =
    Box<dyn Fn() -> Box<dyn StateBehavior<M> + Send> + Send + Sync>;

/// Configuration of a single state.
///
/// The factory runs once per key the first time the state is referenced
/// after a start; its output is cached until the tree is stopped or reset.
pub struct StateDef<M: Machine> {
    pub(crate) key: M::Key,
    pub(crate) parent: Option<M::Key>,
    pub(crate) initial: Option<M::Key>,
    pub(crate) children: Vec<M::Key>,
    pub(crate) entry_points: BTreeMap<u32, EntryRoute<M::Key>>,
    pub(crate) factory: Factory<M>,
}

impl<M: Machine> StateDef<M> {
    pub fn new<F, B>(key: M::Key, factory: F) -> Self
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: StateBehavior<M> + Send + 'static,
    {
        Self {
            key,
            parent: None,
            initial: None,
            children: Vec::new(),
            entry_points: BTreeMap::new(),
            factory: Box::new(move || -> Box<dyn StateBehavior<M> + Send> { Box::new(factory()) }),
        }
    }

    /// A state without callbacks of its own.
    pub fn plain(key: M::Key) -> Self {
        Self::new(key, || ())
    }

    pub fn parent(mut self, parent: M::Key) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn initial(mut self, child: M::Key) -> Self {
        self.initial = Some(child);
        self
    }

    /// Entry point `id` descends into `child` through its default entry.
    pub fn entry_point(self, id: u32, child: M::Key) -> Self {
        self.entry_point_via(id, child, DEFAULT_ENTRY)
    }

    /// Entry point `id` descends into `child` through `child_entry`.
    pub fn entry_point_via(mut self, id: u32, child: M::Key, child_entry: u32) -> Self {
        self.entry_points.insert(id, EntryRoute { child, child_entry });
        self
    }

    pub fn key(&self) -> M::Key {
        self.key
    }

    pub(crate) fn instantiate(&self) -> Box<dyn StateBehavior<M> + Send> {
        (self.factory)()
    }
}

impl<M: Machine> fmt::Debug for StateDef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateDef")
            .field("key", &self.key)
            .field("parent", &self.parent)
            .field("initial", &self.initial)
            .field("children", &self.children)
            .field("entry_points", &self.entry_points)
            .finish_non_exhaustive()
    }
}

/// Validated, immutable set of definitions shared by a tree across restarts.
pub(crate) struct Definitions<M: Machine> {
    pub(crate) root: M::Key,
    /// Declaration order, used for deterministic iteration.
    pub(crate) order: Vec<M::Key>,
    pub(crate) by_key: HashMap<M::Key, StateDef<M>>,
}

impl<M: Machine> Definitions<M> {
    pub(crate) fn get(&self, key: M::Key) -> Result<&StateDef<M>> {
        self.by_key
            .get(&key)
            .ok_or_else(|| CoreError::unknown_state(key))
    }

    pub(crate) fn parent_of(&self, key: M::Key) -> Option<M::Key> {
        self.by_key.get(&key).and_then(|def| def.parent)
    }

    /// True when `ancestor` is a proper ancestor of `key`.
    pub(crate) fn is_ancestor_of(&self, ancestor: M::Key, key: M::Key) -> bool {
        let mut cursor = self.parent_of(key);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent_of(current);
        }
        false
    }
}

/// Collects state definitions and validates the graph they form.
pub struct TreeBuilder<M: Machine> {
    defs: Vec<StateDef<M>>,
}

impl<M: Machine> Default for TreeBuilder<M> {
    fn default() -> Self {
        Self { defs: Vec::new() }
    }
}

impl<M: Machine> TreeBuilder<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, def: StateDef<M>) -> Self {
        self.defs.push(def);
        self
    }

    /// Validate the definitions and produce a tree attached to `controllable`.
    ///
    /// Fails when the graph is broken:
    /// - duplicate keys, unknown parents, parent cycles
    /// - zero or several roots, or a root without an initial child
    /// - a composite without an initial child, or a leaf with one
    /// - an initial child or entry route that is not a direct child
    /// - an entry point using the reserved id 0
    pub fn build(self, controllable: M::Controllable) -> Result<StateTree<M>> {
        let definitions = self.validate()?;
        Ok(StateTree::from_definitions(definitions, controllable))
    }

    fn validate(self) -> Result<Definitions<M>> {
        let mut order = Vec::with_capacity(self.defs.len());
        let mut by_key: HashMap<M::Key, StateDef<M>> = HashMap::with_capacity(self.defs.len());

        for def in self.defs {
            let key = def.key;
            if by_key.insert(key, def).is_some() {
                return Err(CoreError::invalid_definition(format_args!(
                    "state {key:?} is defined twice"
                )));
            }
            order.push(key);
        }

        let mut roots = Vec::new();
        for key in &order {
            match by_key[key].parent {
                None => roots.push(*key),
                Some(parent) if parent == *key => {
                    return Err(CoreError::invalid_definition(format_args!(
                        "state {key:?} is its own parent"
                    )));
                }
                Some(parent) if !by_key.contains_key(&parent) => {
                    return Err(CoreError::invalid_definition(format_args!(
                        "state {key:?} names unknown parent {parent:?}"
                    )));
                }
                Some(_) => {}
            }
        }

        let root = match roots.as_slice() {
            [root] => *root,
            [] => {
                return Err(CoreError::invalid_definition(format_args!(
                    "no root state: every state has a parent"
                )));
            }
            many => {
                return Err(CoreError::invalid_definition(format_args!(
                    "several root states: {many:?}"
                )));
            }
        };

        // Every parent chain must end at the root.
        for key in &order {
            let mut seen = HashSet::new();
            let mut cursor = Some(*key);
            while let Some(current) = cursor {
                if !seen.insert(current) {
                    return Err(CoreError::invalid_definition(format_args!(
                        "parent cycle through state {current:?}"
                    )));
                }
                cursor = by_key[&current].parent;
            }
        }

        for key in &order {
            if let Some(parent) = by_key[key].parent {
                if let Some(parent_def) = by_key.get_mut(&parent) {
                    parent_def.children.push(*key);
                }
            }
        }

        for key in &order {
            let def = &by_key[key];
            match (def.children.is_empty(), def.initial) {
                (false, None) => {
                    return Err(CoreError::invalid_definition(format_args!(
                        "composite state {key:?} has no initial child"
                    )));
                }
                (true, Some(initial)) => {
                    return Err(CoreError::invalid_definition(format_args!(
                        "leaf state {key:?} names initial child {initial:?}"
                    )));
                }
                (false, Some(initial)) if !def.children.contains(&initial) => {
                    return Err(CoreError::invalid_definition(format_args!(
                        "initial child {initial:?} of {key:?} is not a direct child"
                    )));
                }
                _ => {}
            }

            for (id, route) in &def.entry_points {
                if *id == DEFAULT_ENTRY {
                    return Err(CoreError::invalid_definition(format_args!(
                        "state {key:?} redefines the default entry point 0"
                    )));
                }
                if !def.children.contains(&route.child) {
                    return Err(CoreError::invalid_definition(format_args!(
                        "entry point {id} of {key:?} targets {:?}, not a direct child",
                        route.child
                    )));
                }
            }
        }

        if by_key[&root].initial.is_none() {
            return Err(CoreError::invalid_definition(format_args!(
                "root state {root:?} has no initial state"
            )));
        }

        Ok(Definitions {
            root,
            order,
            by_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Domain, ErrorKind};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum K {
        Root,
        A,
        B,
        C,
    }

    struct M;
    impl Machine for M {
        type Key = K;
        type Controllable = ();
        type Event = ();
    }

    fn build(defs: Vec<StateDef<M>>) -> Result<StateTree<M>> {
        defs.into_iter()
            .fold(TreeBuilder::new(), TreeBuilder::state)
            .build(())
    }

    fn message(defs: Vec<StateDef<M>>) -> String {
        let e = build(defs).err().expect("definitions should be rejected");
        assert_eq!(e.domain, Domain::Definition);
        assert_eq!(e.kind, ErrorKind::InvalidArgument);
        e.message.into_owned()
    }

    #[test]
    fn accepts_minimal_tree() {
        let tree = build(vec![
            StateDef::plain(K::Root).initial(K::A),
            StateDef::plain(K::A).parent(K::Root),
        ])
        .unwrap();
        assert!(tree.is_ancestor_of(K::Root, K::A));
        assert!(tree.is_descendant_of(K::A, K::Root));
        assert!(!tree.is_ancestor_of(K::A, K::A));
    }

    #[test]
    fn rejects_duplicates() {
        let msg = message(vec![
            StateDef::plain(K::Root).initial(K::A),
            StateDef::plain(K::A).parent(K::Root),
            StateDef::plain(K::A).parent(K::Root),
        ]);
        assert!(msg.contains("twice"), "{msg}");
    }

    #[test]
    fn rejects_root_without_initial() {
        let msg = message(vec![StateDef::plain(K::Root)]);
        assert!(msg.contains("no initial state"), "{msg}");
    }

    #[test]
    fn rejects_several_roots() {
        let msg = message(vec![
            StateDef::plain(K::Root).initial(K::A),
            StateDef::plain(K::A).parent(K::Root),
            StateDef::plain(K::B),
        ]);
        assert!(msg.contains("several root"), "{msg}");
    }

    #[test]
    fn rejects_cycles() {
        let msg = message(vec![
            StateDef::plain(K::Root).initial(K::A),
            StateDef::plain(K::A).parent(K::Root),
            StateDef::plain(K::B).parent(K::C).initial(K::C),
            StateDef::plain(K::C).parent(K::B).initial(K::B),
        ]);
        assert!(msg.contains("cycle"), "{msg}");
    }

    #[test]
    fn rejects_unknown_parent() {
        let msg = message(vec![
            StateDef::plain(K::Root).initial(K::A),
            StateDef::plain(K::A).parent(K::C),
        ]);
        assert!(msg.contains("unknown parent"), "{msg}");
    }

    #[test]
    fn rejects_initial_that_is_not_a_child() {
        let msg = message(vec![
            StateDef::plain(K::Root).initial(K::B),
            StateDef::plain(K::A).parent(K::Root).initial(K::B),
            StateDef::plain(K::B).parent(K::A),
        ]);
        assert!(msg.contains("not a direct child"), "{msg}");
    }

    #[test]
    fn rejects_composite_without_initial() {
        let msg = message(vec![
            StateDef::plain(K::Root).initial(K::A),
            StateDef::plain(K::A).parent(K::Root),
            StateDef::plain(K::B).parent(K::A),
        ]);
        assert!(msg.contains("composite state A"), "{msg}");
    }

    #[test]
    fn rejects_bad_entry_points() {
        let msg = message(vec![
            StateDef::plain(K::Root).initial(K::A).entry_point(0, K::A),
            StateDef::plain(K::A).parent(K::Root),
        ]);
        assert!(msg.contains("default entry point"), "{msg}");

        let msg = message(vec![
            StateDef::plain(K::Root).initial(K::A).entry_point(1, K::B),
            StateDef::plain(K::A).parent(K::Root).initial(K::B),
            StateDef::plain(K::B).parent(K::A),
        ]);
        assert!(msg.contains("entry point 1"), "{msg}");
    }
}
