/// Structural snapshot of the states currently instantiated in a tree.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TreeTopology<K> {
    pub root: K,
    /// In definition order.
    pub states: Vec<StateShape<K>>,
}

/// Structure of one instantiated state.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StateShape<K> {
    pub key: K,
    pub parent: Option<K>,
    pub children: Vec<K>,
    pub initial: Option<K>,
    pub entry_points: Vec<u32>,
}

impl<K: PartialEq> TreeTopology<K> {
    pub fn get(&self, key: &K) -> Option<&StateShape<K>> {
        self.states.iter().find(|shape| shape.key == *key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
