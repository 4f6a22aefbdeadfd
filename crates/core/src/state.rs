//! Key-value substrate shared by every store.
//!
//! A `State` is a tree of values addressable by path. An `Overlay` stages
//! writes over any readable store and hands them back as a list of
//! `Mutation`s, so a transaction either applies every write or none.
//! ```text
//! State : Path -> Value | Undefined
//! Path  : List<String>
//! Value : Bytes
//! ```

use crate::{Error, Hash};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A path is a list of string segments.
pub type Path = Vec<String>;

/// A value is raw bytes.
pub type Value = Vec<u8>;

/// A staged change to a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    Set(Path, Value),
    Delete(Path),
}

/// Read access to a key-value store.
pub trait ReadStore {
    /// Get the value at a path.
    fn get(&self, path: &[&str]) -> Option<Value>;

    /// All paths holding values under a prefix, in key order.
    fn enumerate(&self, prefix: &[&str]) -> Vec<Path>;
}

/// Write access to a key-value store.
pub trait Store: ReadStore {
    /// Set a value at a path.
    fn set(&mut self, path: &[&str], value: Value);

    /// Delete a value at a path. Returns true if something was deleted.
    fn delete(&mut self, path: &[&str]) -> bool;
}

impl<T: ReadStore + ?Sized> ReadStore for &T {
    fn get(&self, path: &[&str]) -> Option<Value> {
        (**self).get(path)
    }

    fn enumerate(&self, prefix: &[&str]) -> Vec<Path> {
        (**self).enumerate(prefix)
    }
}

impl<T: ReadStore + ?Sized> ReadStore for &mut T {
    fn get(&self, path: &[&str]) -> Option<Value> {
        (**self).get(path)
    }

    fn enumerate(&self, prefix: &[&str]) -> Vec<Path> {
        (**self).enumerate(prefix)
    }
}

impl<T: Store + ?Sized> Store for &mut T {
    fn set(&mut self, path: &[&str], value: Value) {
        (**self).set(path, value)
    }

    fn delete(&mut self, path: &[&str]) -> bool {
        (**self).delete(path)
    }
}

/// A node in the state tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    /// A leaf value.
    Value(Value),
    /// A subtree.
    Tree(BTreeMap<String, Node>),
}

impl Default for Node {
    fn default() -> Self {
        Node::Tree(BTreeMap::new())
    }
}

/// The state tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    root: BTreeMap<String, Node>,
}

impl State {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the value at a path without copying it.
    pub fn get_ref(&self, path: &[&str]) -> Option<&Value> {
        let (last, parents) = path.split_last()?;
        let mut current = &self.root;
        for segment in parents {
            match current.get(*segment) {
                Some(Node::Tree(subtree)) => current = subtree,
                _ => return None,
            }
        }
        match current.get(*last) {
            Some(Node::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// Apply staged mutations in order.
    pub fn apply(&mut self, mutations: Vec<Mutation>) {
        for mutation in mutations {
            match mutation {
                Mutation::Set(path, value) => {
                    let refs: Vec<&str> = path.iter().map(|s| s.as_str()).collect();
                    self.set(&refs, value);
                }
                Mutation::Delete(path) => {
                    let refs: Vec<&str> = path.iter().map(|s| s.as_str()).collect();
                    self.delete(&refs);
                }
            }
        }
    }

    /// Compute the content hash of the entire state.
    pub fn hash(&self) -> Result<Hash, Error> {
        Hash::of_value(&self.root)
    }

    /// Check if the state is empty.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Get the number of values in the state.
    pub fn len(&self) -> usize {
        self.enumerate(&[]).len()
    }

    fn delete_recursive(current: &mut BTreeMap<String, Node>, path: &[&str]) -> bool {
        let Some((first, rest)) = path.split_first() else {
            return false;
        };

        if rest.is_empty() {
            return matches!(current.get(*first), Some(Node::Value(_)))
                && current.remove(*first).is_some();
        }

        let (deleted, now_empty) = match current.get_mut(*first) {
            Some(Node::Tree(subtree)) => {
                let deleted = Self::delete_recursive(subtree, rest);
                (deleted, subtree.is_empty())
            }
            _ => return false,
        };

        // Prune trees left empty by the delete
        if deleted && now_empty {
            current.remove(*first);
        }
        deleted
    }

    fn enumerate_recursive(node: &BTreeMap<String, Node>, current_path: &Path, results: &mut Vec<Path>) {
        for (key, value) in node {
            let mut path = current_path.clone();
            path.push(key.clone());

            match value {
                Node::Value(_) => results.push(path),
                Node::Tree(subtree) => Self::enumerate_recursive(subtree, &path, results),
            }
        }
    }
}

impl ReadStore for State {
    fn get(&self, path: &[&str]) -> Option<Value> {
        self.get_ref(path).cloned()
    }

    fn enumerate(&self, prefix: &[&str]) -> Vec<Path> {
        let mut results = Vec::new();

        let mut current = &self.root;
        for segment in prefix {
            match current.get(*segment) {
                Some(Node::Tree(subtree)) => current = subtree,
                Some(Node::Value(_)) => {
                    results.push(prefix.iter().map(|s| s.to_string()).collect());
                    return results;
                }
                None => return results,
            }
        }

        let prefix_path: Path = prefix.iter().map(|s| s.to_string()).collect();
        Self::enumerate_recursive(current, &prefix_path, &mut results);
        results
    }
}

impl Store for State {
    fn set(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };

        let mut current = &mut self.root;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(Node::default);
            // A value in the way of a subtree is replaced by the subtree
            if matches!(entry, Node::Value(_)) {
                *entry = Node::default();
            }
            current = match entry {
                Node::Tree(subtree) => subtree,
                Node::Value(_) => unreachable!("value nodes were just replaced"),
            };
        }
        current.insert(last.to_string(), Node::Value(value));
    }

    fn delete(&mut self, path: &[&str]) -> bool {
        Self::delete_recursive(&mut self.root, path)
    }
}

/// Staged writes over a readable base.
///
/// Reads see the staged writes first. Nothing reaches the base until the
/// caller applies `into_mutations()`.
pub struct Overlay<'a> {
    base: &'a dyn ReadStore,
    writes: BTreeMap<Path, Option<Value>>,
}

impl<'a> Overlay<'a> {
    /// Stage writes over `base`.
    pub fn new(base: &'a dyn ReadStore) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
        }
    }

    /// The staged writes in key order.
    pub fn into_mutations(self) -> Vec<Mutation> {
        self.writes
            .into_iter()
            .map(|(path, value)| match value {
                Some(value) => Mutation::Set(path, value),
                None => Mutation::Delete(path),
            })
            .collect()
    }

    fn key(path: &[&str]) -> Path {
        path.iter().map(|s| s.to_string()).collect()
    }
}

impl ReadStore for Overlay<'_> {
    fn get(&self, path: &[&str]) -> Option<Value> {
        match self.writes.get(&Self::key(path)) {
            Some(staged) => staged.clone(),
            None => self.base.get(path),
        }
    }

    fn enumerate(&self, prefix: &[&str]) -> Vec<Path> {
        let mut paths: BTreeSet<Path> = self.base.enumerate(prefix).into_iter().collect();
        let prefix = Self::key(prefix);
        for (path, value) in &self.writes {
            if !path.starts_with(&prefix) {
                continue;
            }
            match value {
                Some(_) => paths.insert(path.clone()),
                None => paths.remove(path),
            };
        }
        paths.into_iter().collect()
    }
}

impl Store for Overlay<'_> {
    fn set(&mut self, path: &[&str], value: Value) {
        self.writes.insert(Self::key(path), Some(value));
    }

    fn delete(&mut self, path: &[&str]) -> bool {
        if self.get(path).is_none() {
            return false;
        }
        self.writes.insert(Self::key(path), None);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state() {
        let state = State::new();
        assert!(state.is_empty());
        assert_eq!(state.get(&["anything"]), None);
    }

    #[test]
    fn set_and_get() {
        let mut state = State::new();
        state.set(&["conversation", "active", "abc"], b"record".to_vec());

        assert_eq!(
            state.get(&["conversation", "active", "abc"]),
            Some(b"record".to_vec())
        );
        assert_eq!(state.get(&["conversation", "active"]), None); // Not a value
        assert_eq!(state.get(&["nonexistent"]), None);
    }

    #[test]
    fn overwrite_value() {
        let mut state = State::new();
        state.set(&["key"], b"v1".to_vec());
        state.set(&["key"], b"v2".to_vec());

        assert_eq!(state.get(&["key"]), Some(b"v2".to_vec()));
    }

    #[test]
    fn delete_prunes_empty_parents() {
        let mut state = State::new();
        state.set(&["a", "b", "c"], b"value".to_vec());

        assert!(state.delete(&["a", "b", "c"]));
        assert_eq!(state.get(&["a", "b", "c"]), None);
        assert!(state.is_empty());
        assert!(!state.delete(&["a", "b", "c"]));
    }

    #[test]
    fn delete_refuses_subtrees() {
        let mut state = State::new();
        state.set(&["a", "b"], b"value".to_vec());

        assert!(!state.delete(&["a"]));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn enumerate_paths() {
        let mut state = State::new();
        state.set(&["offer", "c1", "00000000000000000000"], b"o".to_vec());
        state.set(&["offer", "c1", "00000000000000000001"], b"o".to_vec());
        state.set(&["offer", "c2", "00000000000000000000"], b"o".to_vec());
        state.set(&["offer_seq", "c1"], b"2".to_vec());

        assert_eq!(state.enumerate(&[]).len(), 4);
        assert_eq!(state.enumerate(&["offer"]).len(), 3);
        let c1 = state.enumerate(&["offer", "c1"]);
        assert_eq!(c1.len(), 2);
        assert!(c1[0] < c1[1]);
    }

    #[test]
    fn hash_determinism() {
        let mut s1 = State::new();
        s1.set(&["a"], b"1".to_vec());
        s1.set(&["b"], b"2".to_vec());

        let mut s2 = State::new();
        s2.set(&["b"], b"2".to_vec());
        s2.set(&["a"], b"1".to_vec());

        assert_eq!(s1.hash().unwrap(), s2.hash().unwrap());
    }

    #[test]
    fn overlay_reads_through_and_stages() {
        let mut base = State::new();
        base.set(&["x", "1"], b"base".to_vec());
        base.set(&["x", "2"], b"base".to_vec());

        let mut overlay = Overlay::new(&base);
        overlay.set(&["x", "3"], b"new".to_vec());
        assert!(overlay.delete(&["x", "1"]));
        assert!(!overlay.delete(&["x", "9"]));

        assert_eq!(overlay.get(&["x", "1"]), None);
        assert_eq!(overlay.get(&["x", "2"]), Some(b"base".to_vec()));
        assert_eq!(overlay.enumerate(&["x"]).len(), 2);

        // Base untouched until applied
        assert_eq!(base.get(&["x", "1"]), Some(b"base".to_vec()));

        let mutations = overlay.into_mutations();
        let mut applied = base.clone();
        applied.apply(mutations);
        assert_eq!(applied.get(&["x", "1"]), None);
        assert_eq!(applied.get(&["x", "3"]), Some(b"new".to_vec()));
    }

    #[test]
    fn overlays_stack() {
        let mut base = State::new();
        base.set(&["k"], b"0".to_vec());

        let mut lower = Overlay::new(&base);
        lower.set(&["k"], b"1".to_vec());

        let mut upper = Overlay::new(&lower);
        upper.set(&["k"], b"2".to_vec());
        assert_eq!(upper.get(&["k"]), Some(b"2".to_vec()));

        drop(upper);
        assert_eq!(lower.get(&["k"]), Some(b"1".to_vec()));
    }
}
