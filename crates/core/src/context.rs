//! Runtime context handed to transaction handlers.

use crate::asset::AssetContext;
use crate::ledger::StoreLedger;
use crate::state::{State, Store};
use crate::store::MasterStore;
use crate::{Address, Error, Hash, Mutation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The consensus-provided header of the block being executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    /// Consensus time in UTC seconds. The only clock handlers may read.
    pub time: u64,
}

/// Named extension stores. Each subsystem fetches its own by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRegistry {
    stores: BTreeMap<String, State>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty store under `name` if none exists.
    pub fn mount(&mut self, name: &str) -> &mut State {
        self.stores.entry(name.to_string()).or_default()
    }

    pub fn get(&self, name: &str) -> Result<&State, Error> {
        self.stores
            .get(name)
            .ok_or_else(|| Error::StoreNotFound(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut State, Error> {
        self.stores
            .get_mut(name)
            .ok_or_else(|| Error::StoreNotFound(name.to_string()))
    }

    /// Apply staged change sets. Every named store must exist before any
    /// of them is written.
    pub fn apply(&mut self, changes: ChangeSet) -> Result<(), Error> {
        for (name, _) in &changes.0 {
            self.get(name)?;
        }
        for (name, mutations) in changes.0 {
            self.get_mut(&name)?.apply(mutations);
        }
        Ok(())
    }

    /// Deterministic root over every store.
    pub fn hash(&self) -> Result<Hash, Error> {
        Hash::of_value(&self.stores)
    }
}

/// Mutations staged by one execution, grouped by store name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet(pub Vec<(String, Vec<Mutation>)>);

impl ChangeSet {
    pub fn push(&mut self, store: &str, mutations: Vec<Mutation>) {
        if !mutations.is_empty() {
            self.0.push((store.to_string(), mutations));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything a handler may touch while it runs.
pub struct Context<'a, S> {
    pub header: BlockHeader,
    /// Address of the verified signer.
    pub signer: Address,
    /// Hash of the transaction being executed.
    pub tx_hash: Hash,
    pub native_denom: &'a str,
    pub validators: &'a BTreeSet<Address>,
    pub store: MasterStore<S>,
    pub ledger: StoreLedger<S>,
    pub assets: AssetContext<S>,
}

impl<'a, S: Store> Context<'a, S> {
    /// Current consensus time.
    pub fn now(&self) -> u64 {
        self.header.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ReadStore;

    #[test]
    fn registry_lookup_by_name() {
        let mut registry = StoreRegistry::new();
        registry.mount("bids").set(&["k"], b"v".to_vec());

        assert_eq!(registry.get("bids").unwrap().get(&["k"]), Some(b"v".to_vec()));
        assert!(matches!(registry.get("missing"), Err(Error::StoreNotFound(_))));
    }

    #[test]
    fn change_sets_apply_per_store() {
        let mut registry = StoreRegistry::new();
        registry.mount("bids");
        registry.mount("bank");
        let before = registry.hash().unwrap();

        let mut changes = ChangeSet::default();
        changes.push("bank", vec![Mutation::Set(vec!["a".into()], b"1".to_vec())]);
        changes.push("bids", Vec::new());
        assert_eq!(changes.0.len(), 1);

        registry.apply(changes).unwrap();
        assert_eq!(registry.get("bank").unwrap().get(&["a"]), Some(b"1".to_vec()));
        assert_ne!(registry.hash().unwrap(), before);
    }

    #[test]
    fn changes_for_unknown_store_fail() {
        let mut registry = StoreRegistry::new();
        let mut changes = ChangeSet::default();
        changes.push("ghost", vec![Mutation::Delete(vec!["a".into()])]);
        assert!(registry.apply(changes).is_err());
    }

    #[test]
    fn unknown_store_leaves_every_store_untouched() {
        let mut registry = StoreRegistry::new();
        registry.mount("bank");
        let before = registry.clone();

        let mut changes = ChangeSet::default();
        changes.push("bank", vec![Mutation::Set(vec!["a".into()], b"1".to_vec())]);
        changes.push("ghost", vec![Mutation::Set(vec!["b".into()], b"2".to_vec())]);
        assert!(matches!(registry.apply(changes), Err(Error::StoreNotFound(_))));
        assert_eq!(registry, before);
    }
}
