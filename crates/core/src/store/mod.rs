//! The master store: conversation buckets and offer history over one
//! extension store.

mod conversation;
mod offer;

pub use conversation::{ConversationFilter, ConversationStore};
pub use offer::{NewOffer, OfferLedger};

use crate::state::{ReadStore, Store};

/// Aggregates the conversation store and the offer ledger.
pub struct MasterStore<S> {
    kv: S,
}

impl<S> MasterStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }
}

impl<S: ReadStore> MasterStore<S> {
    pub fn conversations(&self) -> ConversationStore<&S> {
        ConversationStore::new(&self.kv)
    }

    pub fn offers(&self) -> OfferLedger<&S> {
        OfferLedger::new(&self.kv)
    }
}

impl<S: Store> MasterStore<S> {
    pub fn conversations_mut(&mut self) -> ConversationStore<&mut S> {
        ConversationStore::new(&mut self.kv)
    }

    pub fn offers_mut(&mut self) -> OfferLedger<&mut S> {
        OfferLedger::new(&mut self.kv)
    }
}
