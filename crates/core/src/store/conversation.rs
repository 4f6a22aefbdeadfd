//! Conversation records, partitioned into lifecycle buckets.
//!
//! All five buckets share one backing store under
//! `conversation/<bucket>/<id>`. Every call names its bucket explicitly.

use crate::codec;
use crate::state::{ReadStore, Store};
use crate::{Address, Asset, AssetType, Bucket, Conversation, ConversationId, Error};
use tracing::error;

const PREFIX: &str = "conversation";

/// Equality predicates for `filter_conversations`. `None` matches anything.
#[derive(Clone, Debug, Default)]
pub struct ConversationFilter {
    pub owner: Option<Address>,
    pub asset: Option<Asset>,
    pub asset_type: Option<AssetType>,
    pub bidder: Option<Address>,
}

impl ConversationFilter {
    pub fn matches(&self, conv: &Conversation) -> bool {
        self.owner.is_none_or(|owner| conv.owner == owner)
            && self.asset.as_ref().is_none_or(|asset| conv.asset == *asset)
            && self.asset_type.is_none_or(|t| conv.asset_type == t)
            && self.bidder.is_none_or(|bidder| conv.bidder == bidder)
    }
}

pub struct ConversationStore<S> {
    kv: S,
}

impl<S> ConversationStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }
}

impl<S: ReadStore> ConversationStore<S> {
    /// Whether the id is present in any bucket.
    pub fn exists(&self, id: &ConversationId) -> bool {
        let hex = id.to_hex();
        Bucket::ALL
            .iter()
            .any(|bucket| self.kv.get(&[PREFIX, bucket.as_str(), &hex]).is_some())
    }

    /// Load a conversation from one bucket.
    pub fn get(&self, bucket: Bucket, id: &ConversationId) -> Result<Conversation, Error> {
        self.try_get(bucket, id)?
            .ok_or(Error::ConversationNotFound(*id))
    }

    fn try_get(&self, bucket: Bucket, id: &ConversationId) -> Result<Option<Conversation>, Error> {
        self.kv
            .get(&[PREFIX, bucket.as_str(), &id.to_hex()])
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }

    /// Probe every bucket in lifecycle order and return the first hit.
    pub fn query_all_stores(&self, id: &ConversationId) -> Result<Option<(Bucket, Conversation)>, Error> {
        for bucket in Bucket::ALL {
            if let Some(conv) = self.try_get(bucket, id)? {
                return Ok(Some((bucket, conv)));
            }
        }
        Ok(None)
    }

    /// Every conversation in a bucket, ordered by id.
    pub fn list(&self, bucket: Bucket) -> Result<Vec<Conversation>, Error> {
        self.filter_conversations(bucket, &ConversationFilter::default())
    }

    /// Full scan of a bucket keeping the records that match `filter`.
    pub fn filter_conversations(
        &self,
        bucket: Bucket,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, Error> {
        let mut matched = Vec::new();
        for path in self.kv.enumerate(&[PREFIX, bucket.as_str()]) {
            let refs: Vec<&str> = path.iter().map(|s| s.as_str()).collect();
            let Some(bytes) = self.kv.get(&refs) else {
                continue;
            };
            let conv: Conversation = codec::decode(&bytes)?;
            if filter.matches(&conv) {
                matched.push(conv);
            }
        }
        Ok(matched)
    }
}

impl<S: Store> ConversationStore<S> {
    /// Write a record into one bucket, replacing any record there.
    pub fn set(&mut self, bucket: Bucket, conv: &Conversation) -> Result<(), Error> {
        self.kv
            .set(&[PREFIX, bucket.as_str(), &conv.id.to_hex()], codec::encode(conv)?);
        Ok(())
    }

    /// Remove a record from one bucket. Returns true if it was there.
    pub fn delete(&mut self, bucket: Bucket, id: &ConversationId) -> bool {
        self.kv.delete(&[PREFIX, bucket.as_str(), &id.to_hex()])
    }

    /// Insert a new conversation into the active bucket. The id must be
    /// unused in every bucket.
    pub fn create(&mut self, conv: &Conversation) -> Result<(), Error> {
        if self.exists(&conv.id) {
            return Err(Error::ConversationExists(conv.id));
        }
        self.set(Bucket::Active, conv)
    }

    /// Move a conversation between buckets.
    ///
    /// The record is written to `to` before it is removed from `from`. If the
    /// removal fails the caller must discard every staged write. Closed
    /// conversations never move again.
    pub fn move_conversation(
        &mut self,
        id: &ConversationId,
        from: Bucket,
        to: Bucket,
    ) -> Result<Conversation, Error> {
        if from.is_terminal() {
            return Err(Error::Inconsistent(format!(
                "conversation {} is closed in {} and cannot move to {}",
                id, from, to
            )));
        }
        let mut conv = self.get(from, id)?;
        if from == to {
            return Ok(conv);
        }
        conv.open = to == Bucket::Active;
        self.set(to, &conv)?;
        if !self.delete(from, id) {
            error!(
                target: "ezbid::invariant",
                conversation = %id,
                %from,
                %to,
                "conversation written to target bucket but could not be removed from source"
            );
            return Err(Error::Inconsistent(format!(
                "conversation {} could not be removed from {}",
                id, from
            )));
        }
        Ok(conv)
    }
}
