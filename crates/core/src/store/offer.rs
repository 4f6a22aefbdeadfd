//! Append-only offer history.
//!
//! Offers live under `offer/<conversation>/<seq>` where `seq` is a
//! per-conversation counter minted here, zero-padded so key order is
//! insertion order. The caller's offer time is kept on the record only.

use crate::codec;
use crate::state::{ReadStore, Store};
use crate::{Coin, ConversationId, Error, FundStatus, Offer, OfferKind, OfferStatus};
use std::ops::ControlFlow;
use tracing::error;

const PREFIX: &str = "offer";
const SEQ_PREFIX: &str = "offer_seq";

fn seq_key(seq: u64) -> String {
    format!("{:020}", seq)
}

/// Fields of an offer before the ledger assigns its sequence number.
#[derive(Clone, Debug)]
pub struct NewOffer {
    pub conversation_id: ConversationId,
    pub kind: OfferKind,
    pub fund_status: FundStatus,
    pub amount: Coin,
    pub offer_time: u64,
}

pub struct OfferLedger<S> {
    kv: S,
}

impl<S> OfferLedger<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }
}

impl<S: ReadStore> OfferLedger<S> {
    /// Visit a conversation's offers oldest first until the visitor breaks.
    pub fn for_each_offer<F>(&self, id: &ConversationId, mut visit: F) -> Result<(), Error>
    where
        F: FnMut(&Offer) -> ControlFlow<()>,
    {
        let hex = id.to_hex();
        for path in self.kv.enumerate(&[PREFIX, &hex]) {
            let refs: Vec<&str> = path.iter().map(|s| s.as_str()).collect();
            let Some(bytes) = self.kv.get(&refs) else {
                continue;
            };
            let offer: Offer = codec::decode(&bytes)?;
            if visit(&offer).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Full history of a conversation, oldest first.
    pub fn offers_for_conversation(&self, id: &ConversationId) -> Result<Vec<Offer>, Error> {
        let mut offers = Vec::new();
        self.for_each_offer(id, |offer| {
            offers.push(offer.clone());
            ControlFlow::Continue(())
        })?;
        Ok(offers)
    }

    /// The single Active offer of a conversation.
    ///
    /// Errors if there is none, and distinctly if there is more than one.
    pub fn get_active_offer(&self, id: &ConversationId) -> Result<Offer, Error> {
        let mut active: Option<Offer> = None;
        let mut duplicated = false;
        self.for_each_offer(id, |offer| {
            if !offer.is_active() {
                return ControlFlow::Continue(());
            }
            if active.is_some() {
                duplicated = true;
                return ControlFlow::Break(());
            }
            active = Some(offer.clone());
            ControlFlow::Continue(())
        })?;

        if duplicated {
            error!(
                target: "ezbid::invariant",
                conversation = %id,
                "more than one active offer"
            );
            return Err(Error::MultipleActiveOffers(*id));
        }
        active.ok_or(Error::NoActiveOffer(*id))
    }

    fn next_seq(&self, id: &ConversationId) -> Result<u64, Error> {
        match self.kv.get(&[SEQ_PREFIX, &id.to_hex()]) {
            None => Ok(0),
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    Error::Inconsistent(format!("offer sequence for {} is corrupt", id))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
        }
    }
}

impl<S: Store> OfferLedger<S> {
    /// Append a new Active offer and return it with its sequence number.
    pub fn add_offer(&mut self, new: NewOffer) -> Result<Offer, Error> {
        let id = new.conversation_id;
        let seq = self.next_seq(&id)?;
        let next = seq
            .checked_add(1)
            .ok_or_else(|| Error::Overflow(format!("offer sequence of {}", id)))?;

        let offer = Offer {
            conversation_id: id,
            seq,
            kind: new.kind,
            status: OfferStatus::Active,
            fund_status: new.fund_status,
            amount: new.amount,
            offer_time: new.offer_time,
        };

        let hex = id.to_hex();
        self.kv
            .set(&[PREFIX, &hex, &seq_key(seq)], codec::encode(&offer)?);
        self.kv.set(&[SEQ_PREFIX, &hex], next.to_be_bytes().to_vec());
        Ok(offer)
    }

    /// Overwrite an existing offer in place. Never creates history.
    pub fn set_offer(&mut self, offer: &Offer) -> Result<(), Error> {
        let hex = offer.conversation_id.to_hex();
        let key = seq_key(offer.seq);
        if self.kv.get(&[PREFIX, &hex, &key]).is_none() {
            return Err(Error::Inconsistent(format!(
                "offer {} of conversation {} does not exist",
                offer.seq, offer.conversation_id
            )));
        }
        self.kv.set(&[PREFIX, &hex, &key], codec::encode(offer)?);
        Ok(())
    }
}
