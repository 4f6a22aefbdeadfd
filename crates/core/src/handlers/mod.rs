//! Transaction handlers.
//!
//! Every handler has two phases. `validate` is pure and checks field shape.
//! `run` applies the business rules against a staged context and is the same
//! code for the speculative check and the final deliver. A failed `run`
//! leaves its staged writes to be discarded by the caller.

mod bidder_decision;
mod cancel_bid;
mod counter_offer;
mod create_bid;
mod expire_bid;
mod owner_decision;

pub use bidder_decision::BidderDecision;
pub use cancel_bid::CancelBid;
pub use counter_offer::CounterOffer;
pub use create_bid::CreateBid;
pub use expire_bid::ExpireBid;
pub use owner_decision::OwnerDecision;

use crate::context::Context;
use crate::event::Attribute;
use crate::state::{ReadStore, Store};
use crate::store::MasterStore;
use crate::{
    Address, Bucket, Coin, Conversation, ConversationId, Error, FundStatus, Offer, OfferKind,
    Transaction,
};

/// The two-phase contract shared by all six request kinds.
pub trait Handler {
    /// Field-shape checks. No state access.
    fn validate(&self, native_denom: &str) -> Result<(), Error>;

    /// Role and address of the party this request is made by.
    fn principal(&self) -> (&'static str, Address);

    /// Conversation the request targets, when known before running.
    fn conversation_id(&self) -> Option<ConversationId>;

    /// Type-specific event tags.
    fn extras(&self) -> Vec<Attribute> {
        Vec::new()
    }

    /// Apply the business rules. Returns the conversation acted on.
    fn run<S: Store>(&self, ctx: &mut Context<'_, S>) -> Result<ConversationId, Error>;
}

impl Transaction {
    pub fn validate(&self, native_denom: &str) -> Result<(), Error> {
        match self {
            Transaction::CreateBid(h) => h.validate(native_denom),
            Transaction::CounterOffer(h) => h.validate(native_denom),
            Transaction::BidderDecision(h) => h.validate(native_denom),
            Transaction::OwnerDecision(h) => h.validate(native_denom),
            Transaction::CancelBid(h) => h.validate(native_denom),
            Transaction::ExpireBid(h) => h.validate(native_denom),
        }
    }

    pub fn principal(&self) -> (&'static str, Address) {
        match self {
            Transaction::CreateBid(h) => h.principal(),
            Transaction::CounterOffer(h) => h.principal(),
            Transaction::BidderDecision(h) => h.principal(),
            Transaction::OwnerDecision(h) => h.principal(),
            Transaction::CancelBid(h) => h.principal(),
            Transaction::ExpireBid(h) => h.principal(),
        }
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        match self {
            Transaction::CreateBid(h) => h.conversation_id(),
            Transaction::CounterOffer(h) => h.conversation_id(),
            Transaction::BidderDecision(h) => h.conversation_id(),
            Transaction::OwnerDecision(h) => h.conversation_id(),
            Transaction::CancelBid(h) => h.conversation_id(),
            Transaction::ExpireBid(h) => h.conversation_id(),
        }
    }

    pub fn extras(&self) -> Vec<Attribute> {
        match self {
            Transaction::CreateBid(h) => h.extras(),
            Transaction::CounterOffer(h) => h.extras(),
            Transaction::BidderDecision(h) => h.extras(),
            Transaction::OwnerDecision(h) => h.extras(),
            Transaction::CancelBid(h) => h.extras(),
            Transaction::ExpireBid(h) => h.extras(),
        }
    }

    /// Route to the handler for this request.
    pub fn run<S: Store>(&self, ctx: &mut Context<'_, S>) -> Result<ConversationId, Error> {
        match self {
            Transaction::CreateBid(h) => h.run(ctx),
            Transaction::CounterOffer(h) => h.run(ctx),
            Transaction::BidderDecision(h) => h.run(ctx),
            Transaction::OwnerDecision(h) => h.run(ctx),
            Transaction::CancelBid(h) => h.run(ctx),
            Transaction::ExpireBid(h) => h.run(ctx),
        }
    }
}

pub(crate) fn require_id(id: &ConversationId) -> Result<(), Error> {
    if id.is_zero() {
        return Err(Error::InvalidField {
            field: "id",
            reason: "zero conversation id".into(),
        });
    }
    Ok(())
}

pub(crate) fn require_address(field: &'static str, address: &Address) -> Result<(), Error> {
    if address.is_zero() {
        return Err(Error::InvalidField {
            field,
            reason: "zero address".into(),
        });
    }
    Ok(())
}

pub(crate) fn require_amount(amount: &Coin, native_denom: &str) -> Result<(), Error> {
    amount.require_native(native_denom)?;
    if amount.amount == 0 {
        return Err(Error::InvalidField {
            field: "amount",
            reason: "amount must be positive".into(),
        });
    }
    Ok(())
}

pub(crate) fn load_active<S: ReadStore>(
    store: &MasterStore<S>,
    id: &ConversationId,
) -> Result<Conversation, Error> {
    store.conversations().get(Bucket::Active, id)
}

pub(crate) fn require_caller(role: &str, expected: &Address, signer: &Address) -> Result<(), Error> {
    if expected != signer {
        return Err(Error::Unauthorized(format!(
            "signer {} is not the {} {}",
            signer, role, expected
        )));
    }
    Ok(())
}

pub(crate) fn require_open(conv: &Conversation, now: u64) -> Result<(), Error> {
    if conv.is_expired(now) {
        return Err(Error::Expired(conv.id));
    }
    Ok(())
}

pub(crate) fn require_kind(offer: &Offer, expected: OfferKind) -> Result<(), Error> {
    if offer.kind != expected {
        return Err(Error::WrongOfferKind {
            expected,
            found: offer.kind,
        });
    }
    Ok(())
}

pub(crate) fn require_above(amount: &Coin, standing: &Offer) -> Result<(), Error> {
    if amount.amount <= standing.amount.amount {
        return Err(Error::AmountTooLow {
            amount: amount.amount,
            floor: standing.amount.amount,
        });
    }
    Ok(())
}

/// Retire the active offer and move the conversation out of the active bucket.
pub(crate) fn close<S: Store>(
    ctx: &mut Context<'_, S>,
    mut offer: Offer,
    fund_status: FundStatus,
    to: Bucket,
) -> Result<(), Error> {
    offer.deactivate(fund_status);
    ctx.store.offers_mut().set_offer(&offer)?;
    ctx.store
        .conversations_mut()
        .move_conversation(&offer.conversation_id, Bucket::Active, to)?;
    Ok(())
}
