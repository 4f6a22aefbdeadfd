use super::{
    Handler, load_active, require_above, require_address, require_amount, require_caller,
    require_id, require_open,
};
use crate::context::Context;
use crate::event::Attribute;
use crate::ledger;
use crate::state::Store;
use crate::store::{ConversationFilter, NewOffer};
use crate::{
    Address, Asset, AssetType, Bucket, Coin, Conversation, ConversationId, Error, FundStatus,
    Hash, OfferKind,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Open a conversation, or raise the bid in an existing one.
///
/// Without `id` a new conversation is created from the other fields. With
/// `id` the stored conversation is used and only `amount`, `offer_time` and
/// the signer matter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBid {
    pub id: Option<ConversationId>,
    pub owner: Address,
    pub asset: Asset,
    pub asset_type: AssetType,
    pub bidder: Address,
    pub amount: Coin,
    pub offer_time: u64,
    /// Absolute deadline. Only read when opening a conversation.
    pub deadline: u64,
}

impl CreateBid {
    fn open_conversation<S: Store>(&self, ctx: &mut Context<'_, S>) -> Result<ConversationId, Error> {
        self.asset.validate(&ctx.assets, &self.owner)?;

        let filter = ConversationFilter {
            owner: Some(self.owner),
            asset: Some(self.asset.clone()),
            asset_type: Some(self.asset_type),
            bidder: Some(self.bidder),
        };
        if let Some(existing) = ctx
            .store
            .conversations()
            .filter_conversations(Bucket::Active, &filter)?
            .first()
        {
            return Err(Error::DuplicateConversation(existing.id));
        }

        let now = ctx.now();
        if self.deadline <= now {
            return Err(Error::DeadlineInPast {
                deadline: self.deadline,
                now,
            });
        }

        let id = Hash::of_value(&(
            ctx.tx_hash,
            ctx.header.height,
            &self.owner,
            &self.bidder,
            &self.asset,
        ))?;
        let conv = Conversation {
            id,
            owner: self.owner,
            bidder: self.bidder,
            asset: self.asset.clone(),
            asset_type: self.asset_type,
            deadline: self.deadline,
            open: true,
            created_at: now,
        };
        ctx.store.conversations_mut().create(&conv)?;
        debug!(conversation = %id, asset = conv.asset.label(), "opened conversation");
        Ok(id)
    }
}

impl Handler for CreateBid {
    fn validate(&self, native_denom: &str) -> Result<(), Error> {
        if let Some(id) = &self.id {
            require_id(id)?;
        }
        require_address("owner", &self.owner)?;
        require_address("bidder", &self.bidder)?;
        if self.owner == self.bidder {
            return Err(Error::InvalidField {
                field: "bidder",
                reason: "owner cannot bid on their own asset".into(),
            });
        }
        self.asset.validate_shape()?;
        if self.asset.asset_type() != self.asset_type {
            return Err(Error::InvalidField {
                field: "asset_type",
                reason: format!("{:?} does not match the asset", self.asset_type),
            });
        }
        require_amount(&self.amount, native_denom)
    }

    fn principal(&self) -> (&'static str, Address) {
        ("bidder", self.bidder)
    }

    fn conversation_id(&self) -> Option<ConversationId> {
        self.id
    }

    fn extras(&self) -> Vec<Attribute> {
        vec![
            Attribute::new("owner", self.owner),
            Attribute::new("asset", self.asset.label()),
            Attribute::new("amount", &self.amount),
        ]
    }

    fn run<S: Store>(&self, ctx: &mut Context<'_, S>) -> Result<ConversationId, Error> {
        let id = match self.id {
            Some(id) => id,
            None => self.open_conversation(ctx)?,
        };

        let conv = load_active(&ctx.store, &id)?;
        conv.asset.validate(&ctx.assets, &conv.owner)?;
        require_caller("bidder", &conv.bidder, &ctx.signer)?;
        require_open(&conv, ctx.now())?;

        if self.id.is_some() {
            let mut standing = ctx.store.offers().get_active_offer(&id)?;
            match standing.kind {
                OfferKind::Offer => return Err(Error::DuplicateOffer(id)),
                OfferKind::CounterOffer => {
                    require_above(&self.amount, &standing)?;
                    // Counter-offers hold no funds, so nothing to refund.
                    standing.deactivate(FundStatus::Unlocked);
                    ctx.store.offers_mut().set_offer(&standing)?;
                }
            }
        }

        ledger::lock(&mut ctx.ledger, &conv.bidder, &self.amount)?;
        let offer = ctx.store.offers_mut().add_offer(NewOffer {
            conversation_id: id,
            kind: OfferKind::Offer,
            fund_status: FundStatus::Locked,
            amount: self.amount.clone(),
            offer_time: self.offer_time,
        })?;
        debug!(conversation = %id, seq = offer.seq, amount = %offer.amount, "bid placed");
        Ok(id)
    }
}
