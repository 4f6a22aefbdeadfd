use super::{
    Handler, load_active, require_above, require_address, require_amount, require_caller,
    require_id, require_kind, require_open,
};
use crate::context::Context;
use crate::event::Attribute;
use crate::ledger;
use crate::state::Store;
use crate::store::NewOffer;
use crate::{Address, Coin, ConversationId, Error, FundStatus, OfferKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The owner answers the standing bid with a higher price. The bidder's
/// funds go back to them; the counter itself holds nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterOffer {
    pub id: ConversationId,
    pub owner: Address,
    pub amount: Coin,
    pub offer_time: u64,
}

impl Handler for CounterOffer {
    fn validate(&self, native_denom: &str) -> Result<(), Error> {
        require_id(&self.id)?;
        require_address("owner", &self.owner)?;
        require_amount(&self.amount, native_denom)
    }

    fn principal(&self) -> (&'static str, Address) {
        ("owner", self.owner)
    }

    fn conversation_id(&self) -> Option<ConversationId> {
        Some(self.id)
    }

    fn extras(&self) -> Vec<Attribute> {
        vec![Attribute::new("amount", &self.amount)]
    }

    fn run<S: Store>(&self, ctx: &mut Context<'_, S>) -> Result<ConversationId, Error> {
        let conv = load_active(&ctx.store, &self.id)?;
        require_caller("owner", &conv.owner, &ctx.signer)?;
        require_open(&conv, ctx.now())?;

        let mut bid = ctx.store.offers().get_active_offer(&self.id)?;
        require_kind(&bid, OfferKind::Offer)?;
        require_above(&self.amount, &bid)?;

        ledger::unlock(&mut ctx.ledger, &conv.bidder, &bid.amount)?;
        bid.deactivate(FundStatus::Unlocked);
        ctx.store.offers_mut().set_offer(&bid)?;

        let offer = ctx.store.offers_mut().add_offer(NewOffer {
            conversation_id: self.id,
            kind: OfferKind::CounterOffer,
            fund_status: FundStatus::Unlocked,
            amount: self.amount.clone(),
            offer_time: self.offer_time,
        })?;
        debug!(conversation = %self.id, seq = offer.seq, amount = %offer.amount, "counter-offer placed");
        Ok(self.id)
    }
}
