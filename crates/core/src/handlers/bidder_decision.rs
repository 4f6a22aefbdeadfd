use super::{Handler, close, load_active, require_address, require_caller, require_id, require_kind};
use crate::context::Context;
use crate::event::Attribute;
use crate::ledger;
use crate::state::Store;
use crate::{Address, ConversationId, Decision, Error, FundStatus, OfferKind};
use serde::{Deserialize, Serialize};
use tracing::info;

/// The bidder accepts or rejects the owner's counter-offer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidderDecision {
    pub id: ConversationId,
    pub bidder: Address,
    pub decision: Decision,
}

impl Handler for BidderDecision {
    fn validate(&self, _native_denom: &str) -> Result<(), Error> {
        require_id(&self.id)?;
        require_address("bidder", &self.bidder)
    }

    fn principal(&self) -> (&'static str, Address) {
        ("bidder", self.bidder)
    }

    fn conversation_id(&self) -> Option<ConversationId> {
        Some(self.id)
    }

    fn extras(&self) -> Vec<Attribute> {
        vec![Attribute::new("decision", self.decision.as_str())]
    }

    fn run<S: Store>(&self, ctx: &mut Context<'_, S>) -> Result<ConversationId, Error> {
        let conv = load_active(&ctx.store, &self.id)?;
        require_caller("bidder", &conv.bidder, &ctx.signer)?;

        let counter = ctx.store.offers().get_active_offer(&self.id)?;
        require_kind(&counter, OfferKind::CounterOffer)?;

        let fund_status = match self.decision {
            Decision::Reject => FundStatus::Unlocked,
            Decision::Accept => {
                // The counter holds no funds; the bidder pays it now.
                ledger::lock(&mut ctx.ledger, &conv.bidder, &counter.amount)?;
                ledger::release(&mut ctx.ledger, &conv.owner, &counter.amount)?;
                conv.asset.exchange(&mut ctx.assets, &conv.owner, &conv.bidder)?;
                FundStatus::Transferred
            }
        };
        close(ctx, counter, fund_status, self.decision.target())?;
        info!(conversation = %self.id, decision = self.decision.as_str(), "bidder decided");
        Ok(self.id)
    }
}
