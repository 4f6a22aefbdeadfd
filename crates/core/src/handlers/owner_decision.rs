use super::{Handler, close, load_active, require_address, require_caller, require_id, require_kind};
use crate::context::Context;
use crate::event::Attribute;
use crate::ledger;
use crate::state::Store;
use crate::{Address, ConversationId, Decision, Error, FundStatus, OfferKind};
use serde::{Deserialize, Serialize};
use tracing::info;

/// The owner accepts or rejects the standing bid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerDecision {
    pub id: ConversationId,
    pub owner: Address,
    pub decision: Decision,
}

impl Handler for OwnerDecision {
    fn validate(&self, _native_denom: &str) -> Result<(), Error> {
        require_id(&self.id)?;
        require_address("owner", &self.owner)
    }

    fn principal(&self) -> (&'static str, Address) {
        ("owner", self.owner)
    }

    fn conversation_id(&self) -> Option<ConversationId> {
        Some(self.id)
    }

    fn extras(&self) -> Vec<Attribute> {
        vec![Attribute::new("decision", self.decision.as_str())]
    }

    fn run<S: Store>(&self, ctx: &mut Context<'_, S>) -> Result<ConversationId, Error> {
        let conv = load_active(&ctx.store, &self.id)?;
        require_caller("owner", &conv.owner, &ctx.signer)?;

        let bid = ctx.store.offers().get_active_offer(&self.id)?;
        require_kind(&bid, OfferKind::Offer)?;

        let fund_status = match self.decision {
            Decision::Reject => {
                ledger::unlock(&mut ctx.ledger, &conv.bidder, &bid.amount)?;
                FundStatus::Unlocked
            }
            Decision::Accept => {
                ledger::release(&mut ctx.ledger, &conv.owner, &bid.amount)?;
                conv.asset.exchange(&mut ctx.assets, &conv.owner, &conv.bidder)?;
                FundStatus::Transferred
            }
        };
        close(ctx, bid, fund_status, self.decision.target())?;
        info!(conversation = %self.id, decision = self.decision.as_str(), "owner decided");
        Ok(self.id)
    }
}
