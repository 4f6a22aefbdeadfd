use super::{Handler, close, load_active, require_address, require_id};
use crate::context::Context;
use crate::ledger;
use crate::state::Store;
use crate::{Address, Bucket, ConversationId, Error, FundStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

/// System request closing a conversation whose deadline has passed.
/// Must be signed by a member of the validator set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireBid {
    pub id: ConversationId,
    pub validator: Address,
}

impl Handler for ExpireBid {
    fn validate(&self, _native_denom: &str) -> Result<(), Error> {
        require_id(&self.id)?;
        require_address("validator", &self.validator)
    }

    fn principal(&self) -> (&'static str, Address) {
        ("validator", self.validator)
    }

    fn conversation_id(&self) -> Option<ConversationId> {
        Some(self.id)
    }

    fn run<S: Store>(&self, ctx: &mut Context<'_, S>) -> Result<ConversationId, Error> {
        if !ctx.validators.contains(&ctx.signer) {
            return Err(Error::Unauthorized(format!(
                "{} is not an active validator",
                ctx.signer
            )));
        }

        let conv = load_active(&ctx.store, &self.id)?;
        if !conv.is_expired(ctx.now()) {
            return Err(Error::NotYetExpired(self.id));
        }

        let offer = ctx.store.offers().get_active_offer(&self.id)?;
        if offer.fund_status == FundStatus::Locked {
            ledger::unlock(&mut ctx.ledger, &conv.bidder, &offer.amount)?;
        }
        close(ctx, offer, FundStatus::Unlocked, Bucket::Expired)?;
        info!(conversation = %self.id, deadline = conv.deadline, "conversation expired");
        Ok(self.id)
    }
}
