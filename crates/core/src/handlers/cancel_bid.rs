use super::{Handler, close, load_active, require_address, require_caller, require_id, require_kind};
use crate::context::Context;
use crate::ledger;
use crate::state::Store;
use crate::{Address, Bucket, ConversationId, Error, FundStatus, OfferKind};
use serde::{Deserialize, Serialize};
use tracing::info;

/// The bidder withdraws their standing bid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelBid {
    pub id: ConversationId,
    pub bidder: Address,
}

impl Handler for CancelBid {
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

    fn run<S: Store>(&self, ctx: &mut Context<'_, S>) -> Result<ConversationId, Error> {
        let conv = load_active(&ctx.store, &self.id)?;
        require_caller("bidder", &conv.bidder, &ctx.signer)?;

        let bid = ctx.store.offers().get_active_offer(&self.id)?;
        require_kind(&bid, OfferKind::Offer)?;

        ledger::unlock(&mut ctx.ledger, &conv.bidder, &bid.amount)?;
        close(ctx, bid, FundStatus::Unlocked, Bucket::Cancelled)?;
        info!(conversation = %self.id, "bid cancelled");
        Ok(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::*;

    fn cancel(id: ConversationId) -> CancelBid {
        CancelBid { id, bidder: BIDDER }
    }

    #[test]
    fn cancel_refunds_and_closes() {
        let mut fx = Fixture::new();
        let id = fx.open(100);
        fx.run(&cancel(id), BIDDER).unwrap();

        assert_eq!(fx.bucket_of(&id), Some(Bucket::Cancelled));
        assert_eq!(fx.balance(&BIDDER), 1_000);
        let history = fx.history(&id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].fund_status, FundStatus::Unlocked);
        assert!(!history[0].is_active());
    }

    #[test]
    fn only_bidder_may_cancel() {
        let mut fx = Fixture::new();
        let id = fx.open(100);
        assert!(matches!(fx.run(&cancel(id), OWNER), Err(Error::Unauthorized(_))));
        assert_eq!(fx.bucket_of(&id), Some(Bucket::Active));
    }

    #[test]
    fn nothing_to_cancel_under_a_counter() {
        let mut fx = Fixture::new();
        let id = fx.open(100);
        fx.run(&counter(id, 150), OWNER).unwrap();
        assert!(matches!(
            fx.run(&cancel(id), BIDDER),
            Err(Error::WrongOfferKind { .. })
        ));
    }

    #[test]
    fn cancel_then_reopen() {
        let mut fx = Fixture::new();
        let first = fx.open(100);
        fx.run(&cancel(first), BIDDER).unwrap();

        let second = fx.open(120);
        assert_ne!(first, second);
        assert_eq!(fx.balance(&BIDDER), 880);
    }
}
