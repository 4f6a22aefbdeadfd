//! Property tests: random negotiation histories never break the invariants.

use ezbid_core::genesis::{GenesisAccount, GenesisName};
use ezbid_core::handlers::{
    BidderDecision, CancelBid, CounterOffer, CreateBid, ExpireBid, OwnerDecision,
};
use ezbid_core::{
    Address, Asset, AssetType, BlockHeader, Bucket, Coin, Conversation, ConversationFilter,
    ConversationId, Decision, Engine, EngineConfig, FundStatus, GenesisParams, Hash, Offer,
    OfferKind, OfferStatus, SignedTx, SigningKey, Transaction,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

const FUNDS: u64 = 10_000;
const DEADLINE: u64 = 500;
const COLLECTOR: Address = Address([0xFE; 20]);

#[derive(Clone, Debug)]
enum Step {
    Bid(u64),
    Counter(u64),
    OwnerDecides(bool),
    BidderDecides(bool),
    Cancel,
    Expire,
    Wait(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (1u64..3_000).prop_map(Step::Bid),
        2 => (1u64..3_000).prop_map(Step::Counter),
        1 => any::<bool>().prop_map(Step::OwnerDecides),
        1 => any::<bool>().prop_map(Step::BidderDecides),
        1 => Just(Step::Cancel),
        1 => Just(Step::Expire),
        1 => (1u64..200).prop_map(Step::Wait),
    ]
}

struct Harness {
    engine: Engine,
    owner: SigningKey,
    bidder: SigningKey,
    validator: SigningKey,
    time: u64,
    /// Conversation currently being negotiated, if any.
    current: Option<ConversationId>,
    seen: BTreeSet<ConversationId>,
}

fn addr(key: &SigningKey) -> Address {
    Address::from_public_key(&key.verifying_key())
}

impl Harness {
    fn new() -> Self {
        let owner = SigningKey::from_bytes(&[1; 32]);
        let bidder = SigningKey::from_bytes(&[2; 32]);
        let validator = SigningKey::from_bytes(&[3; 32]);
        let mut config = EngineConfig::new("uol");
        config.fee_collector = Some(COLLECTOR);
        let genesis = GenesisParams {
            validators: vec![addr(&validator)],
            accounts: vec![
                GenesisAccount {
                    address: addr(&bidder),
                    coins: vec![Coin::new("uol", FUNDS)],
                },
                GenesisAccount {
                    address: addr(&owner),
                    coins: vec![Coin::new("uol", FUNDS)],
                },
            ],
            names: vec![GenesisName {
                name: "x.ol".into(),
                owner: addr(&owner),
                for_sale: false,
                expires_at: u64::MAX,
            }],
        };
        Self {
            engine: Engine::new(config, &genesis).unwrap(),
            owner,
            bidder,
            validator,
            time: 1,
            current: None,
            seen: BTreeSet::new(),
        }
    }

    fn submit(&mut self, signer: SigningKey, tx: Transaction, fee: u64) {
        let nonce = self.engine.next_nonce(&addr(&signer)).unwrap();
        let signed = SignedTx::new(&tx, Coin::new("uol", fee), nonce, &signer).unwrap();
        let height = self.engine.last_header().height + 1;
        self.engine
            .begin_block(BlockHeader {
                height,
                time: self.time,
            })
            .unwrap();
        let response = self.engine.deliver_tx(&signed).unwrap();
        self.engine.commit().unwrap();

        if let Some(id) = response
            .attribute("conversation_id")
            .and_then(Hash::from_hex)
        {
            if response.is_ok() {
                self.seen.insert(id);
            }
            let still_active = matches!(
                self.engine.conversation(&id).unwrap(),
                Some((Bucket::Active, _))
            );
            self.current = still_active.then_some(id);
        }
    }

    fn apply(&mut self, step: &Step) {
        let (a, b) = (addr(&self.owner), addr(&self.bidder));
        let id = self.current;
        match step {
            Step::Wait(secs) => self.time += secs,
            Step::Bid(amount) => {
                let tx = Transaction::CreateBid(CreateBid {
                    id,
                    owner: a,
                    asset: Asset::name("x.ol"),
                    asset_type: AssetType::Name,
                    bidder: b,
                    amount: Coin::new("uol", *amount),
                    offer_time: self.time,
                    deadline: self.time + DEADLINE,
                });
                self.submit(self.bidder.clone(), tx, 1);
            }
            Step::Counter(amount) => {
                if let Some(id) = id {
                    let tx = Transaction::CounterOffer(CounterOffer {
                        id,
                        owner: a,
                        amount: Coin::new("uol", *amount),
                        offer_time: self.time,
                    });
                    self.submit(self.owner.clone(), tx, 1);
                }
            }
            Step::OwnerDecides(accept) => {
                if let Some(id) = id {
                    let tx = Transaction::OwnerDecision(OwnerDecision {
                        id,
                        owner: a,
                        decision: if *accept { Decision::Accept } else { Decision::Reject },
                    });
                    self.submit(self.owner.clone(), tx, 1);
                }
            }
            Step::BidderDecides(accept) => {
                if let Some(id) = id {
                    let tx = Transaction::BidderDecision(BidderDecision {
                        id,
                        bidder: b,
                        decision: if *accept { Decision::Accept } else { Decision::Reject },
                    });
                    self.submit(self.bidder.clone(), tx, 1);
                }
            }
            Step::Cancel => {
                if let Some(id) = id {
                    let tx = Transaction::CancelBid(CancelBid { id, bidder: b });
                    self.submit(self.bidder.clone(), tx, 1);
                }
            }
            Step::Expire => {
                if let Some(id) = id {
                    let tx = Transaction::ExpireBid(ExpireBid {
                        id,
                        validator: addr(&self.validator),
                    });
                    self.submit(self.validator.clone(), tx, 0);
                }
            }
        }
    }

    fn all_conversations(&self) -> Vec<(Bucket, Conversation)> {
        Bucket::ALL
            .into_iter()
            .flat_map(|bucket| {
                self.engine
                    .conversations(bucket, &ConversationFilter::default())
                    .unwrap()
                    .into_iter()
                    .map(move |conv| (bucket, conv))
            })
            .collect()
    }

    fn check_invariants(&self) -> Result<(), TestCaseError> {
        let conversations = self.all_conversations();

        // At most one bucket per id
        let mut ids = BTreeSet::new();
        for (_, conv) in &conversations {
            prop_assert!(ids.insert(conv.id), "conversation {} in two buckets", conv.id);
        }
        prop_assert_eq!(&ids, &self.seen);

        let mut locked = 0u64;
        for (bucket, conv) in &conversations {
            let offers = self.engine.offers(&conv.id).unwrap();
            let active: Vec<&Offer> = offers.iter().filter(|o| o.is_active()).collect();
            prop_assert_eq!(conv.open, *bucket == Bucket::Active);

            if *bucket == Bucket::Active {
                prop_assert_eq!(active.len(), 1, "active conversation needs one active offer");
            } else {
                prop_assert!(active.is_empty(), "closed conversation with an active offer");
            }

            for offer in &offers {
                match offer.fund_status {
                    FundStatus::Locked => {
                        prop_assert_eq!(offer.status, OfferStatus::Active);
                        prop_assert_eq!(offer.kind, OfferKind::Offer);
                        locked += offer.amount.amount;
                    }
                    FundStatus::Transferred => {
                        prop_assert_eq!(*bucket, Bucket::Succeeded);
                    }
                    FundStatus::Unlocked => {}
                }
            }

            // Each counter beats the bid it answers, each later bid beats the counter
            for pair in offers.windows(2) {
                if pair[0].kind != pair[1].kind {
                    prop_assert!(pair[1].amount.amount > pair[0].amount.amount);
                }
            }
        }

        // Money is conserved: spendable + custodied == genesis supply
        let spendable = self.engine.balance(&addr(&self.owner)).unwrap()
            + self.engine.balance(&addr(&self.bidder)).unwrap()
            + self.engine.balance(&COLLECTOR).unwrap();
        prop_assert_eq!(spendable + locked, 2 * FUNDS);
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn negotiation_invariants_hold(steps in prop::collection::vec(step(), 1..24)) {
        let mut harness = Harness::new();
        for step in &steps {
            harness.apply(step);
            harness.check_invariants()?;
        }
    }

    #[test]
    fn records_roundtrip(
        seed in any::<[u8; 8]>(),
        name in "[a-z]{1,10}\\.[a-z]{2,3}",
        deadline in any::<u64>(),
        seq in any::<u64>(),
        amount in any::<u64>(),
        open in any::<bool>(),
    ) {
        let conv = Conversation {
            id: Hash::of(&seed),
            owner: Address([seed[0]; 20]),
            bidder: Address([seed[1]; 20]),
            asset: Asset::name(name),
            asset_type: AssetType::Name,
            deadline,
            open,
            created_at: deadline / 2,
        };
        let offer = Offer {
            conversation_id: conv.id,
            seq,
            kind: if open { OfferKind::Offer } else { OfferKind::CounterOffer },
            status: OfferStatus::Active,
            fund_status: FundStatus::Locked,
            amount: Coin::new("uol", amount),
            offer_time: deadline,
        };

        let mut buf = Vec::new();
        ciborium::into_writer(&conv, &mut buf).unwrap();
        let back: Conversation = ciborium::from_reader(buf.as_slice()).unwrap();
        prop_assert_eq!(back, conv);

        let mut buf = Vec::new();
        ciborium::into_writer(&offer, &mut buf).unwrap();
        let back: Offer = ciborium::from_reader(buf.as_slice()).unwrap();
        prop_assert_eq!(back, offer);
    }
}
