//! The ezbid engine: checks and delivers transactions and maintains state.
//!
//! A transaction runs in three stages over staged overlays:
//!
//! 1. admission: signature, payload, field shape, fee floor, and a nonce
//!    equal to the signer's account sequence. Failures here cost nothing and
//!    change nothing.
//! 2. fee: the signer's sequence is advanced and the fee debited in their own
//!    overlay. Both are kept whatever the business outcome, so a delivered
//!    transaction can never be applied again.
//! 3. business: the handler runs over fresh overlays, the bank overlay
//!    stacked on the fee overlay. Its writes are kept only on success.

use crate::asset::{AssetContext, NameEntry, NameRegistry};
use crate::config::EngineConfig;
use crate::context::{BlockHeader, ChangeSet, Context, StoreRegistry};
use crate::event::{Event, TxResponse};
use crate::genesis::{GenesisParams, create_genesis};
use crate::ledger::{Ledger, StoreLedger};
use crate::state::{Overlay, ReadStore, State};
use crate::store::{ConversationFilter, MasterStore};
use crate::{
    Address, Bucket, Conversation, ConversationId, Error, Hash, Offer, SignedTx, Transaction,
};
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// The outcome of one execution: its response and the writes to keep.
#[derive(Debug)]
struct Execution {
    response: TxResponse,
    changes: ChangeSet,
}

impl Execution {
    /// Refused before any state was touched.
    fn refused(err: &Error, tx: Option<&Transaction>) -> Self {
        let events = tx.map(|tx| vec![failure_event(tx, err)]).unwrap_or_default();
        Self {
            response: TxResponse::failed(err, events),
            changes: ChangeSet::default(),
        }
    }
}

fn failure_event(tx: &Transaction, err: &Error) -> Event {
    Event::tagged(
        tx.tx_type(),
        tx.conversation_id(),
        tx.principal(),
        tx.extras(),
        Err(err),
    )
}

/// The block being built between `begin_block` and `commit`.
#[derive(Debug)]
struct Block {
    header: BlockHeader,
    working: StoreRegistry,
    delivered: usize,
}

/// The ezbid engine.
pub struct Engine {
    config: EngineConfig,
    validators: BTreeSet<Address>,

    /// State as of the last commit. Checks and queries read this.
    committed: StoreRegistry,
    last_header: BlockHeader,
    app_hash: Hash,

    block: Option<Block>,
}

impl Engine {
    /// Validate the configuration and build the genesis state.
    pub fn new(config: EngineConfig, genesis: &GenesisParams) -> Result<Self, Error> {
        config.validate()?;
        let genesis = create_genesis(genesis, &config)?;
        let app_hash = genesis.stores.hash()?;
        info!(native_denom = %config.native_denom, app_hash = %app_hash, "engine started");
        Ok(Self {
            config,
            validators: genesis.validators,
            committed: genesis.stores,
            last_header: BlockHeader::default(),
            app_hash,
            block: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn validators(&self) -> &BTreeSet<Address> {
        &self.validators
    }

    /// Header of the last committed block.
    pub fn last_header(&self) -> BlockHeader {
        self.last_header
    }

    /// Root hash of the committed state.
    pub fn app_hash(&self) -> Hash {
        self.app_hash
    }

    /// Speculatively execute against the committed state. Nothing is kept.
    pub fn check_tx(&self, tx: &SignedTx) -> TxResponse {
        let execution = execute(
            &self.config,
            &self.validators,
            &self.committed,
            self.last_header,
            tx,
        );
        debug!(code = execution.response.code, "checked transaction");
        execution.response
    }

    /// Start a block. Deliveries apply to its working state in order.
    pub fn begin_block(&mut self, header: BlockHeader) -> Result<(), Error> {
        if let Some(block) = &self.block {
            return Err(Error::Inconsistent(format!(
                "block {} is still in progress",
                block.header.height
            )));
        }
        if header.height <= self.last_header.height {
            return Err(Error::InvalidField {
                field: "height",
                reason: format!("{} does not follow {}", header.height, self.last_header.height),
            });
        }
        if header.time < self.last_header.time {
            return Err(Error::InvalidField {
                field: "time",
                reason: format!("{} is before {}", header.time, self.last_header.time),
            });
        }
        debug!(height = header.height, time = header.time, "begin block");
        self.block = Some(Block {
            header,
            working: self.committed.clone(),
            delivered: 0,
        });
        Ok(())
    }

    /// Execute a transaction in the current block and keep its writes.
    ///
    /// Rejected transactions still produce a response. `Err` means no block
    /// is in progress or the working state could not take the writes.
    pub fn deliver_tx(&mut self, tx: &SignedTx) -> Result<TxResponse, Error> {
        let block = self.block.as_mut().ok_or(Error::NoBlockInProgress)?;
        let execution = execute(&self.config, &self.validators, &block.working, block.header, tx);
        block.working.apply(execution.changes)?;
        block.delivered += 1;
        Ok(execution.response)
    }

    /// Publish the working state and return the new app hash.
    pub fn commit(&mut self) -> Result<Hash, Error> {
        let block = self.block.take().ok_or(Error::NoBlockInProgress)?;
        let app_hash = block.working.hash()?;
        self.committed = block.working;
        self.last_header = block.header;
        self.app_hash = app_hash;
        info!(
            height = block.header.height,
            txs = block.delivered,
            app_hash = %app_hash,
            "committed block"
        );
        Ok(app_hash)
    }

    fn master(&self) -> Result<MasterStore<&State>, Error> {
        Ok(MasterStore::new(self.committed.get(&self.config.stores.bids)?))
    }

    /// Look a conversation up in every bucket.
    pub fn conversation(&self, id: &ConversationId) -> Result<Option<(Bucket, Conversation)>, Error> {
        self.master()?.conversations().query_all_stores(id)
    }

    /// Conversations of one bucket matching `filter`.
    pub fn conversations(
        &self,
        bucket: Bucket,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, Error> {
        self.master()?.conversations().filter_conversations(bucket, filter)
    }

    /// Offer history of a conversation, oldest first.
    pub fn offers(&self, id: &ConversationId) -> Result<Vec<Offer>, Error> {
        self.master()?.offers().offers_for_conversation(id)
    }

    pub fn active_offer(&self, id: &ConversationId) -> Result<Offer, Error> {
        self.master()?.offers().get_active_offer(id)
    }

    /// Committed balance in the native denomination.
    pub fn balance(&self, address: &Address) -> Result<u64, Error> {
        StoreLedger::new(self.committed.get(&self.config.stores.bank)?)
            .read_balance(address, &self.config.native_denom)
    }

    /// Nonce the next transaction from `address` must carry.
    pub fn next_nonce(&self, address: &Address) -> Result<u64, Error> {
        StoreLedger::new(self.committed.get(&self.config.stores.bank)?).sequence(address)
    }

    pub fn name(&self, name: &str) -> Result<Option<NameEntry>, Error> {
        NameRegistry::new(self.committed.get(&self.config.stores.names)?).get(name)
    }

    /// Active conversations whose deadline has been reached at `now`.
    /// Validators turn these into expiry requests.
    pub fn due_for_expiry(&self, now: u64) -> Result<Vec<ConversationId>, Error> {
        Ok(self
            .master()?
            .conversations()
            .list(Bucket::Active)?
            .into_iter()
            .filter(|conv| conv.is_expired(now))
            .map(|conv| conv.id)
            .collect())
    }
}

/// Run one transaction against `stores` and report what to keep.
fn execute(
    config: &EngineConfig,
    validators: &BTreeSet<Address>,
    stores: &StoreRegistry,
    header: BlockHeader,
    tx: &SignedTx,
) -> Execution {
    let (tx_hash, signer) = match tx.hash().and_then(|hash| Ok((hash, tx.verify_signature()?))) {
        Ok(admitted) => admitted,
        Err(err) => return Execution::refused(&err, None),
    };
    let decoded = match tx.decode() {
        Ok(decoded) => decoded,
        Err(err) => return Execution::refused(&err, None),
    };
    if let Err(err) = admit(config, tx, &decoded, &signer) {
        debug!(tx = %tx_hash, error = %err, "transaction refused");
        return Execution::refused(&err, Some(&decoded));
    }

    let bank_name = &config.stores.bank;
    let bank = match stores.get(bank_name) {
        Ok(bank) => bank,
        Err(err) => return Execution::refused(&err, Some(&decoded)),
    };
    if let Err(err) = check_sequence(bank, &signer, tx.nonce) {
        debug!(tx = %tx_hash, error = %err, "transaction refused");
        return Execution::refused(&err, Some(&decoded));
    }
    let mut fee_overlay = Overlay::new(bank);
    if let Err(err) = charge_fee(config, &mut fee_overlay, &signer, tx) {
        debug!(tx = %tx_hash, error = %err, "fee not paid");
        return Execution::refused(&err, Some(&decoded));
    }

    let env = Env {
        config,
        validators,
        header,
        tx_hash,
        signer,
    };
    let outcome = run_business(&env, stores, &fee_overlay, &decoded);

    let mut changes = ChangeSet::default();
    changes.push(bank_name, fee_overlay.into_mutations());
    let tx_type = decoded.tx_type();
    let response = match outcome {
        Ok((id, business)) => {
            changes.0.extend(business.0);
            info!(tx = %tx_hash, tx_type = tx_type.tag(), conversation = %id, "transaction succeeded");
            TxResponse::ok(vec![Event::tagged(
                tx_type,
                Some(id),
                decoded.principal(),
                decoded.extras(),
                Ok(()),
            )])
        }
        Err(err) => {
            if err.is_fatal() {
                error!(
                    target: "ezbid::invariant",
                    tx = %tx_hash,
                    tx_type = tx_type.tag(),
                    code = err.code(),
                    error = %err,
                    "consistency failure, transaction aborted"
                );
            } else {
                warn!(tx = %tx_hash, tx_type = tx_type.tag(), code = err.code(), error = %err, "transaction failed");
            }
            TxResponse::failed(&err, vec![failure_event(&decoded, &err)])
        }
    };
    Execution { response, changes }
}

/// Static checks made before any fee is taken.
fn admit(
    config: &EngineConfig,
    tx: &SignedTx,
    decoded: &Transaction,
    signer: &Address,
) -> Result<(), Error> {
    decoded.validate(&config.native_denom)?;

    let (role, declared) = decoded.principal();
    if declared != *signer {
        return Err(Error::InvalidSignature(format!(
            "declared {} {} did not sign",
            role, declared
        )));
    }

    tx.fee.require_native(&config.native_denom)?;
    let required = config.fees.minimum(tx.tx_type);
    if tx.fee.amount < required {
        return Err(Error::InsufficientFee {
            required,
            offered: tx.fee.amount,
        });
    }
    Ok(())
}

fn check_sequence(bank: &State, signer: &Address, nonce: u64) -> Result<(), Error> {
    let expected = StoreLedger::new(bank).sequence(signer)?;
    if nonce != expected {
        return Err(Error::BadNonce {
            address: signer.to_hex(),
            expected,
            got: nonce,
        });
    }
    Ok(())
}

/// Take the fee and consume the signer's sequence.
fn charge_fee(
    config: &EngineConfig,
    bank: &mut Overlay<'_>,
    signer: &Address,
    tx: &SignedTx,
) -> Result<(), Error> {
    let mut ledger = StoreLedger::new(bank);
    ledger.advance_sequence(signer)?;
    if tx.fee.amount == 0 {
        return Ok(());
    }
    ledger.debit(signer, &tx.fee)?;
    if let Some(collector) = &config.fee_collector {
        ledger.credit(collector, &tx.fee)?;
    }
    Ok(())
}

/// Per-transaction facts handed to the handler context.
struct Env<'a> {
    config: &'a EngineConfig,
    validators: &'a BTreeSet<Address>,
    header: BlockHeader,
    tx_hash: Hash,
    signer: Address,
}

fn run_business<'a>(
    env: &Env<'_>,
    stores: &'a StoreRegistry,
    bank: &'a dyn ReadStore,
    tx: &Transaction,
) -> Result<(ConversationId, ChangeSet), Error> {
    let names = &env.config.stores;
    let mut bids_overlay = Overlay::new(stores.get(&names.bids)?);
    let mut bank_overlay: Overlay<'a> = Overlay::new(bank);
    let mut names_overlay = Overlay::new(stores.get(&names.names)?);

    let id = {
        let mut ctx = Context {
            header: env.header,
            signer: env.signer,
            tx_hash: env.tx_hash,
            native_denom: &env.config.native_denom,
            validators: env.validators,
            store: MasterStore::new(&mut bids_overlay),
            ledger: StoreLedger::new(&mut bank_overlay),
            assets: AssetContext::new(&mut names_overlay, env.header.time),
        };
        tx.run(&mut ctx)?
    };

    let mut changes = ChangeSet::default();
    changes.push(&names.bids, bids_overlay.into_mutations());
    changes.push(&names.bank, bank_overlay.into_mutations());
    changes.push(&names.names, names_overlay.into_mutations());
    Ok((id, changes))
}
