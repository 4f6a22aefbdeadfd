//! ezbid-core: bid and counter-offer negotiation over on-chain assets.
//!
//! An owner and a bidder trade offers on one asset inside a *conversation*.
//! The bidder's funds are locked while their bid stands; a counter-offer
//! from the owner refunds them. Either side may accept the other's standing
//! offer, after which funds and asset change hands.
//!
//! - `State` / `Overlay`: path-addressed key-value substrate with staging
//! - `MasterStore`: conversation buckets and append-only offer history
//! - `Transaction`: the six request kinds and their handlers
//! - `Engine`: check, deliver and commit over named extension stores

mod codec;
mod error;
mod hash;
mod model;
mod tx;

pub mod asset;
pub mod config;
pub mod context;
pub mod engine;
pub mod event;
pub mod genesis;
pub mod handlers;
pub mod ledger;
pub mod state;
pub mod store;

pub use asset::{Asset, AssetType, NameAsset};
pub use config::{EngineConfig, FeeSchedule, StoreNames};
pub use context::BlockHeader;
pub use engine::Engine;
pub use error::{Error, ErrorClass};
pub use event::{Attribute, Event, TxResponse};
pub use genesis::GenesisParams;
pub use hash::{ConversationId, Hash};
pub use model::{
    Address, Bucket, Coin, Conversation, Decision, FundStatus, Offer, OfferKind, OfferStatus,
};
pub use state::{Mutation, Path, State, Value};
pub use store::ConversationFilter;
pub use tx::{SignedTx, Transaction, TxType};

/// Re-export for convenience
pub use ed25519_dalek::{SigningKey, VerifyingKey};
