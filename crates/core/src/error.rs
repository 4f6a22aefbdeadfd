//! Error types for ezbid-core.

use thiserror::Error;

use crate::{ConversationId, OfferKind};

/// Coarse classification of a failure, used for response codes and logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad signature, fee or payload. Caught before business logic runs.
    Malformed,
    /// A referenced conversation, offer or store does not exist.
    NotFound,
    /// A business rule rejected the request.
    Rule,
    /// Stored state violates an invariant. Fatal for the transaction.
    Consistency,
    /// Startup configuration is unusable.
    Config,
}

/// Core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Signature does not verify against the declared signer.
    #[error("invalid signature for signer: {0}")]
    InvalidSignature(String),

    /// Payload could not be decoded for its declared type.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A payload field is malformed.
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Coin is not in the native denomination.
    #[error("invalid denomination: expected {expected}, got {got}")]
    InvalidDenom { expected: String, got: String },

    /// Fee is below the schedule.
    #[error("insufficient fee: required {required}, offered {offered}")]
    InsufficientFee { required: u64, offered: u64 },

    /// Nonce is not the signer's next account sequence.
    #[error("bad nonce for {address}: expected {expected}, got {got}")]
    BadNonce { address: String, expected: u64, got: u64 },

    /// No conversation with this id in the expected bucket.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// An active conversation without its controlling offer.
    #[error("no active offer for conversation {0}")]
    NoActiveOffer(ConversationId),

    /// A named extension store is not registered.
    #[error("store not found: {0}")]
    StoreNotFound(String),

    /// The asset does not exist in its registry.
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// Caller is not the party allowed to act.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The conversation deadline has passed.
    #[error("conversation {0} has expired")]
    Expired(ConversationId),

    /// A new conversation must have a deadline after the block time.
    #[error("deadline {deadline} is not after block time {now}")]
    DeadlineInPast { deadline: u64, now: u64 },

    /// Expiry requested before the deadline.
    #[error("conversation {0} has not reached its deadline")]
    NotYetExpired(ConversationId),

    /// The active offer is of the wrong kind for this request.
    #[error("wrong offer kind: expected {expected:?}, found {found:?}")]
    WrongOfferKind { expected: OfferKind, found: OfferKind },

    /// Amount is on the wrong side of the standing offer.
    #[error("amount {amount} must exceed {floor}")]
    AmountTooLow { amount: u64, floor: u64 },

    /// An active conversation for the same parties and asset exists.
    #[error("duplicate active conversation {0}")]
    DuplicateConversation(ConversationId),

    /// The bidder already has an open offer.
    #[error("bidder already has an open offer in conversation {0}")]
    DuplicateOffer(ConversationId),

    /// A conversation id collides with an existing record.
    #[error("conversation {0} already exists")]
    ConversationExists(ConversationId),

    /// Ledger debit exceeds the balance.
    #[error("insufficient funds for {address}: balance {balance}, needed {needed}")]
    InsufficientFunds { address: String, balance: u64, needed: u64 },

    /// The asset exists but cannot be negotiated right now.
    #[error("asset unavailable: {0}")]
    AssetUnavailable(String),

    /// A deliver was attempted outside a block.
    #[error("no block in progress")]
    NoBlockInProgress,

    /// More than one Active offer for one conversation.
    #[error("multiple active offers for conversation {0}")]
    MultipleActiveOffers(ConversationId),

    /// A credit would push a balance past the representable maximum.
    #[error("balance overflow for {0}")]
    BalanceOverflow(String),

    /// Stored state is inconsistent.
    #[error("storage inconsistency: {0}")]
    Inconsistent(String),

    /// A stored counter ran out of range.
    #[error("counter overflow: {0}")]
    Overflow(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidSignature(_)
            | Error::InvalidPayload(_)
            | Error::InvalidField { .. }
            | Error::InvalidDenom { .. }
            | Error::InsufficientFee { .. }
            | Error::BadNonce { .. } => ErrorClass::Malformed,

            Error::ConversationNotFound(_)
            | Error::NoActiveOffer(_)
            | Error::StoreNotFound(_)
            | Error::AssetNotFound(_) => ErrorClass::NotFound,

            Error::Unauthorized(_)
            | Error::Expired(_)
            | Error::DeadlineInPast { .. }
            | Error::NotYetExpired(_)
            | Error::WrongOfferKind { .. }
            | Error::AmountTooLow { .. }
            | Error::DuplicateConversation(_)
            | Error::DuplicateOffer(_)
            | Error::ConversationExists(_)
            | Error::InsufficientFunds { .. }
            | Error::AssetUnavailable(_)
            | Error::NoBlockInProgress
            | Error::BalanceOverflow(_) => ErrorClass::Rule,

            Error::MultipleActiveOffers(_)
            | Error::Inconsistent(_)
            | Error::Overflow(_)
            | Error::Serialization(_) => ErrorClass::Consistency,

            Error::Config(_) => ErrorClass::Config,
        }
    }

    /// Stable machine-readable response code. Zero is reserved for success.
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidSignature(_) => 2,
            Error::InvalidPayload(_) => 3,
            Error::InvalidField { .. } => 4,
            Error::InvalidDenom { .. } => 5,
            Error::InsufficientFee { .. } => 6,
            Error::BadNonce { .. } => 7,

            Error::ConversationNotFound(_) => 20,
            Error::NoActiveOffer(_) => 21,
            Error::StoreNotFound(_) => 22,
            Error::AssetNotFound(_) => 23,

            Error::Unauthorized(_) => 40,
            Error::Expired(_) => 41,
            Error::DeadlineInPast { .. } => 42,
            Error::NotYetExpired(_) => 43,
            Error::WrongOfferKind { .. } => 44,
            Error::AmountTooLow { .. } => 45,
            Error::DuplicateConversation(_) => 46,
            Error::DuplicateOffer(_) => 47,
            Error::ConversationExists(_) => 48,
            Error::InsufficientFunds { .. } => 49,
            Error::AssetUnavailable(_) => 50,
            Error::NoBlockInProgress => 51,
            Error::BalanceOverflow(_) => 52,

            Error::MultipleActiveOffers(_) => 60,
            Error::Inconsistent(_) => 61,
            Error::Overflow(_) => 62,
            Error::Serialization(_) => 63,

            Error::Config(_) => 80,
        }
    }

    /// Whether this error signals a broken invariant rather than a bad request.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Consistency
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        Error::Serialization(e.to_string())
    }
}
