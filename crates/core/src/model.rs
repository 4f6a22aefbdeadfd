//! Records and value types of the negotiation protocol.

use crate::{Asset, AssetType, ConversationId, Error};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An account address: the first 20 bytes of the BLAKE3 hash of a public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Never a valid party.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Derive the address controlled by a public key.
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let digest = blake3::hash(key.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..20]);
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..8])
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| Error::InvalidField {
            field: "address",
            reason: e.to_string(),
        })?;
        Ok(Self(bytes))
    }
}

// Addresses travel as hex strings so genesis documents stay readable.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An amount in a single denomination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u64,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Reject anything outside the native denomination.
    pub fn require_native(&self, native_denom: &str) -> Result<(), Error> {
        if self.denom != native_denom {
            return Err(Error::InvalidDenom {
                expected: native_denom.to_string(),
                got: self.denom.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Lifecycle bucket of a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Bucket {
    Active,
    Succeeded,
    Rejected,
    Cancelled,
    Expired,
}

impl Bucket {
    /// Probe order used when the bucket of an id is unknown.
    pub const ALL: [Bucket; 5] = [
        Bucket::Active,
        Bucket::Succeeded,
        Bucket::Rejected,
        Bucket::Cancelled,
        Bucket::Expired,
    ];

    /// Storage segment and event value for this bucket.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Active => "active",
            Bucket::Succeeded => "succeeded",
            Bucket::Rejected => "rejected",
            Bucket::Cancelled => "cancelled",
            Bucket::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != Bucket::Active
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One negotiation thread between an asset owner and a bidder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub owner: Address,
    pub bidder: Address,
    pub asset: Asset,
    pub asset_type: AssetType,
    /// Absolute deadline in UTC seconds.
    pub deadline: u64,
    /// Informational: true while the conversation sits in the active bucket.
    pub open: bool,
    /// Block time at creation.
    pub created_at: u64,
}

impl Conversation {
    /// Whether no further offers may be made at block time `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.deadline
    }
}

/// Who made an offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferKind {
    /// Made by the bidder; funds locked.
    Offer,
    /// Made by the owner; never custodies funds.
    CounterOffer,
}

impl OfferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferKind::Offer => "offer",
            OfferKind::CounterOffer => "counter_offer",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferStatus {
    Active,
    Inactive,
}

/// Where the funds behind an offer currently are.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundStatus {
    /// Held in protocol custody.
    Locked,
    /// Returned to (or never taken from) the bidder.
    Unlocked,
    /// Paid to the owner.
    Transferred,
}

/// One monetary proposal in a conversation's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub conversation_id: ConversationId,
    /// Per-conversation sequence number minted by the offer ledger.
    pub seq: u64,
    pub kind: OfferKind,
    pub status: OfferStatus,
    pub fund_status: FundStatus,
    pub amount: Coin,
    /// Caller-supplied logical time. Display only.
    pub offer_time: u64,
}

impl Offer {
    pub fn is_active(&self) -> bool {
        self.status == OfferStatus::Active
    }

    /// Retire this offer, recording where its funds went.
    pub fn deactivate(&mut self, fund_status: FundStatus) {
        self.status = OfferStatus::Inactive;
        self.fund_status = fund_status;
    }
}

/// Accept or reject the standing offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Reject => "reject",
        }
    }

    /// The bucket a conversation lands in after this decision.
    pub fn target(&self) -> Bucket {
        match self {
            Decision::Accept => Bucket::Succeeded,
            Decision::Reject => Bucket::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn address_hex_roundtrip() {
        let addr = Address([7u8; 20]);
        let parsed: Address = addr.to_hex().parse().unwrap();
        assert_eq!(parsed, addr);
        assert!("not-hex".parse::<Address>().is_err());
    }

    #[test]
    fn address_serializes_as_hex_string() {
        let addr = Address([0xab; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(20)));
    }

    #[test]
    fn native_denom_enforced() {
        assert!(Coin::new("uol", 5).require_native("uol").is_ok());
        assert!(matches!(
            Coin::new("uatom", 5).require_native("uol"),
            Err(Error::InvalidDenom { .. })
        ));
    }

    #[test]
    fn expiry_is_inclusive_of_deadline() {
        let conv = Conversation {
            id: crate::Hash::of(b"c"),
            owner: Address([1; 20]),
            bidder: Address([2; 20]),
            asset: Asset::name("x.ol"),
            asset_type: AssetType::Name,
            deadline: 100,
            open: true,
            created_at: 0,
        };
        assert!(!conv.is_expired(99));
        assert!(conv.is_expired(100));
    }

    #[test]
    fn offer_record_survives_encoding() {
        let mut offer = Offer {
            conversation_id: crate::Hash::of(b"c"),
            seq: 3,
            kind: OfferKind::CounterOffer,
            status: OfferStatus::Active,
            fund_status: FundStatus::Unlocked,
            amount: Coin::new("uol", 150),
            offer_time: 42,
        };
        offer.deactivate(FundStatus::Unlocked);
        let decoded: Offer = codec::decode(&codec::encode(&offer).unwrap()).unwrap();
        assert_eq!(decoded, offer);
        assert!(!decoded.is_active());
    }
}
