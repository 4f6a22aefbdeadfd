//! Signed transactions and the closed set of negotiation requests.
//!
//! ```text
//! SignedTx {
//!   tx_type   : TxType     // dispatch tag
//!   payload   : Bytes      // CBOR of the request for tx_type
//!   signer    : PublicKey  // declared signer
//!   fee       : Coin
//!   nonce     : u64        // signer's account sequence, consumed on delivery
//!   signature : Signature  // over everything above
//! }
//! ```

use crate::codec;
use crate::handlers::{BidderDecision, CancelBid, CounterOffer, CreateBid, ExpireBid, OwnerDecision};
use crate::{Address, Coin, Error, Hash};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Transaction type tag used by the dispatch router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TxType {
    CreateBid,
    CounterOffer,
    BidderDecision,
    OwnerDecision,
    CancelBid,
    ExpireBid,
}

impl TxType {
    pub const ALL: [TxType; 6] = [
        TxType::CreateBid,
        TxType::CounterOffer,
        TxType::BidderDecision,
        TxType::OwnerDecision,
        TxType::CancelBid,
        TxType::ExpireBid,
    ];

    /// Registered tag, also the event kind.
    pub fn tag(&self) -> &'static str {
        match self {
            TxType::CreateBid => "bid/create",
            TxType::CounterOffer => "bid/counter_offer",
            TxType::BidderDecision => "bid/bidder_decision",
            TxType::OwnerDecision => "bid/owner_decision",
            TxType::CancelBid => "bid/cancel",
            TxType::ExpireBid => "bid/expire",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }
}

/// A decoded negotiation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    CreateBid(CreateBid),
    CounterOffer(CounterOffer),
    BidderDecision(BidderDecision),
    OwnerDecision(OwnerDecision),
    CancelBid(CancelBid),
    ExpireBid(ExpireBid),
}

impl Transaction {
    pub fn tx_type(&self) -> TxType {
        match self {
            Transaction::CreateBid(_) => TxType::CreateBid,
            Transaction::CounterOffer(_) => TxType::CounterOffer,
            Transaction::BidderDecision(_) => TxType::BidderDecision,
            Transaction::OwnerDecision(_) => TxType::OwnerDecision,
            Transaction::CancelBid(_) => TxType::CancelBid,
            Transaction::ExpireBid(_) => TxType::ExpireBid,
        }
    }

    /// Encode the request body without its tag.
    pub fn encode_payload(&self) -> Result<Vec<u8>, Error> {
        match self {
            Transaction::CreateBid(p) => codec::encode(p),
            Transaction::CounterOffer(p) => codec::encode(p),
            Transaction::BidderDecision(p) => codec::encode(p),
            Transaction::OwnerDecision(p) => codec::encode(p),
            Transaction::CancelBid(p) => codec::encode(p),
            Transaction::ExpireBid(p) => codec::encode(p),
        }
    }

    /// Decode a request body according to its tag.
    pub fn decode_payload(tx_type: TxType, payload: &[u8]) -> Result<Self, Error> {
        let invalid = |e: Error| Error::InvalidPayload(format!("{}: {}", tx_type.tag(), e));
        Ok(match tx_type {
            TxType::CreateBid => Transaction::CreateBid(codec::decode(payload).map_err(invalid)?),
            TxType::CounterOffer => Transaction::CounterOffer(codec::decode(payload).map_err(invalid)?),
            TxType::BidderDecision => {
                Transaction::BidderDecision(codec::decode(payload).map_err(invalid)?)
            }
            TxType::OwnerDecision => Transaction::OwnerDecision(codec::decode(payload).map_err(invalid)?),
            TxType::CancelBid => Transaction::CancelBid(codec::decode(payload).map_err(invalid)?),
            TxType::ExpireBid => Transaction::ExpireBid(codec::decode(payload).map_err(invalid)?),
        })
    }
}

/// A transaction as it travels between nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    pub tx_type: TxType,
    pub payload: Vec<u8>,
    pub signer: [u8; 32],
    pub fee: Coin,
    pub nonce: u64,
    /// Ed25519 signature over the signable content.
    pub signature: Vec<u8>,
}

/// Helper struct for signing (excludes the signature).
#[derive(Serialize)]
struct SignableTx<'a> {
    tx_type: TxType,
    payload: &'a [u8],
    signer: &'a [u8; 32],
    fee: &'a Coin,
    nonce: u64,
}

impl SignedTx {
    /// Encode and sign a request.
    pub fn new(tx: &Transaction, fee: Coin, nonce: u64, signing_key: &SigningKey) -> Result<Self, Error> {
        let mut signed = Self {
            tx_type: tx.tx_type(),
            payload: tx.encode_payload()?,
            signer: signing_key.verifying_key().to_bytes(),
            fee,
            nonce,
            signature: Vec::new(),
        };

        let content = signed.signable_content()?;
        signed.signature = signing_key.sign(&content).to_bytes().to_vec();
        Ok(signed)
    }

    fn signable_content(&self) -> Result<Vec<u8>, Error> {
        codec::encode(&SignableTx {
            tx_type: self.tx_type,
            payload: &self.payload,
            signer: &self.signer,
            fee: &self.fee,
            nonce: self.nonce,
        })
    }

    /// Content hash of the whole transaction, signature included.
    pub fn hash(&self) -> Result<Hash, Error> {
        Hash::of_value(self)
    }

    /// Verify the signature against the declared signer and return its address.
    pub fn verify_signature(&self) -> Result<Address, Error> {
        let signer_hex = hex::encode(self.signer);
        let key = VerifyingKey::from_bytes(&self.signer)
            .map_err(|_| Error::InvalidSignature(signer_hex.clone()))?;
        let sig_bytes: [u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidSignature(signer_hex.clone()))?;
        let signature = Signature::from_bytes(&sig_bytes);

        key.verify(&self.signable_content()?, &signature)
            .map_err(|_| Error::InvalidSignature(signer_hex))?;
        Ok(Address::from_public_key(&key))
    }

    /// Decode the payload for this transaction's type.
    pub fn decode(&self) -> Result<Transaction, Error> {
        Transaction::decode_payload(self.tx_type, &self.payload)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        codec::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        codec::decode(bytes).map_err(|e| Error::InvalidPayload(e.to_string()))
    }
}
