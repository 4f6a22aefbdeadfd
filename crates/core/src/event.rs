//! Indexable events and transaction responses.

use crate::{Address, ConversationId, Error, TxType};
use serde::{Deserialize, Serialize};

/// One indexable key/value tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl ToString) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// An event emitted by a handler, consumed by the indexer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<Attribute>,
}

impl Event {
    /// Build the fixed tag sequence every handler emits:
    /// conversation id, transaction type, principal, extras, outcome.
    pub fn tagged(
        tx_type: TxType,
        conversation_id: Option<ConversationId>,
        principal: (&'static str, Address),
        extras: Vec<Attribute>,
        outcome: Result<(), &Error>,
    ) -> Self {
        let mut attributes = Vec::with_capacity(extras.len() + 5);
        attributes.push(Attribute::new(
            "conversation_id",
            conversation_id.map(|id| id.to_hex()).unwrap_or_default(),
        ));
        attributes.push(Attribute::new("tx_type", tx_type.tag()));
        attributes.push(Attribute::new(principal.0, principal.1));
        attributes.extend(extras);
        match outcome {
            Ok(()) => attributes.push(Attribute::new("result", "success")),
            Err(e) => {
                attributes.push(Attribute::new("result", "failure"));
                attributes.push(Attribute::new("code", e.code()));
            }
        }
        Self {
            kind: tx_type.tag().to_string(),
            attributes,
        }
    }

    /// Value of the first attribute named `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// Structured result of checking or delivering a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResponse {
    /// Zero on success, otherwise `Error::code`.
    pub code: u32,
    pub log: String,
    pub events: Vec<Event>,
}

impl TxResponse {
    pub fn ok(events: Vec<Event>) -> Self {
        Self {
            code: 0,
            log: String::new(),
            events,
        }
    }

    pub fn failed(error: &Error, events: Vec<Event>) -> Self {
        Self {
            code: error.code(),
            log: error.to_string(),
            events,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Look up an attribute across all events.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.events.iter().find_map(|e| e.attribute(key))
    }
}
