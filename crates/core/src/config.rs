//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! native_denom = "uol"
//! fee_collector = "a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"
//!
//! [stores]
//! bids = "bids"
//!
//! [fees]
//! create_bid = 2
//! expire_bid = 0
//! ```

use crate::{Address, Error, TxType};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The only denomination bids and fees may use. Required.
    pub native_denom: String,

    #[serde(default)]
    pub stores: StoreNames,

    /// Receives transaction fees. Fees are burned when unset.
    #[serde(default)]
    pub fee_collector: Option<Address>,

    #[serde(default)]
    pub fees: FeeSchedule,
}

/// Names of the extension stores the engine mounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreNames {
    /// The master store: conversations and offers.
    pub bids: String,
    /// Account balances.
    pub bank: String,
    /// The name registry.
    pub names: String,
}

impl Default for StoreNames {
    fn default() -> Self {
        Self {
            bids: "bids".into(),
            bank: "bank".into(),
            names: "names".into(),
        }
    }
}

/// Minimum fee per transaction type, in the native denomination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub create_bid: u64,
    pub counter_offer: u64,
    pub bidder_decision: u64,
    pub owner_decision: u64,
    pub cancel_bid: u64,
    /// Expiry is submitted by validators on a schedule.
    pub expire_bid: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            create_bid: 1,
            counter_offer: 1,
            bidder_decision: 1,
            owner_decision: 1,
            cancel_bid: 1,
            expire_bid: 0,
        }
    }
}

impl FeeSchedule {
    pub fn minimum(&self, tx_type: TxType) -> u64 {
        match tx_type {
            TxType::CreateBid => self.create_bid,
            TxType::CounterOffer => self.counter_offer,
            TxType::BidderDecision => self.bidder_decision,
            TxType::OwnerDecision => self.owner_decision,
            TxType::CancelBid => self.cancel_bid,
            TxType::ExpireBid => self.expire_bid,
        }
    }
}

impl EngineConfig {
    /// A configuration with default stores and fees.
    pub fn new(native_denom: impl Into<String>) -> Self {
        Self {
            native_denom: native_denom.into(),
            stores: StoreNames::default(),
            fee_collector: None,
            fees: FeeSchedule::default(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot start with.
    pub fn validate(&self) -> Result<(), Error> {
        let denom = self.native_denom.trim();
        if denom.is_empty() {
            return Err(Error::Config("native_denom is not set".into()));
        }
        if denom != self.native_denom || !denom.chars().all(|c| c.is_ascii_alphanumeric() || c == '/') {
            return Err(Error::Config(format!("invalid native_denom {:?}", self.native_denom)));
        }

        let names = [&self.stores.bids, &self.stores.bank, &self.stores.names];
        if names.iter().any(|n| n.is_empty()) {
            return Err(Error::Config("store names must not be empty".into()));
        }
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(Error::Config("store names must be distinct".into()));
        }

        if self.fee_collector.is_some_and(|a| a.is_zero()) {
            return Err(Error::Config("fee_collector is the zero address".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = EngineConfig::from_toml_str(r#"native_denom = "uol""#).unwrap();
        assert_eq!(config, EngineConfig::new("uol"));
        assert_eq!(config.fees.minimum(TxType::CreateBid), 1);
        assert_eq!(config.fees.minimum(TxType::ExpireBid), 0);
        assert_eq!(config.stores.bids, "bids");
    }

    #[test]
    fn missing_denom_is_a_startup_error() {
        assert!(matches!(
            EngineConfig::from_toml_str("[fees]\ncreate_bid = 3\n"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str(r#"native_denom = """#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn overrides_apply() {
        let config = EngineConfig::from_toml_str(
            r#"
            native_denom = "uol"
            fee_collector = "a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"

            [stores]
            bids = "market"

            [fees]
            create_bid = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.fee_collector, Some(Address([0xA1; 20])));
        assert_eq!(config.stores.bids, "market");
        assert_eq!(config.stores.bank, "bank");
        assert_eq!(config.fees.minimum(TxType::CreateBid), 5);
        assert_eq!(config.fees.minimum(TxType::CancelBid), 1);
    }

    #[test]
    fn colliding_store_names_rejected() {
        let mut config = EngineConfig::new("uol");
        config.stores.bank = "bids".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("ezbid-config-{}.toml", std::process::id()));
        std::fs::write(&path, "native_denom = \"uol\"\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.native_denom, "uol");

        assert!(EngineConfig::load("/nonexistent/ezbid.toml").is_err());
    }
}
