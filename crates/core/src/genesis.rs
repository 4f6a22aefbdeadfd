//! Genesis state creation.
//!
//! The genesis document seeds what the negotiation protocol itself cannot
//! create: validator identities, opening balances and registered names.
//!
//! ```json
//! {
//!   "validators": ["c3c3…"],
//!   "accounts": [{ "address": "b2b2…", "coins": [{ "denom": "uol", "amount": 1000 }] }],
//!   "names": [{ "name": "x.ol", "owner": "a1a1…", "expires_at": 4102444800 }]
//! }
//! ```

use crate::asset::{NameEntry, NameRegistry};
use crate::config::EngineConfig;
use crate::context::StoreRegistry;
use crate::ledger::{Ledger, StoreLedger};
use crate::{Address, Asset, Coin, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// Parameters for creating a genesis state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisParams {
    /// Addresses allowed to submit expiry requests.
    #[serde(default)]
    pub validators: Vec<Address>,
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
    #[serde(default)]
    pub names: Vec<GenesisName>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    pub coins: Vec<Coin>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisName {
    pub name: String,
    pub owner: Address,
    #[serde(default)]
    pub for_sale: bool,
    pub expires_at: u64,
}

impl GenesisParams {
    pub fn from_json(content: &str) -> Result<Self, Error> {
        serde_json::from_str(content).map_err(|e| Error::Config(format!("genesis: {}", e)))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }
}

/// The initial stores plus the validator set.
#[derive(Clone, Debug)]
pub struct Genesis {
    pub stores: StoreRegistry,
    pub validators: BTreeSet<Address>,
}

/// Create the genesis state from parameters.
pub fn create_genesis(params: &GenesisParams, config: &EngineConfig) -> Result<Genesis, Error> {
    let mut stores = StoreRegistry::new();

    // 1. Mount the extension stores
    stores.mount(&config.stores.bids);
    stores.mount(&config.stores.bank);
    stores.mount(&config.stores.names);

    // 2. Opening balances
    {
        let mut ledger = StoreLedger::new(stores.get_mut(&config.stores.bank)?);
        for account in &params.accounts {
            for coin in &account.coins {
                ledger.credit(&account.address, coin)?;
            }
        }
    }

    // 3. Registered names
    {
        let mut registry = NameRegistry::new(stores.get_mut(&config.stores.names)?);
        for entry in &params.names {
            Asset::name(entry.name.as_str()).validate_shape()?;
            if entry.owner.is_zero() {
                return Err(Error::Config(format!("genesis name {} has no owner", entry.name)));
            }
            if registry.get(&entry.name)?.is_some() {
                return Err(Error::Config(format!("genesis name {} listed twice", entry.name)));
            }
            registry.set(
                &entry.name,
                &NameEntry {
                    owner: entry.owner,
                    for_sale: entry.for_sale,
                    expires_at: entry.expires_at,
                },
            )?;
        }
    }

    // 4. Validators
    let validators: BTreeSet<Address> = params.validators.iter().copied().collect();
    if validators.iter().any(Address::is_zero) {
        return Err(Error::Config("genesis validator is the zero address".into()));
    }

    info!(
        accounts = params.accounts.len(),
        names = params.names.len(),
        validators = validators.len(),
        "genesis created"
    );
    Ok(Genesis { stores, validators })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;

    const OWNER: Address = Address([0xA1; 20]);
    const BIDDER: Address = Address([0xB2; 20]);
    const VALIDATOR: Address = Address([0xC3; 20]);

    fn params() -> GenesisParams {
        GenesisParams {
            validators: vec![VALIDATOR],
            accounts: vec![GenesisAccount {
                address: BIDDER,
                coins: vec![Coin::new("uol", 1_000)],
            }],
            names: vec![GenesisName {
                name: "x.ol".into(),
                owner: OWNER,
                for_sale: false,
                expires_at: 10_000,
            }],
        }
    }

    #[test]
    fn genesis_seeds_every_store() {
        let config = EngineConfig::new("uol");
        let genesis = create_genesis(&params(), &config).unwrap();

        let bank: &State = genesis.stores.get("bank").unwrap();
        assert_eq!(StoreLedger::new(bank).read_balance(&BIDDER, "uol").unwrap(), 1_000);

        let names = NameRegistry::new(genesis.stores.get("names").unwrap());
        assert_eq!(names.get("x.ol").unwrap().unwrap().owner, OWNER);

        assert!(genesis.stores.get("bids").unwrap().is_empty());
        assert!(genesis.validators.contains(&VALIDATOR));
    }

    #[test]
    fn genesis_from_json() {
        let json = format!(
            r#"{{
                "validators": ["{v}"],
                "accounts": [{{ "address": "{b}", "coins": [{{ "denom": "uol", "amount": 1000 }}] }}],
                "names": [{{ "name": "x.ol", "owner": "{o}", "expires_at": 10000 }}]
            }}"#,
            v = VALIDATOR,
            b = BIDDER,
            o = OWNER
        );
        assert_eq!(GenesisParams::from_json(&json).unwrap(), params());
        assert_eq!(GenesisParams::from_json("{}").unwrap(), GenesisParams::default());
        assert!(matches!(GenesisParams::from_json("[1]"), Err(Error::Config(_))));
    }

    #[test]
    fn genesis_load_from_file() {
        let path = std::env::temp_dir().join(format!("ezbid-genesis-{}.json", std::process::id()));
        std::fs::write(&path, serde_json::to_string_pretty(&params()).unwrap()).unwrap();
        let loaded = GenesisParams::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.unwrap(), params());

        assert!(matches!(
            GenesisParams::load("/nonexistent/genesis.json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn genesis_is_deterministic() {
        let config = EngineConfig::new("uol");
        let a = create_genesis(&params(), &config).unwrap();
        let b = create_genesis(&params(), &config).unwrap();
        assert_eq!(a.stores.hash().unwrap(), b.stores.hash().unwrap());
    }

    #[test]
    fn rejects_duplicate_or_malformed_names() {
        let config = EngineConfig::new("uol");
        let mut twice = params();
        twice.names.push(twice.names[0].clone());
        assert!(create_genesis(&twice, &config).is_err());

        let mut bad = params();
        bad.names[0].name = "NoDot".into();
        assert!(create_genesis(&bad, &config).is_err());
    }
}
