//! Negotiable assets.
//!
//! Each asset kind is an arm of `Asset` and carries its own availability
//! check and exchange. Names in the name registry are the only kind today.

use crate::codec;
use crate::state::{ReadStore, Store};
use crate::{Address, Error};
use serde::{Deserialize, Serialize};

const NAME_PREFIX: &str = "name";
const MAX_NAME_LEN: usize = 64;

/// Discriminant of an asset kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetType {
    Name,
}

/// A name registered in the name registry, e.g. `x.ol`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameAsset {
    pub name: String,
}

/// An asset under negotiation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Asset {
    Name(NameAsset),
}

impl Asset {
    pub fn name(name: impl Into<String>) -> Self {
        Asset::Name(NameAsset { name: name.into() })
    }

    pub fn asset_type(&self) -> AssetType {
        match self {
            Asset::Name(_) => AssetType::Name,
        }
    }

    /// Human-readable label for events and logs.
    pub fn label(&self) -> &str {
        match self {
            Asset::Name(n) => &n.name,
        }
    }

    /// Static shape check, no state access.
    pub fn validate_shape(&self) -> Result<(), Error> {
        match self {
            Asset::Name(n) => {
                let well_formed = !n.name.is_empty()
                    && n.name.len() <= MAX_NAME_LEN
                    && n.name.contains('.')
                    && !n.name.starts_with('.')
                    && !n.name.ends_with('.')
                    && n.name
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
                if !well_formed {
                    return Err(Error::InvalidField {
                        field: "asset",
                        reason: format!("malformed name {:?}", n.name),
                    });
                }
                Ok(())
            }
        }
    }

    /// Check that `owner` may negotiate this asset right now.
    pub fn validate<S: ReadStore>(&self, ctx: &AssetContext<S>, owner: &Address) -> Result<(), Error> {
        match self {
            Asset::Name(n) => {
                let entry = ctx
                    .names
                    .get(&n.name)?
                    .ok_or_else(|| Error::AssetNotFound(n.name.clone()))?;
                if entry.for_sale {
                    return Err(Error::AssetUnavailable(format!("{} is listed for sale", n.name)));
                }
                if entry.owner != *owner {
                    return Err(Error::Unauthorized(format!("{} is not owned by {}", n.name, owner)));
                }
                if entry.expires_at <= ctx.now {
                    return Err(Error::AssetUnavailable(format!("{} has expired", n.name)));
                }
                Ok(())
            }
        }
    }

    /// Hand the asset from `from` to `to` once a negotiation succeeds.
    pub fn exchange<S: Store>(&self, ctx: &mut AssetContext<S>, from: &Address, to: &Address) -> Result<(), Error> {
        match self {
            Asset::Name(n) => {
                let mut entry = ctx
                    .names
                    .get(&n.name)?
                    .ok_or_else(|| Error::AssetNotFound(n.name.clone()))?;
                if entry.owner != *from {
                    return Err(Error::Unauthorized(format!("{} is not owned by {}", n.name, from)));
                }
                entry.owner = *to;
                ctx.names.set(&n.name, &entry)
            }
        }
    }
}

/// A name registry record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    pub owner: Address,
    pub for_sale: bool,
    /// Registration expiry in UTC seconds.
    pub expires_at: u64,
}

/// The name registry, read from its own extension store.
pub struct NameRegistry<S> {
    kv: S,
}

impl<S: ReadStore> NameRegistry<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn get(&self, name: &str) -> Result<Option<NameEntry>, Error> {
        self.kv
            .get(&[NAME_PREFIX, name])
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }
}

impl<S: Store> NameRegistry<S> {
    pub fn set(&mut self, name: &str, entry: &NameEntry) -> Result<(), Error> {
        self.kv.set(&[NAME_PREFIX, name], codec::encode(entry)?);
        Ok(())
    }
}

/// What an asset validator may look at: its registry and the block time.
pub struct AssetContext<S> {
    pub names: NameRegistry<S>,
    pub now: u64,
}

impl<S> AssetContext<S> {
    pub fn new(names: S, now: u64) -> Self {
        Self {
            names: NameRegistry { kv: names },
            now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;

    const OWNER: Address = Address([1; 20]);
    const OTHER: Address = Address([2; 20]);

    fn registry_with(entry: NameEntry) -> State {
        let mut state = State::new();
        NameRegistry::new(&mut state).set("x.ol", &entry).unwrap();
        state
    }

    fn entry() -> NameEntry {
        NameEntry {
            owner: OWNER,
            for_sale: false,
            expires_at: 1_000,
        }
    }

    #[test]
    fn shape_rules() {
        assert!(Asset::name("x.ol").validate_shape().is_ok());
        assert!(Asset::name("").validate_shape().is_err());
        assert!(Asset::name("noext").validate_shape().is_err());
        assert!(Asset::name("Upper.ol").validate_shape().is_err());
        assert!(Asset::name(".ol").validate_shape().is_err());
    }

    #[test]
    fn valid_name_passes() {
        let mut state = registry_with(entry());
        let ctx = AssetContext::new(&mut state, 10);
        assert!(Asset::name("x.ol").validate(&ctx, &OWNER).is_ok());
    }

    #[test]
    fn missing_name_is_not_found() {
        let mut state = State::new();
        let ctx = AssetContext::new(&mut state, 10);
        assert!(matches!(
            Asset::name("x.ol").validate(&ctx, &OWNER),
            Err(Error::AssetNotFound(_))
        ));
    }

    #[test]
    fn wrong_owner_listed_or_expired_rejected() {
        let mut state = registry_with(entry());
        let ctx = AssetContext::new(&mut state, 10);
        assert!(matches!(
            Asset::name("x.ol").validate(&ctx, &OTHER),
            Err(Error::Unauthorized(_))
        ));

        let mut listed = registry_with(NameEntry { for_sale: true, ..entry() });
        let ctx = AssetContext::new(&mut listed, 10);
        assert!(matches!(
            Asset::name("x.ol").validate(&ctx, &OWNER),
            Err(Error::AssetUnavailable(_))
        ));

        let mut state = registry_with(entry());
        let ctx = AssetContext::new(&mut state, 1_000);
        assert!(matches!(
            Asset::name("x.ol").validate(&ctx, &OWNER),
            Err(Error::AssetUnavailable(_))
        ));
    }

    #[test]
    fn exchange_moves_ownership() {
        let mut state = registry_with(entry());
        let mut ctx = AssetContext::new(&mut state, 10);
        let asset = Asset::name("x.ol");

        asset.exchange(&mut ctx, &OWNER, &OTHER).unwrap();
        assert!(asset.validate(&ctx, &OTHER).is_ok());
        assert!(asset.exchange(&mut ctx, &OWNER, &OTHER).is_err());
    }
}
