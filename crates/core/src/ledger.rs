//! Account balances and fund custody.
//!
//! The protocol has no escrow account. Locking funds is a debit from the
//! bidder, unlocking is a credit back, and a transfer is a credit to the
//! owner of funds that were already debited.
//!
//! The same store keeps each account's sequence: the nonce its next signed
//! transaction must carry.

use crate::state::{ReadStore, Store};
use crate::{Address, Coin, Error};
use tracing::debug;

const BALANCE_PREFIX: &str = "balance";
const SEQUENCE_PREFIX: &str = "sequence";

fn read_u64(bytes: &[u8], what: &str, hex: &str) -> Result<u64, Error> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        Error::Inconsistent(format!("{} record for {} is {} bytes", what, hex, bytes.len()))
    })?;
    Ok(u64::from_be_bytes(raw))
}

/// The external ledger: debit and credit by address.
pub trait Ledger {
    /// Spendable balance of `address` in `denom`.
    fn balance(&self, address: &Address, denom: &str) -> Result<u64, Error>;

    /// Remove funds. Fails on insufficient funds or a bad address.
    fn debit(&mut self, address: &Address, coin: &Coin) -> Result<(), Error>;

    /// Add funds. Fails on overflow or a bad address.
    fn credit(&mut self, address: &Address, coin: &Coin) -> Result<(), Error>;
}

/// A ledger kept in an extension store, so its writes stage and commit with
/// the rest of a transaction.
pub struct StoreLedger<S> {
    kv: S,
}

impl<S> StoreLedger<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }
}

fn require_address(address: &Address) -> Result<(), Error> {
    if address.is_zero() {
        return Err(Error::InvalidField {
            field: "address",
            reason: "zero address".into(),
        });
    }
    Ok(())
}

impl<S: ReadStore> StoreLedger<S> {
    /// Balance lookup that needs only read access.
    pub fn read_balance(&self, address: &Address, denom: &str) -> Result<u64, Error> {
        let hex = address.to_hex();
        match self.kv.get(&[BALANCE_PREFIX, &hex, denom]) {
            None => Ok(0),
            Some(bytes) => read_u64(&bytes, "balance", &hex),
        }
    }

    /// Nonce the account's next transaction must carry. Starts at zero.
    pub fn sequence(&self, address: &Address) -> Result<u64, Error> {
        let hex = address.to_hex();
        match self.kv.get(&[SEQUENCE_PREFIX, &hex]) {
            None => Ok(0),
            Some(bytes) => read_u64(&bytes, "sequence", &hex),
        }
    }
}

impl<S: Store> StoreLedger<S> {
    fn write(&mut self, address: &Address, denom: &str, amount: u64) {
        let hex = address.to_hex();
        if amount == 0 {
            self.kv.delete(&[BALANCE_PREFIX, &hex, denom]);
        } else {
            self.kv
                .set(&[BALANCE_PREFIX, &hex, denom], amount.to_be_bytes().to_vec());
        }
    }

    /// Consume the account's current sequence and return the next one.
    pub fn advance_sequence(&mut self, address: &Address) -> Result<u64, Error> {
        let next = self
            .sequence(address)?
            .checked_add(1)
            .ok_or_else(|| Error::Overflow(format!("sequence of {}", address)))?;
        self.kv
            .set(&[SEQUENCE_PREFIX, &address.to_hex()], next.to_be_bytes().to_vec());
        Ok(next)
    }
}

impl<S: Store> Ledger for StoreLedger<S> {
    fn balance(&self, address: &Address, denom: &str) -> Result<u64, Error> {
        self.read_balance(address, denom)
    }

    fn debit(&mut self, address: &Address, coin: &Coin) -> Result<(), Error> {
        require_address(address)?;
        let balance = self.read_balance(address, &coin.denom)?;
        let remaining = balance
            .checked_sub(coin.amount)
            .ok_or_else(|| Error::InsufficientFunds {
                address: address.to_hex(),
                balance,
                needed: coin.amount,
            })?;
        self.write(address, &coin.denom, remaining);
        Ok(())
    }

    fn credit(&mut self, address: &Address, coin: &Coin) -> Result<(), Error> {
        require_address(address)?;
        let balance = self.read_balance(address, &coin.denom)?;
        let total = balance
            .checked_add(coin.amount)
            .ok_or_else(|| Error::BalanceOverflow(address.to_hex()))?;
        self.write(address, &coin.denom, total);
        Ok(())
    }
}

/// Move a bidder's funds into protocol custody.
pub fn lock<L: Ledger + ?Sized>(ledger: &mut L, bidder: &Address, amount: &Coin) -> Result<(), Error> {
    debug!(%bidder, %amount, "locking bid funds");
    ledger.debit(bidder, amount)
}

/// Return custodied funds to the bidder.
pub fn unlock<L: Ledger + ?Sized>(ledger: &mut L, bidder: &Address, amount: &Coin) -> Result<(), Error> {
    debug!(%bidder, %amount, "unlocking bid funds");
    ledger.credit(bidder, amount)
}

/// Pay custodied funds out to the owner.
pub fn release<L: Ledger + ?Sized>(ledger: &mut L, owner: &Address, amount: &Coin) -> Result<(), Error> {
    debug!(%owner, %amount, "releasing bid funds to owner");
    ledger.credit(owner, amount)
}
