//! Native-value bridge to the host ledger.
//!
//! The settlement never moves value itself. Outbound transfers (bond
//! returns, challenger rewards, withdrawal payouts) go through the
//! [`LedgerBridge`] collaborator; a failed transfer aborts the whole
//! settlement operation. [`InMemoryLedger`] is the in-process
//! implementation used by tests and embedders without a real host.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Errors raised by the host ledger on a value move.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The paying side does not hold the requested amount.
    #[error("Insufficient ledger balance: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Balance available to the payer.
        available: U256,
        /// Amount requested.
        requested: U256,
    },

    /// A balance would leave the 256-bit range.
    #[error("Ledger balance overflow")]
    BalanceOverflow,
}

/// Outbound native-value moves from the settlement's escrow.
///
/// Implementations must be atomic: on `Err` no balance has changed.
pub trait LedgerBridge {
    /// Transfer `amount` from the settlement's escrow to `to`.
    fn transfer(&mut self, to: Address, amount: U256) -> Result<(), LedgerError>;
}

/// In-memory host ledger: external account balances plus the
/// settlement's own escrow balance.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    balances: HashMap<Address, U256>,
    escrow: U256,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an external account with native value.
    pub fn mint(&mut self, address: Address, amount: U256) {
        let balance = self.balances.entry(address).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Native balance of an external account.
    pub fn balance_of(&self, address: Address) -> U256 {
        self.balances.get(&address).copied().unwrap_or_default()
    }

    /// Native balance held by the settlement.
    pub fn escrow_balance(&self) -> U256 {
        self.escrow
    }

    /// Move attached call value from `from` into the settlement's escrow.
    /// This is the host's half of a payable call and runs before the
    /// settlement method observes the value.
    pub fn pay_in(&mut self, from: Address, amount: U256) -> Result<(), LedgerError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                available,
                requested: amount,
            });
        }
        let new_escrow = self
            .escrow
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;

        self.balances.insert(from, available - amount);
        self.escrow = new_escrow;
        Ok(())
    }
}

impl LedgerBridge for InMemoryLedger {
    fn transfer(&mut self, to: Address, amount: U256) -> Result<(), LedgerError> {
        if self.escrow < amount {
            return Err(LedgerError::InsufficientFunds {
                available: self.escrow,
                requested: amount,
            });
        }
        let new_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;

        self.escrow -= amount;
        self.balances.insert(to, new_balance);
        Ok(())
    }
}
