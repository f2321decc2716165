//! Rollup settlement module.
//!
//! The on-chain side of the optimistic rollup: bonded block submission,
//! the challenge/finalization state machine, deposit and withdrawal
//! bridging, and the host-ledger collaborator the settlement moves
//! native value through.

pub mod ledger;
pub mod settlement;

pub use ledger::{InMemoryLedger, LedgerBridge, LedgerError};
pub use settlement::{
    CallContext, RollupBlock, Settlement, SettlementError, SettlementEvent, WithdrawalRequest,
};
