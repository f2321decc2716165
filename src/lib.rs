//! Layer-2 settlement core.
//!
//! The on-chain state-transition arbiter of an optimistic rollup:
//! operators post bonded blocks that advance the rollup state root
//! optimistically, anyone can disprove a block with a single-transaction
//! fraud proof during the challenge window, and blocks that survive the
//! window finalize and release their bond. Deposits and withdrawals move
//! native value between the host ledger and a mirrored balance table.
//!
//! The crate splits into the pure fraud proof system (transaction engine,
//! Merkle and account-state commitments, the fraud proof verifier) and
//! the stateful settlement aggregate that consumes it.

pub mod config;
pub mod fraud_proof_system;
pub mod rollup;

pub use config::SettlementConfig;

pub use fraud_proof_system::{
    build_fraud_proof, execute_transfer, verify_fraud_proof, Account, AccountProof,
    ExecutionOutcome, ExecutionResult, FraudKind, FraudProof, FraudResult, MerkleProof,
    MerkleTree, Transaction,
};

pub use rollup::{
    CallContext, InMemoryLedger, LedgerBridge, RollupBlock, Settlement, SettlementError,
    SettlementEvent, WithdrawalRequest,
};
