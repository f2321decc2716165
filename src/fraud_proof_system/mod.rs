//! Fraud proof system for the layer-2 settlement core.
//!
//! This module gathers the pure components the settlement delegates to:
//! - Merkle commitment over ordered leaves
//! - transaction encoding, signing and execution
//! - account-state commitment with inclusion proofs
//! - fraud proof bundles and their verification

pub mod fraud_proof;
pub mod merkle_tree;
pub mod state_commitment;
pub mod transaction;
pub mod verification;

pub use fraud_proof::{build_fraud_proof, FraudKind, FraudProof, FraudProofError, FraudResult};
pub use merkle_tree::{
    compute_root, hash_pair, tree_depth, verify_proof, MerkleError, MerkleProof, MerkleTree,
};
pub use state_commitment::{
    account_leaf, compute_state_root, generate_account_proof, genesis_root, verify_account_proof,
    AccountProof, StateCommitmentError,
};
pub use transaction::{
    execute_transfer, Account, ExecutionOutcome, ExecutionResult, Transaction, TransactionError,
};
pub use verification::verify_fraud_proof;
