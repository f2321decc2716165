//! Fraud proof data model for the layer-2 system.
//!
//! A fraud proof is a self-contained witness bundle: the allegedly
//! mis-executed transaction, its inclusion proof in the committed batch,
//! and account openings against both the pre-state root and the
//! operator's claimed post-state root. The bundle travels as bytes
//! through the settlement boundary and is verified by
//! [`verify_fraud_proof`](super::verification::verify_fraud_proof).

use std::fmt;

use alloy_primitives::{keccak256, Address, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::merkle_tree::{MerkleError, MerkleProof, MerkleTree};
use super::state_commitment::{
    compute_state_root, generate_account_proof, AccountProof, StateCommitmentError,
};
use super::transaction::{Account, Transaction};

/// Errors that can occur while assembling or transporting fraud proofs.
#[derive(Error, Debug)]
pub enum FraudProofError {
    /// The requested transaction is not in the batch.
    #[error("Transaction index {index} out of bounds for batch of {len}")]
    TransactionIndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Batch length.
        len: usize,
    },

    /// A touched account is missing from the supplied state vectors.
    #[error(transparent)]
    StateCommitment(#[from] StateCommitmentError),

    /// Error from the batch commitment.
    #[error(transparent)]
    Merkle(#[from] MerkleError),

    /// The proof bytes did not encode a bundle.
    #[error("Fraud proof deserialization failed: {0}")]
    Decoding(String),

    /// The bundle could not be encoded.
    #[error("Fraud proof serialization failed: {0}")]
    Encoding(String),
}

/// Classification of a verified fraud proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FraudKind {
    /// No operator error demonstrated.
    NoFraud,

    /// The batch commits to a transaction that must not execute, or the
    /// prover supplied one that is not in the batch at all.
    InvalidTransaction,

    /// The operator cannot justify the claimed input state.
    InvalidPreState,

    /// The claimed post-state openings contradict re-execution.
    InvalidPostState,

    /// The claimed post-state root does not match re-execution.
    InvalidStateTransition,

    /// Re-execution was rejected by host arithmetic; the transaction
    /// could never have run.
    IncorrectExecution,
}

impl fmt::Display for FraudKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FraudKind::NoFraud => "NoFraud",
            FraudKind::InvalidTransaction => "InvalidTransaction",
            FraudKind::InvalidPreState => "InvalidPreState",
            FraudKind::InvalidPostState => "InvalidPostState",
            FraudKind::InvalidStateTransition => "InvalidStateTransition",
            FraudKind::IncorrectExecution => "IncorrectExecution",
        };
        write!(f, "{name}")
    }
}

/// Verdict returned by the fraud proof verifier.
///
/// `is_fraud` decides slashing. The kind refines the verdict in both
/// directions: a rejected challenge still reports why it was rejected,
/// and a proven fraud reports what the operator got wrong, together with
/// the correct post-state root where re-execution produced one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FraudResult {
    /// Whether the operator's transition was proven fraudulent.
    pub is_fraud: bool,

    /// Classification of the verdict.
    pub kind: FraudKind,

    /// Post-state root re-execution arrived at, when one is defined.
    pub correct_post_state_root: Option<B256>,

    /// Human-readable explanation.
    pub reason: Option<String>,
}

impl FraudResult {
    /// The operator's transition checks out.
    pub fn no_fraud() -> Self {
        Self {
            is_fraud: false,
            kind: FraudKind::NoFraud,
            correct_post_state_root: None,
            reason: None,
        }
    }

    /// The challenge itself is defective; no fraud demonstrated.
    pub fn rejected(kind: FraudKind, reason: &str) -> Self {
        Self {
            is_fraud: false,
            kind,
            correct_post_state_root: None,
            reason: Some(reason.to_string()),
        }
    }

    /// Fraud without a recomputed root.
    pub fn fraud(kind: FraudKind, reason: &str) -> Self {
        Self {
            is_fraud: true,
            kind,
            correct_post_state_root: None,
            reason: Some(reason.to_string()),
        }
    }

    /// Fraud together with the root the operator should have claimed.
    pub fn fraud_with_root(kind: FraudKind, correct_post_state_root: B256, reason: &str) -> Self {
        Self {
            is_fraud: true,
            kind,
            correct_post_state_root: Some(correct_post_state_root),
            reason: Some(reason.to_string()),
        }
    }
}

/// Witness bundle for a single-transaction fraud proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudProof {
    /// The allegedly mis-executed transaction.
    pub transaction: Transaction,

    /// State root before the transaction.
    pub pre_state_root: B256,

    /// Post-state root the operator submitted.
    pub claimed_post_state_root: B256,

    /// Sender account opened against `pre_state_root`.
    pub from_account_proof: AccountProof,

    /// Recipient account opened against `pre_state_root`.
    pub to_account_proof: AccountProof,

    /// Sender account opened against `claimed_post_state_root`.
    pub claimed_from_account_proof: AccountProof,

    /// Recipient account opened against `claimed_post_state_root`.
    pub claimed_to_account_proof: AccountProof,

    /// Position of the transaction in the batch.
    pub transaction_index: u64,

    /// Batch commitment the transaction is claimed to be part of.
    pub transaction_root: B256,

    /// Inclusion proof of the transaction leaf in `transaction_root`.
    pub transaction_proof: MerkleProof,
}

impl FraudProof {
    /// Encode the bundle for transport through the settlement boundary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FraudProofError> {
        bincode::serialize(self).map_err(|e| FraudProofError::Encoding(e.to_string()))
    }

    /// Decode a bundle received at the settlement boundary.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FraudProofError> {
        bincode::deserialize(bytes).map_err(|e| FraudProofError::Decoding(e.to_string()))
    }

    /// Content hash of the bundle.
    pub fn hash(&self) -> Result<B256, FraudProofError> {
        Ok(keccak256(self.to_bytes()?))
    }
}

/// Assemble a fraud proof from full state vectors and the committed
/// batch.
///
/// This is the challenger's side of the protocol: given the pre-state the
/// operator started from, the post-state it claimed, and the batch it
/// committed, produce the witness bundle for the transaction at
/// `tx_index`. All vectors must be address-sorted.
pub fn build_fraud_proof(
    batch: &[Transaction],
    tx_index: usize,
    pre_addresses: &[Address],
    pre_accounts: &[Account],
    claimed_addresses: &[Address],
    claimed_accounts: &[Account],
) -> Result<FraudProof, FraudProofError> {
    let transaction = batch
        .get(tx_index)
        .ok_or(FraudProofError::TransactionIndexOutOfBounds {
            index: tx_index,
            len: batch.len(),
        })?
        .clone();

    let leaves: Vec<B256> = batch.iter().map(Transaction::merkle_leaf).collect();
    let batch_tree = MerkleTree::new(leaves)?;

    let pre_state_root = compute_state_root(pre_addresses, pre_accounts)?;
    let claimed_post_state_root = compute_state_root(claimed_addresses, claimed_accounts)?;

    Ok(FraudProof {
        from_account_proof: generate_account_proof(
            transaction.from,
            pre_addresses,
            pre_accounts,
            pre_state_root,
        )?,
        to_account_proof: generate_account_proof(
            transaction.to,
            pre_addresses,
            pre_accounts,
            pre_state_root,
        )?,
        claimed_from_account_proof: generate_account_proof(
            transaction.from,
            claimed_addresses,
            claimed_accounts,
            claimed_post_state_root,
        )?,
        claimed_to_account_proof: generate_account_proof(
            transaction.to,
            claimed_addresses,
            claimed_accounts,
            claimed_post_state_root,
        )?,
        transaction_index: tx_index as u64,
        transaction_root: batch_tree.root(),
        transaction_proof: batch_tree.generate_proof(tx_index)?,
        transaction,
        pre_state_root,
        claimed_post_state_root,
    })
}
