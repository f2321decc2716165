//! Fraud proof verification.
//!
//! [`verify_fraud_proof`] is a pure function over the witness bundle: it
//! re-derives what the operator should have published for one transaction
//! and classifies any divergence. It performs no state access, so the
//! settlement can delegate to it from inside a challenge and off-chain
//! actors can run the identical decision procedure.

use alloy_primitives::{Address, B256};

use super::fraud_proof::{FraudKind, FraudProof, FraudResult};
use super::merkle_tree;
use super::state_commitment::{compute_state_root, verify_account_proof};
use super::transaction::{execute_transfer, ExecutionOutcome, ExecutionResult, Transaction};

/// Verify a fraud proof.
///
/// The checks run in a fixed order; the first divergence decides the
/// verdict:
///
/// 1. the transaction must be included in the committed batch, otherwise
///    the challenge itself is rejected;
/// 2. both pre-state openings must verify and name the transaction's
///    endpoints, otherwise the operator cannot justify its input state;
/// 3. the transaction is re-executed over the proven pre-state accounts;
/// 4. the correct post-state root is recomputed over the two affected
///    accounts in address order;
/// 5. a claimed root differing from the recomputed one is fraud;
/// 6. claimed post-state openings must match re-execution and verify
///    against the claimed root;
/// 7. a transaction whose re-execution did not succeed must not have been
///    in the batch at all, so its inclusion is fraud with the pre-state
///    root as the correct outcome.
pub fn verify_fraud_proof(proof: &FraudProof) -> FraudResult {
    // 1. Batch inclusion.
    let leaf = proof.transaction.merkle_leaf();
    if !merkle_tree::verify_proof(leaf, proof.transaction_root, &proof.transaction_proof) {
        return FraudResult::rejected(
            FraudKind::InvalidTransaction,
            "Transaction not in claimed batch",
        );
    }

    // 2. Pre-state consistency.
    if proof.from_account_proof.address != proof.transaction.from
        || proof.to_account_proof.address != proof.transaction.to
        || !verify_account_proof(&proof.from_account_proof, proof.pre_state_root)
        || !verify_account_proof(&proof.to_account_proof, proof.pre_state_root)
    {
        return FraudResult::fraud(
            FraudKind::InvalidPreState,
            "Pre-state openings do not match the pre-state root",
        );
    }

    // 3. Re-execute over the proven pre-state accounts.
    let outcome = match execute_transfer(
        &proof.transaction,
        &proof.from_account_proof.account,
        &proof.to_account_proof.account,
    ) {
        Ok(outcome) => outcome,
        // Host arithmetic refused the transfer; it could never have run.
        Err(_) => {
            return FraudResult::fraud_with_root(
                FraudKind::IncorrectExecution,
                proof.pre_state_root,
                "Transaction execution rejected by host arithmetic",
            )
        }
    };

    // 4. Correct post-state root over the two affected accounts.
    let correct_post_state_root = match compute_post_root(&proof.transaction, &outcome) {
        Some(root) => root,
        // The account pair is degenerate; the transaction was never
        // executable and its inclusion is fraud.
        None => {
            return FraudResult::fraud_with_root(
                FraudKind::InvalidTransaction,
                proof.pre_state_root,
                "Batch includes a transaction that must fail",
            )
        }
    };

    // 5. Compare against the operator's claim.
    if correct_post_state_root != proof.claimed_post_state_root {
        return FraudResult::fraud_with_root(
            FraudKind::InvalidStateTransition,
            correct_post_state_root,
            "Claimed post-state root does not match re-execution",
        );
    }

    // 6. Post-state consistency.
    if proof.claimed_from_account_proof.address != proof.transaction.from
        || proof.claimed_to_account_proof.address != proof.transaction.to
        || proof.claimed_from_account_proof.account != outcome.from_account
        || proof.claimed_to_account_proof.account != outcome.to_account
        || !verify_account_proof(&proof.claimed_from_account_proof, proof.claimed_post_state_root)
        || !verify_account_proof(&proof.claimed_to_account_proof, proof.claimed_post_state_root)
    {
        return FraudResult::fraud(
            FraudKind::InvalidPostState,
            "Claimed post-state openings are inconsistent with re-execution",
        );
    }

    // 7. A failing transaction must not have been included.
    if outcome.result != ExecutionResult::Success {
        return FraudResult::fraud_with_root(
            FraudKind::InvalidTransaction,
            proof.pre_state_root,
            "Batch includes a transaction that must fail",
        );
    }

    FraudResult::no_fraud()
}

/// Root over the post-execution account pair, placed in ascending address
/// order. `None` only when the endpoints are not two distinct addresses.
fn compute_post_root(tx: &Transaction, outcome: &ExecutionOutcome) -> Option<B256> {
    let (addresses, accounts): ([Address; 2], _) = if tx.from < tx.to {
        ([tx.from, tx.to], [outcome.from_account, outcome.to_account])
    } else {
        ([tx.to, tx.from], [outcome.to_account, outcome.from_account])
    };

    compute_state_root(&addresses, &accounts).ok()
}
