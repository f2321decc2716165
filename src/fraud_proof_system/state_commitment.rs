//! Account-state commitment for the layer-2 system.
//!
//! The committed state is the sorted-by-address account set: each account
//! hashes into a leaf and the state root is the Merkle root over the leaf
//! vector. Inclusion proofs open a single account against a root.

use alloy_primitives::{keccak256, Address, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::merkle_tree::{self, MerkleError, MerkleProof, MerkleTree};
use super::transaction::Account;

/// Preimage of the genesis state root. The genesis root is a sentinel:
/// it is never derived from an (forbidden) empty leaf set.
const GENESIS_PREIMAGE: &[u8] = b"GENESIS";

/// Errors that can occur while committing to or opening account state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateCommitmentError {
    /// Address and account vectors must pair up.
    #[error("Address and account vectors differ in length: {addresses} vs {accounts}")]
    LengthMismatch {
        /// Number of addresses supplied.
        addresses: usize,
        /// Number of accounts supplied.
        accounts: usize,
    },

    /// The empty state has no root; genesis uses the sentinel instead.
    #[error("Cannot commit to an empty account set")]
    EmptyState,

    /// Addresses must be strictly ascending.
    #[error("Addresses are not in ascending order")]
    UnsortedAddresses,

    /// Each address may appear at most once.
    #[error("Duplicate address in account set: {0}")]
    DuplicateAddress(Address),

    /// The requested account is not part of the set.
    #[error("Account {0} not found in state")]
    AccountNotFound(Address),

    /// The recomputed root does not match the caller's expectation.
    #[error("State root mismatch: computed {computed}, expected {expected}")]
    RootMismatch {
        /// Root recomputed from the supplied vectors.
        computed: B256,
        /// Root the caller claimed.
        expected: B256,
    },

    /// Error from the underlying Merkle commitment.
    #[error(transparent)]
    Merkle(#[from] MerkleError),
}

/// Inclusion proof of one account in a state root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProof {
    /// Address the proof opens.
    pub address: Address,

    /// Account data at that address.
    pub account: Account,

    /// Merkle path from the account leaf to the state root.
    pub proof: MerkleProof,
}

/// Hash one account into its state leaf:
/// `keccak256(address || balance || nonce)`, fixed-width big-endian.
pub fn account_leaf(address: &Address, account: &Account) -> B256 {
    let mut input = [0u8; 20 + 32 + 32];
    input[..20].copy_from_slice(address.as_slice());
    input[20..52].copy_from_slice(&account.balance.to_be_bytes::<32>());
    input[52..84].copy_from_slice(&account.nonce.to_be_bytes::<32>());
    keccak256(input)
}

/// The sentinel root the settlement starts from.
pub fn genesis_root() -> B256 {
    keccak256(GENESIS_PREIMAGE)
}

/// Compute the state root over the account set.
///
/// Addresses must be strictly ascending (so duplicates are rejected) and
/// the set must be non-empty.
pub fn compute_state_root(
    addresses: &[Address],
    accounts: &[Account],
) -> Result<B256, StateCommitmentError> {
    let leaves = state_leaves(addresses, accounts)?;
    Ok(merkle_tree::compute_root(&leaves)?)
}

/// Generate an inclusion proof for `target` within the account set.
///
/// Recomputes the root and requires it to match `expected_root`, so a
/// proof can only be produced from vectors consistent with the
/// commitment being opened.
pub fn generate_account_proof(
    target: Address,
    addresses: &[Address],
    accounts: &[Account],
    expected_root: B256,
) -> Result<AccountProof, StateCommitmentError> {
    let index = addresses
        .iter()
        .position(|address| *address == target)
        .ok_or(StateCommitmentError::AccountNotFound(target))?;

    let leaves = state_leaves(addresses, accounts)?;
    let tree = MerkleTree::new(leaves)?;
    if tree.root() != expected_root {
        return Err(StateCommitmentError::RootMismatch {
            computed: tree.root(),
            expected: expected_root,
        });
    }

    Ok(AccountProof {
        address: target,
        account: accounts[index],
        proof: tree.generate_proof(index)?,
    })
}

/// Verify an account inclusion proof against a state root.
pub fn verify_account_proof(proof: &AccountProof, root: B256) -> bool {
    let leaf = account_leaf(&proof.address, &proof.account);
    merkle_tree::verify_proof(leaf, root, &proof.proof)
}

/// Hash the account set into its leaf vector, enforcing the sorted-unique
/// invariant.
fn state_leaves(
    addresses: &[Address],
    accounts: &[Account],
) -> Result<Vec<B256>, StateCommitmentError> {
    if addresses.len() != accounts.len() {
        return Err(StateCommitmentError::LengthMismatch {
            addresses: addresses.len(),
            accounts: accounts.len(),
        });
    }
    if addresses.is_empty() {
        return Err(StateCommitmentError::EmptyState);
    }
    for pair in addresses.windows(2) {
        if pair[0] == pair[1] {
            return Err(StateCommitmentError::DuplicateAddress(pair[0]));
        }
        if pair[0] > pair[1] {
            return Err(StateCommitmentError::UnsortedAddresses);
        }
    }

    Ok(addresses
        .iter()
        .zip(accounts)
        .map(|(address, account)| account_leaf(address, account))
        .collect())
}
