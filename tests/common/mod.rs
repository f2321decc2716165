//! Shared harness for the settlement integration tests.
//!
//! Wraps a [`Settlement`] together with an [`InMemoryLedger`] and models
//! the host's side of a payable call: attached value moves into escrow
//! before the operation runs and moves back when the operation reverts.

#![allow(dead_code)]

use alloy_primitives::{keccak256, Address, B256, U256};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;

use layer2_settlement::fraud_proof_system::merkle_tree;
use layer2_settlement::{
    Account, CallContext, InMemoryLedger, LedgerBridge, Settlement, SettlementError, Transaction,
};

/// `n * 10^17` wei, so whole units are `tenths(10)` and a tenth of a
/// unit is `tenths(1)`.
pub fn tenths(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(17))
}

/// `n` whole native units.
pub fn units(n: u64) -> U256 {
    tenths(n * 10)
}

/// Deterministic signing key for test identities.
pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).expect("seed is a valid scalar")
}

/// Ethereum address of a signing key.
pub fn key_address(key: &SigningKey) -> Address {
    let encoded = key.verifying_key().to_encoded_point(false);
    let digest = keccak256(&encoded.as_bytes()[1..]);
    Address::from_slice(&digest.as_slice()[12..])
}

/// Build and sign a transfer from `key`'s address.
pub fn signed_transfer(
    key: &SigningKey,
    to: Address,
    amount: U256,
    nonce: U256,
    fee: U256,
) -> Transaction {
    let mut tx = Transaction {
        from: key_address(key),
        to,
        amount,
        nonce,
        fee,
        signature: Vec::new(),
    };
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(tx.signing_hash().as_slice())
        .expect("signing cannot fail on a fixed digest");
    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte() + 27);
    tx.signature = bytes;
    tx
}

/// Batch commitment over transaction leaves, as `submit_rollup_block`
/// recomputes it.
pub fn tx_root_of(txs: &[Transaction]) -> B256 {
    let leaves: Vec<B256> = txs.iter().map(Transaction::merkle_leaf).collect();
    merkle_tree::compute_root(&leaves).expect("test batches are non-empty")
}

/// Sort `(address, account)` pairs into the ascending-address vectors the
/// state commitment requires.
pub fn sorted_state(mut pairs: Vec<(Address, Account)>) -> (Vec<Address>, Vec<Account>) {
    pairs.sort_by_key(|(address, _)| *address);
    pairs.into_iter().unzip()
}

/// Settlement plus host ledger plus host clock.
pub struct Harness {
    pub settlement: Settlement,
    pub ledger: InMemoryLedger,
    pub host_block: u64,
    pub timestamp: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            settlement: Settlement::with_default_config(),
            ledger: InMemoryLedger::new(),
            host_block: 1,
            timestamp: 1_000,
        }
    }

    /// Seed a native balance.
    pub fn fund(&mut self, who: Address, amount: U256) {
        self.ledger.mint(who, amount);
    }

    /// Advance the host chain.
    pub fn advance_blocks(&mut self, blocks: u64) {
        self.host_block += blocks;
        self.timestamp += blocks * 12;
    }

    pub fn ctx(&self, caller: Address) -> CallContext {
        CallContext::new(caller, self.host_block, self.timestamp)
    }

    /// Payable `deposit`.
    pub fn deposit(&mut self, user: Address, amount: U256) -> Result<(), SettlementError> {
        self.ledger.pay_in(user, amount).expect("caller is funded");
        let result = self
            .settlement
            .deposit(&self.ctx(user).with_value(amount));
        if result.is_err() {
            // A revert returns the attached value.
            self.ledger.transfer(user, amount).expect("refund");
        }
        result
    }

    /// Payable `submit_rollup_block` with the batch commitment computed
    /// the way an honest operator would.
    pub fn submit_block(
        &mut self,
        operator: Address,
        bond: U256,
        state_root: B256,
        txs: &[Transaction],
    ) -> Result<u64, SettlementError> {
        self.submit_block_with_root(operator, bond, state_root, tx_root_of(txs), txs)
    }

    /// Payable `submit_rollup_block` with an explicit transaction root.
    pub fn submit_block_with_root(
        &mut self,
        operator: Address,
        bond: U256,
        state_root: B256,
        tx_root: B256,
        txs: &[Transaction],
    ) -> Result<u64, SettlementError> {
        self.ledger.pay_in(operator, bond).expect("operator is funded");
        let result = self.settlement.submit_rollup_block(
            &self.ctx(operator).with_value(bond),
            state_root,
            tx_root,
            txs,
        );
        if result.is_err() {
            self.ledger.transfer(operator, bond).expect("refund");
        }
        result
    }

    pub fn challenge(
        &mut self,
        challenger: Address,
        block_number: u64,
        proof_bytes: &[u8],
    ) -> Result<(), SettlementError> {
        let ctx = self.ctx(challenger);
        self.settlement
            .challenge_block(&mut self.ledger, &ctx, block_number, proof_bytes)
    }

    pub fn finalize(&mut self, caller: Address, block_number: u64) -> Result<(), SettlementError> {
        let ctx = self.ctx(caller);
        self.settlement
            .finalize_block(&mut self.ledger, &ctx, block_number)
    }

    pub fn request_withdrawal(
        &mut self,
        user: Address,
        amount: U256,
    ) -> Result<B256, SettlementError> {
        let ctx = self.ctx(user);
        self.settlement.request_withdrawal(&ctx, amount)
    }

    pub fn process_withdrawal(&mut self, user: Address, id: B256) -> Result<(), SettlementError> {
        let ctx = self.ctx(user);
        self.settlement
            .process_withdrawal(&mut self.ledger, &ctx, id)
    }

    /// Conservation invariant: the settlement's native balance covers the
    /// locked value, the outstanding bonds of `operators`, and the
    /// treasury exactly.
    pub fn assert_conservation(&self, operators: &[Address]) {
        let bonds = operators
            .iter()
            .fold(U256::ZERO, |sum, op| sum + self.settlement.operator_bond(*op));
        assert_eq!(
            self.ledger.escrow_balance(),
            self.settlement.total_value_locked() + bonds + self.settlement.treasury(),
            "conservation violated"
        );
    }
}
