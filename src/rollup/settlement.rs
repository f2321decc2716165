//! Settlement state machine for the optimistic rollup.
//!
//! The [`Settlement`] aggregate owns everything the on-chain contract
//! persisted: the advancing state root, the rollup block registry,
//! operator bonds, the mirrored L2 balances, and the withdrawal queue.
//! Every public operation runs to completion with exclusive access and is
//! all-or-nothing: preconditions are checked before any field changes,
//! and when an outbound transfer follows state effects, a transfer
//! failure rolls the effects back before the error surfaces.

use std::cell::Cell;
use std::collections::HashMap;

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::SettlementConfig;
use crate::fraud_proof_system::fraud_proof::FraudProof;
use crate::fraud_proof_system::state_commitment::genesis_root;
use crate::fraud_proof_system::transaction::{Account, Transaction};
use crate::fraud_proof_system::verification::verify_fraud_proof;
use crate::fraud_proof_system::{merkle_tree, FraudKind};

use super::ledger::{LedgerBridge, LedgerError};

/// Errors surfaced at the settlement boundary. Every failure aborts the
/// operation atomically.
#[derive(Error, Debug)]
pub enum SettlementError {
    /// `deposit` requires attached value.
    #[error("Deposit value must be greater than zero")]
    ZeroDeposit,

    /// Submission value below the configured operator bond.
    #[error("Insufficient bond: required {required}, provided {provided}")]
    InsufficientBond {
        /// Configured minimum bond.
        required: U256,
        /// Value attached to the submission.
        provided: U256,
    },

    /// The zero state root is reserved.
    #[error("State root cannot be zero")]
    ZeroStateRoot,

    /// The zero transaction root is reserved.
    #[error("Transaction root cannot be zero")]
    ZeroTransactionRoot,

    /// A rollup block must commit to at least one transaction.
    #[error("Batch cannot be empty")]
    EmptyBatch,

    /// The submitted root does not commit to the submitted batch.
    #[error("Transaction root does not match batch commitment")]
    TransactionRootMismatch,

    /// No block is registered under this number.
    #[error("Rollup block {0} not found")]
    BlockNotFound(u64),

    /// The block was already invalidated by a challenge.
    #[error("Block was challenged")]
    BlockChallenged(u64),

    /// The block already reached its terminal finalized state.
    #[error("Block already finalized")]
    BlockAlreadyFinalized(u64),

    /// Challenges are only accepted inside the challenge window.
    #[error("Challenge window closed for block {0}")]
    ChallengeWindowClosed(u64),

    /// Finalization is only possible after the challenge window.
    #[error("Challenge window still open for block {0}")]
    ChallengeWindowOpen(u64),

    /// The challenge payload did not decode to a fraud proof.
    #[error("Malformed fraud proof: {0}")]
    MalformedProof(String),

    /// The proof speaks about different roots than the challenged block.
    #[error("Fraud proof is not bound to the challenged block")]
    ProofNotBoundToBlock,

    /// The proof verified but demonstrated no fraud.
    #[error("Challenge rejected: {kind}: {reason}")]
    ChallengeRejected {
        /// Verifier classification.
        kind: FraudKind,
        /// Verifier explanation.
        reason: String,
    },

    /// `request_withdrawal` requires a positive amount.
    #[error("Withdrawal amount must be greater than zero")]
    ZeroWithdrawal,

    /// Mirrored L2 balance below the requested amount.
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Caller's mirrored balance.
        available: U256,
        /// Requested withdrawal amount.
        requested: U256,
    },

    /// Request-id collision; retry in a later host block.
    #[error("Withdrawal request {0} already exists")]
    WithdrawalIdCollision(B256),

    /// No request registered under this id.
    #[error("Withdrawal request {0} not found")]
    WithdrawalNotFound(B256),

    /// The request already paid out.
    #[error("Withdrawal already processed")]
    WithdrawalAlreadyProcessed(B256),

    /// Only the requesting user may process a withdrawal.
    #[error("Caller does not own withdrawal request {0}")]
    NotWithdrawalOwner(B256),

    /// The block the request is bound to has not finalized.
    #[error("Rollup block not finalized")]
    BlockNotFinalized(u64),

    /// A guarded operation re-entered the settlement.
    #[error("Reentrant call")]
    Reentrancy,

    /// Settlement accounting left the representable range.
    #[error("Arithmetic overflow in settlement accounting")]
    ArithmeticOverflow,

    /// The host ledger refused an outbound transfer.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Call envelope the host hands to every settlement operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Initiating principal.
    pub caller: Address,

    /// Native value attached to the call. The host has already moved it
    /// into the settlement's escrow when the operation runs.
    pub value: U256,

    /// Current host block number.
    pub block_number: u64,

    /// Current host timestamp.
    pub timestamp: u64,
}

impl CallContext {
    /// Envelope for a non-payable call.
    pub fn new(caller: Address, block_number: u64, timestamp: u64) -> Self {
        Self {
            caller,
            value: U256::ZERO,
            block_number,
            timestamp,
        }
    }

    /// Attach value to the call.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// A proposed rollup block.
///
/// `challenged` and `finalized` are monotone and mutually exclusive; each
/// marks a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupBlock {
    /// State root the operator advanced to.
    pub state_root: B256,

    /// Merkle commitment over the batch's transaction leaves.
    pub tx_root: B256,

    /// Host block at submission; anchors the challenge window.
    pub host_block_number: u64,

    /// Host timestamp at submission.
    pub timestamp: u64,

    /// Operator that posted the block.
    pub operator: Address,

    /// Value escrowed with this submission.
    pub bond: U256,

    /// Whether a successful challenge invalidated the block.
    pub challenged: bool,

    /// Whether the block finalized after its challenge window.
    pub finalized: bool,
}

/// A withdrawal from the mirrored L2 balance, gated on finalization of
/// the rollup block it was requested under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Requesting user.
    pub user: Address,

    /// Amount debited at request time.
    pub amount: U256,

    /// Rollup block the request is bound to. Zero means the request
    /// predates the first block and is bound to the always-final genesis.
    pub rollup_block_number: u64,

    /// Whether the request has paid out.
    pub processed: bool,
}

/// Events appended by settlement operations, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementEvent {
    /// Native value entered a user's mirrored balance.
    Deposit {
        /// Depositing user.
        user: Address,
        /// Deposited amount.
        amount: U256,
    },

    /// An operator proposed a rollup block.
    RollupBlockSubmitted {
        /// Assigned block number.
        block_number: u64,
        /// Submitted state root.
        state_root: B256,
        /// Submitted batch commitment.
        tx_root: B256,
        /// Submitting operator.
        operator: Address,
    },

    /// A fraud proof invalidated a block.
    Challenge {
        /// Challenged block number.
        block_number: u64,
        /// Rewarded challenger.
        challenger: Address,
    },

    /// A block survived its challenge window.
    BlockFinalized {
        /// Finalized block number.
        block_number: u64,
    },

    /// A user scheduled a withdrawal.
    WithdrawalRequested {
        /// Requesting user.
        user: Address,
        /// Requested amount.
        amount: U256,
        /// Assigned request id.
        id: B256,
    },

    /// A withdrawal paid out.
    WithdrawalProcessed {
        /// Receiving user.
        user: Address,
        /// Paid amount.
        amount: U256,
    },
}

/// Scoped non-reentrancy guard. Acquired on entry of every operation
/// that moves value; the flag is released on all exit paths by `Drop`.
struct ReentrancyGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> ReentrancyGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Result<Self, SettlementError> {
        if flag.get() {
            return Err(SettlementError::Reentrancy);
        }
        flag.set(true);
        Ok(Self { flag })
    }
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// The on-chain settlement aggregate.
#[derive(Debug)]
pub struct Settlement {
    /// Protocol parameters.
    config: SettlementConfig,

    /// State root of the most recently submitted block.
    current_state_root: B256,

    /// Number of the most recently submitted block; dense from 1.
    rollup_block_number: u64,

    /// Sum of deposits minus processed withdrawals.
    total_value_locked: U256,

    /// Retained half of slashed bonds.
    treasury: U256,

    /// Mirrored L2 balances, separate from the committed off-chain state.
    accounts: HashMap<Address, Account>,

    /// Block registry keyed by block number.
    rollup_blocks: HashMap<u64, RollupBlock>,

    /// Escrowed bond per operator, aggregated across its blocks.
    operator_bonds: HashMap<Address, U256>,

    /// Withdrawal queue keyed by request id.
    withdrawal_requests: HashMap<B256, WithdrawalRequest>,

    /// Event journal drained by the runtime.
    events: Vec<SettlementEvent>,

    /// Non-reentrancy flag.
    entered: Cell<bool>,
}

impl Settlement {
    /// Create a settlement at genesis.
    pub fn new(config: SettlementConfig) -> Self {
        Self {
            config,
            current_state_root: genesis_root(),
            rollup_block_number: 0,
            total_value_locked: U256::ZERO,
            treasury: U256::ZERO,
            accounts: HashMap::new(),
            rollup_blocks: HashMap::new(),
            operator_bonds: HashMap::new(),
            withdrawal_requests: HashMap::new(),
            events: Vec::new(),
            entered: Cell::new(false),
        }
    }

    /// Create a settlement with default protocol parameters.
    pub fn with_default_config() -> Self {
        Self::new(SettlementConfig::default())
    }

    /// Credit attached native value to the caller's mirrored L2 balance.
    pub fn deposit(&mut self, ctx: &CallContext) -> Result<(), SettlementError> {
        let _guard = ReentrancyGuard::enter(&self.entered)?;

        if ctx.value.is_zero() {
            return Err(SettlementError::ZeroDeposit);
        }

        let balance = self
            .accounts
            .get(&ctx.caller)
            .map(|account| account.balance)
            .unwrap_or_default();
        let new_balance = balance
            .checked_add(ctx.value)
            .ok_or(SettlementError::ArithmeticOverflow)?;
        let new_tvl = self
            .total_value_locked
            .checked_add(ctx.value)
            .ok_or(SettlementError::ArithmeticOverflow)?;

        self.accounts.entry(ctx.caller).or_default().balance = new_balance;
        self.total_value_locked = new_tvl;
        self.events.push(SettlementEvent::Deposit {
            user: ctx.caller,
            amount: ctx.value,
        });

        debug!(user = %ctx.caller, amount = %ctx.value, "deposit credited");
        Ok(())
    }

    /// Accept a bonded rollup block proposal and advance the state root
    /// optimistically.
    ///
    /// The submitted `tx_root` must be the Merkle root over the batch's
    /// transaction leaves, the same commitment the fraud proof verifier
    /// opens inclusion proofs against.
    pub fn submit_rollup_block(
        &mut self,
        ctx: &CallContext,
        new_state_root: B256,
        tx_root: B256,
        txs: &[Transaction],
    ) -> Result<u64, SettlementError> {
        if ctx.value < self.config.operator_bond {
            return Err(SettlementError::InsufficientBond {
                required: self.config.operator_bond,
                provided: ctx.value,
            });
        }
        if new_state_root == B256::ZERO {
            return Err(SettlementError::ZeroStateRoot);
        }
        if tx_root == B256::ZERO {
            return Err(SettlementError::ZeroTransactionRoot);
        }
        if txs.is_empty() {
            return Err(SettlementError::EmptyBatch);
        }

        let leaves: Vec<B256> = txs.iter().map(Transaction::merkle_leaf).collect();
        let computed_root =
            merkle_tree::compute_root(&leaves).map_err(|_| SettlementError::EmptyBatch)?;
        if computed_root != tx_root {
            return Err(SettlementError::TransactionRootMismatch);
        }

        let block_number = self
            .rollup_block_number
            .checked_add(1)
            .ok_or(SettlementError::ArithmeticOverflow)?;
        let new_bond = self
            .operator_bond(ctx.caller)
            .checked_add(ctx.value)
            .ok_or(SettlementError::ArithmeticOverflow)?;

        self.rollup_block_number = block_number;
        self.rollup_blocks.insert(
            block_number,
            RollupBlock {
                state_root: new_state_root,
                tx_root,
                host_block_number: ctx.block_number,
                timestamp: ctx.timestamp,
                operator: ctx.caller,
                bond: ctx.value,
                challenged: false,
                finalized: false,
            },
        );
        self.operator_bonds.insert(ctx.caller, new_bond);
        self.current_state_root = new_state_root;
        self.events.push(SettlementEvent::RollupBlockSubmitted {
            block_number,
            state_root: new_state_root,
            tx_root,
            operator: ctx.caller,
        });

        info!(
            block_number,
            operator = %ctx.caller,
            state_root = %new_state_root,
            "rollup block submitted"
        );
        Ok(block_number)
    }

    /// Challenge a pending block with a fraud proof.
    ///
    /// The proof must decode, must be bound to the challenged block (its
    /// claimed roots are the block's roots and its pre-state root is the
    /// parent's state root), and must demonstrate fraud under
    /// [`verify_fraud_proof`]. A successful challenge is terminal for the
    /// block: the operator's whole aggregate bond leaves escrow, half to
    /// the challenger and half to the treasury, and a challenged tip rolls
    /// the current state root back to its parent.
    pub fn challenge_block(
        &mut self,
        ledger: &mut dyn LedgerBridge,
        ctx: &CallContext,
        block_number: u64,
        proof_bytes: &[u8],
    ) -> Result<(), SettlementError> {
        let _guard = ReentrancyGuard::enter(&self.entered)?;

        let block = self
            .rollup_blocks
            .get(&block_number)
            .ok_or(SettlementError::BlockNotFound(block_number))?
            .clone();
        if block.challenged {
            return Err(SettlementError::BlockChallenged(block_number));
        }
        if block.finalized {
            return Err(SettlementError::BlockAlreadyFinalized(block_number));
        }

        let deadline = block
            .host_block_number
            .checked_add(self.config.challenge_period_blocks)
            .ok_or(SettlementError::ArithmeticOverflow)?;
        if ctx.block_number > deadline {
            return Err(SettlementError::ChallengeWindowClosed(block_number));
        }

        let proof = FraudProof::from_bytes(proof_bytes)
            .map_err(|e| SettlementError::MalformedProof(e.to_string()))?;

        // The proof has to speak about this block's transition, not some
        // fabricated pair of roots.
        let parent_root = if block_number == 1 {
            genesis_root()
        } else {
            self.rollup_blocks
                .get(&(block_number - 1))
                .map(|parent| parent.state_root)
                .ok_or(SettlementError::BlockNotFound(block_number - 1))?
        };
        if proof.claimed_post_state_root != block.state_root
            || proof.transaction_root != block.tx_root
            || proof.pre_state_root != parent_root
        {
            return Err(SettlementError::ProofNotBoundToBlock);
        }

        let verdict = verify_fraud_proof(&proof);
        if !verdict.is_fraud {
            return Err(SettlementError::ChallengeRejected {
                kind: verdict.kind,
                reason: verdict.reason.unwrap_or_default(),
            });
        }

        let bond = self.operator_bond(block.operator);
        let reward = bond / U256::from(2);
        let retained = bond - reward;
        let new_treasury = self
            .treasury
            .checked_add(retained)
            .ok_or(SettlementError::ArithmeticOverflow)?;
        let old_treasury = self.treasury;
        let is_tip = block_number == self.rollup_block_number;

        if let Some(entry) = self.rollup_blocks.get_mut(&block_number) {
            entry.challenged = true;
        }
        self.operator_bonds.insert(block.operator, U256::ZERO);
        self.treasury = new_treasury;
        if is_tip {
            self.current_state_root = parent_root;
        }
        self.events.push(SettlementEvent::Challenge {
            block_number,
            challenger: ctx.caller,
        });

        if !reward.is_zero() {
            if let Err(err) = ledger.transfer(ctx.caller, reward) {
                // Roll the effects back; the operation is all-or-nothing.
                if let Some(entry) = self.rollup_blocks.get_mut(&block_number) {
                    entry.challenged = false;
                }
                self.operator_bonds.insert(block.operator, bond);
                self.treasury = old_treasury;
                if is_tip {
                    self.current_state_root = block.state_root;
                }
                self.events.pop();
                return Err(err.into());
            }
        }

        info!(
            block_number,
            challenger = %ctx.caller,
            operator = %block.operator,
            slashed = %bond,
            kind = %verdict.kind,
            "block challenged and operator slashed"
        );
        Ok(())
    }

    /// Finalize a pending block once its challenge window has elapsed and
    /// return this block's bond to its operator.
    pub fn finalize_block(
        &mut self,
        ledger: &mut dyn LedgerBridge,
        ctx: &CallContext,
        block_number: u64,
    ) -> Result<(), SettlementError> {
        let _guard = ReentrancyGuard::enter(&self.entered)?;

        let block = self
            .rollup_blocks
            .get(&block_number)
            .ok_or(SettlementError::BlockNotFound(block_number))?
            .clone();
        if block.finalized {
            return Err(SettlementError::BlockAlreadyFinalized(block_number));
        }
        if block.challenged {
            return Err(SettlementError::BlockChallenged(block_number));
        }

        let deadline = block
            .host_block_number
            .checked_add(self.config.challenge_period_blocks)
            .ok_or(SettlementError::ArithmeticOverflow)?;
        if ctx.block_number <= deadline {
            return Err(SettlementError::ChallengeWindowOpen(block_number));
        }

        // The bond return is capped by what is still escrowed: a
        // challenge against any of the operator's blocks drains the
        // aggregate bond.
        let escrowed = self.operator_bond(block.operator);
        let returned = block.bond.min(escrowed);

        self.operator_bonds
            .insert(block.operator, escrowed - returned);
        if let Some(entry) = self.rollup_blocks.get_mut(&block_number) {
            entry.finalized = true;
        }
        self.events
            .push(SettlementEvent::BlockFinalized { block_number });

        if !returned.is_zero() {
            if let Err(err) = ledger.transfer(block.operator, returned) {
                self.operator_bonds.insert(block.operator, escrowed);
                if let Some(entry) = self.rollup_blocks.get_mut(&block_number) {
                    entry.finalized = false;
                }
                self.events.pop();
                return Err(err.into());
            }
        }

        info!(
            block_number,
            operator = %block.operator,
            returned = %returned,
            "block finalized"
        );
        Ok(())
    }

    /// Schedule a withdrawal: debit the mirrored balance now, pay out
    /// once the current rollup block finalizes.
    pub fn request_withdrawal(
        &mut self,
        ctx: &CallContext,
        amount: U256,
    ) -> Result<B256, SettlementError> {
        if amount.is_zero() {
            return Err(SettlementError::ZeroWithdrawal);
        }

        let balance = self
            .accounts
            .get(&ctx.caller)
            .map(|account| account.balance)
            .unwrap_or_default();
        if balance < amount {
            return Err(SettlementError::InsufficientBalance {
                available: balance,
                requested: amount,
            });
        }

        let id = withdrawal_id(
            ctx.caller,
            amount,
            self.rollup_block_number,
            ctx.timestamp,
        );
        if self.withdrawal_requests.contains_key(&id) {
            return Err(SettlementError::WithdrawalIdCollision(id));
        }

        self.accounts.entry(ctx.caller).or_default().balance = balance - amount;
        self.withdrawal_requests.insert(
            id,
            WithdrawalRequest {
                user: ctx.caller,
                amount,
                rollup_block_number: self.rollup_block_number,
                processed: false,
            },
        );
        self.events.push(SettlementEvent::WithdrawalRequested {
            user: ctx.caller,
            amount,
            id,
        });

        debug!(user = %ctx.caller, amount = %amount, id = %id, "withdrawal requested");
        Ok(id)
    }

    /// Pay out a withdrawal whose referenced rollup block has finalized.
    pub fn process_withdrawal(
        &mut self,
        ledger: &mut dyn LedgerBridge,
        ctx: &CallContext,
        id: B256,
    ) -> Result<(), SettlementError> {
        let _guard = ReentrancyGuard::enter(&self.entered)?;

        let request = self
            .withdrawal_requests
            .get(&id)
            .ok_or(SettlementError::WithdrawalNotFound(id))?
            .clone();
        if request.processed {
            return Err(SettlementError::WithdrawalAlreadyProcessed(id));
        }
        if request.user != ctx.caller {
            return Err(SettlementError::NotWithdrawalOwner(id));
        }

        // Block 0 is the genesis state, final by definition; anything
        // later must have reached its terminal finalized state.
        if request.rollup_block_number > 0 {
            let finalized = self
                .rollup_blocks
                .get(&request.rollup_block_number)
                .map(|block| block.finalized)
                .unwrap_or(false);
            if !finalized {
                return Err(SettlementError::BlockNotFinalized(
                    request.rollup_block_number,
                ));
            }
        }

        let new_tvl = self
            .total_value_locked
            .checked_sub(request.amount)
            .ok_or(SettlementError::ArithmeticOverflow)?;

        if let Some(entry) = self.withdrawal_requests.get_mut(&id) {
            entry.processed = true;
        }
        self.total_value_locked = new_tvl;
        self.events.push(SettlementEvent::WithdrawalProcessed {
            user: request.user,
            amount: request.amount,
        });

        if let Err(err) = ledger.transfer(request.user, request.amount) {
            if let Some(entry) = self.withdrawal_requests.get_mut(&id) {
                entry.processed = false;
            }
            self.total_value_locked = new_tvl
                .checked_add(request.amount)
                .ok_or(SettlementError::ArithmeticOverflow)?;
            self.events.pop();
            return Err(err.into());
        }

        info!(user = %request.user, amount = %request.amount, id = %id, "withdrawal processed");
        Ok(())
    }

    /// Current state root and most recent block number.
    pub fn current_state(&self) -> (B256, u64) {
        (self.current_state_root, self.rollup_block_number)
    }

    /// Mirrored L2 balance of an address.
    pub fn balance_of(&self, address: Address) -> U256 {
        self.accounts
            .get(&address)
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    /// Look up a rollup block.
    pub fn rollup_block(&self, block_number: u64) -> Option<&RollupBlock> {
        self.rollup_blocks.get(&block_number)
    }

    /// Aggregate escrowed bond of an operator.
    pub fn operator_bond(&self, operator: Address) -> U256 {
        self.operator_bonds
            .get(&operator)
            .copied()
            .unwrap_or_default()
    }

    /// Look up a withdrawal request.
    pub fn withdrawal_request(&self, id: B256) -> Option<&WithdrawalRequest> {
        self.withdrawal_requests.get(&id)
    }

    /// Sum of deposits minus processed withdrawals.
    pub fn total_value_locked(&self) -> U256 {
        self.total_value_locked
    }

    /// Retained half of slashed bonds.
    pub fn treasury(&self) -> U256 {
        self.treasury
    }

    /// Whether `finalize_block` would pass its preconditions at
    /// `at_block`.
    pub fn can_finalize(&self, block_number: u64, at_block: u64) -> bool {
        match self.rollup_blocks.get(&block_number) {
            Some(block) => {
                !block.challenged
                    && !block.finalized
                    && block
                        .host_block_number
                        .checked_add(self.config.challenge_period_blocks)
                        .is_some_and(|deadline| at_block > deadline)
            }
            None => false,
        }
    }

    /// Whether `challenge_block` would still accept a proof at
    /// `at_block`. Consistent with `challenge_block`: the window bound is
    /// enforced on both.
    pub fn can_challenge(&self, block_number: u64, at_block: u64) -> bool {
        match self.rollup_blocks.get(&block_number) {
            Some(block) => {
                !block.challenged
                    && !block.finalized
                    && block
                        .host_block_number
                        .checked_add(self.config.challenge_period_blocks)
                        .is_some_and(|deadline| at_block <= deadline)
            }
            None => false,
        }
    }

    /// Whether `process_withdrawal` would pass for the request owner.
    pub fn can_process_withdrawal(&self, id: B256) -> bool {
        match self.withdrawal_requests.get(&id) {
            Some(request) if !request.processed => {
                request.rollup_block_number == 0
                    || self
                        .rollup_blocks
                        .get(&request.rollup_block_number)
                        .map(|block| block.finalized)
                        .unwrap_or(false)
            }
            _ => false,
        }
    }

    /// Events appended since the last drain.
    pub fn events(&self) -> &[SettlementEvent] {
        &self.events
    }

    /// Drain the event journal.
    pub fn take_events(&mut self) -> Vec<SettlementEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Withdrawal request id:
/// `keccak256(user || amount || rollup_block_number || timestamp)` with
/// 256-bit big-endian words.
fn withdrawal_id(user: Address, amount: U256, rollup_block_number: u64, timestamp: u64) -> B256 {
    let mut input = [0u8; 20 + 32 + 32 + 32];
    input[..20].copy_from_slice(user.as_slice());
    input[20..52].copy_from_slice(&amount.to_be_bytes::<32>());
    input[52..84].copy_from_slice(&U256::from(rollup_block_number).to_be_bytes::<32>());
    input[84..116].copy_from_slice(&U256::from(timestamp).to_be_bytes::<32>());
    keccak256(input)
}
