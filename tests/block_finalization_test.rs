//! Settlement state machine integration tests: deposits, bonded
//! submission, challenge and finalization, withdrawals, and the global
//! accounting invariants.

mod common;

use alloy_primitives::{Address, B256, U256};
use common::{signed_transfer, signing_key, sorted_state, tenths, tx_root_of, units, Harness};
use layer2_settlement::fraud_proof_system::state_commitment::compute_state_root;
use layer2_settlement::{
    build_fraud_proof, Account, SettlementError, SettlementEvent, Transaction,
};

fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

fn state_root(pairs: Vec<(Address, Account)>) -> B256 {
    let (addresses, accounts) = sorted_state(pairs);
    compute_state_root(&addresses, &accounts).unwrap()
}

/// A plausible one-transfer batch for blocks whose contents the test
/// does not care about.
fn filler_batch(seed: u8) -> Vec<Transaction> {
    let key = signing_key(seed);
    vec![signed_transfer(
        &key,
        addr(0x77),
        units(1),
        U256::ZERO,
        tenths(1),
    )]
}

#[test]
fn deposit_credits_balance_and_locks_value() {
    let mut harness = Harness::new();
    let user1 = addr(0x0A);
    harness.fund(user1, units(3));

    harness.deposit(user1, units(1)).unwrap();

    assert_eq!(harness.settlement.balance_of(user1), units(1));
    assert_eq!(harness.settlement.total_value_locked(), units(1));
    assert_eq!(
        harness.settlement.take_events(),
        vec![SettlementEvent::Deposit {
            user: user1,
            amount: units(1)
        }]
    );
    harness.assert_conservation(&[]);
}

#[test]
fn valid_submission_advances_state_and_escrows_bond() {
    let mut harness = Harness::new();
    let user1 = addr(0x0A);
    let operator = addr(0x0B);
    harness.fund(user1, units(5));
    harness.fund(operator, units(1));
    harness.deposit(user1, units(5)).unwrap();

    let batch = filler_batch(0x51);
    let r1 = B256::repeat_byte(0xA1);
    let block = harness
        .submit_block(operator, units(1), r1, &batch)
        .unwrap();

    assert_eq!(block, 1);
    assert_eq!(harness.settlement.current_state(), (r1, 1));
    assert_eq!(harness.settlement.operator_bond(operator), units(1));

    let stored = harness.settlement.rollup_block(1).unwrap();
    assert_eq!(stored.operator, operator);
    assert_eq!(stored.tx_root, tx_root_of(&batch));
    assert!(!stored.challenged);
    assert!(!stored.finalized);

    assert!(harness.settlement.events().contains(
        &SettlementEvent::RollupBlockSubmitted {
            block_number: 1,
            state_root: r1,
            tx_root: tx_root_of(&batch),
            operator,
        }
    ));
    harness.assert_conservation(&[operator]);
}

#[test]
fn submission_preconditions_are_enforced() {
    let mut harness = Harness::new();
    let operator = addr(0x0B);
    harness.fund(operator, units(10));

    let batch = filler_batch(0x52);
    let root = B256::repeat_byte(0xA1);

    assert!(matches!(
        harness.submit_block(operator, tenths(9), root, &batch),
        Err(SettlementError::InsufficientBond { .. })
    ));
    assert!(matches!(
        harness.submit_block(operator, units(1), B256::ZERO, &batch),
        Err(SettlementError::ZeroStateRoot)
    ));
    assert!(matches!(
        harness.submit_block_with_root(operator, units(1), root, B256::ZERO, &batch),
        Err(SettlementError::ZeroTransactionRoot)
    ));
    assert!(matches!(
        harness.submit_block_with_root(operator, units(1), root, B256::repeat_byte(0x01), &[]),
        Err(SettlementError::EmptyBatch)
    ));
    // The submitted commitment must match the batch.
    assert!(matches!(
        harness.submit_block_with_root(operator, units(1), root, B256::repeat_byte(0xEE), &batch),
        Err(SettlementError::TransactionRootMismatch)
    ));

    // Nothing was accepted, nothing escrowed.
    assert_eq!(harness.settlement.current_state().1, 0);
    assert_eq!(harness.settlement.operator_bond(operator), U256::ZERO);
    assert_eq!(harness.ledger.balance_of(operator), units(10));
}

#[test]
fn block_numbers_are_dense_and_monotonic() {
    let mut harness = Harness::new();
    let operator = addr(0x0B);
    harness.fund(operator, units(3));

    let batch = filler_batch(0x53);
    for expected in 1..=3u64 {
        let number = harness
            .submit_block(operator, units(1), B256::repeat_byte(expected as u8), &batch)
            .unwrap();
        assert_eq!(number, expected);
        assert_eq!(harness.settlement.current_state().1, expected);
    }
}

#[test]
fn finalization_returns_the_bond_after_the_window() {
    let mut harness = Harness::new();
    let operator = addr(0x0B);
    harness.fund(operator, units(1));

    let batch = filler_batch(0x54);
    let r1 = B256::repeat_byte(0xA1);
    harness.submit_block(operator, units(1), r1, &batch).unwrap();
    let submitted_at = harness.host_block;

    // Inside the window the block can be challenged but not finalized.
    assert!(harness.settlement.can_challenge(1, submitted_at));
    assert!(!harness.settlement.can_finalize(1, submitted_at));
    assert!(matches!(
        harness.finalize(operator, 1),
        Err(SettlementError::ChallengeWindowOpen(1))
    ));

    harness.advance_blocks(50_401);
    assert!(harness.settlement.can_finalize(1, harness.host_block));
    assert!(!harness.settlement.can_challenge(1, harness.host_block));

    harness.finalize(operator, 1).unwrap();

    assert!(harness.settlement.rollup_block(1).unwrap().finalized);
    assert_eq!(harness.settlement.operator_bond(operator), U256::ZERO);
    assert_eq!(harness.ledger.balance_of(operator), units(1));
    assert!(harness
        .settlement
        .events()
        .contains(&SettlementEvent::BlockFinalized { block_number: 1 }));
    harness.assert_conservation(&[operator]);

    // Terminal: cannot finalize twice, cannot challenge afterwards.
    assert!(matches!(
        harness.finalize(operator, 1),
        Err(SettlementError::BlockAlreadyFinalized(1))
    ));
}

#[test]
fn verified_fraud_slashes_and_rewards_the_challenger() {
    let mut harness = Harness::new();
    let honest_operator = addr(0x0B);
    let cheating_operator = addr(0x0C);
    let challenger = addr(0x0D);
    harness.fund(honest_operator, units(1));
    harness.fund(cheating_operator, units(1));

    // Block 1 commits to the real account set, so block 2's pre-state
    // can be opened against it.
    let user1 = addr(0x11);
    let user2 = addr(0x22);
    let pre = vec![
        (user1, Account::new(units(10), U256::ZERO)),
        (user2, Account::new(units(5), U256::ZERO)),
    ];
    let r1 = state_root(pre.clone());
    harness
        .submit_block(honest_operator, units(1), r1, &filler_batch(0x55))
        .unwrap();

    // Block 2 under-debits the sender: it should debit 2.1 units but the
    // operator claims only 2.
    let tx = Transaction {
        from: user1,
        to: user2,
        amount: units(2),
        nonce: U256::ZERO,
        fee: tenths(1),
        signature: Vec::new(),
    };
    let batch = vec![tx];
    let claimed = vec![
        (user1, Account::new(units(8), U256::from(1))),
        (user2, Account::new(units(7), U256::ZERO)),
    ];
    let r2 = state_root(claimed.clone());
    harness
        .submit_block(cheating_operator, units(1), r2, &batch)
        .unwrap();

    let (pre_addresses, pre_accounts) = sorted_state(pre);
    let (claimed_addresses, claimed_accounts) = sorted_state(claimed);
    let proof = build_fraud_proof(
        &batch,
        0,
        &pre_addresses,
        &pre_accounts,
        &claimed_addresses,
        &claimed_accounts,
    )
    .unwrap();

    harness
        .challenge(challenger, 2, &proof.to_bytes().unwrap())
        .unwrap();

    // The block is terminally invalidated and the whole bond left
    // escrow: half reward, half treasury.
    assert!(harness.settlement.rollup_block(2).unwrap().challenged);
    assert_eq!(harness.settlement.operator_bond(cheating_operator), U256::ZERO);
    assert_eq!(harness.ledger.balance_of(challenger), tenths(5));
    assert_eq!(harness.settlement.treasury(), tenths(5));
    assert!(harness.settlement.events().contains(&SettlementEvent::Challenge {
        block_number: 2,
        challenger,
    }));

    // The challenged tip rolls the current root back to its parent.
    assert_eq!(harness.settlement.current_state(), (r1, 2));

    // A challenged block never finalizes.
    harness.advance_blocks(50_401);
    let err = harness.finalize(cheating_operator, 2).unwrap_err();
    assert!(matches!(err, SettlementError::BlockChallenged(2)));
    assert_eq!(err.to_string(), "Block was challenged");

    // The honest operator is untouched and finalizes block 1 normally.
    harness.finalize(honest_operator, 1).unwrap();
    assert_eq!(harness.ledger.balance_of(honest_operator), units(1));
    harness.assert_conservation(&[honest_operator, cheating_operator]);
}

#[test]
fn unproven_challenges_do_not_slash() {
    let mut harness = Harness::new();
    let operator = addr(0x0B);
    let challenger = addr(0x0D);
    harness.fund(operator, units(1));

    let user1 = addr(0x11);
    let user2 = addr(0x22);
    let pre = vec![
        (user1, Account::new(units(10), U256::ZERO)),
        (user2, Account::new(units(5), U256::ZERO)),
    ];
    let r1 = state_root(pre.clone());
    harness
        .submit_block(operator, units(1), r1, &filler_batch(0x56))
        .unwrap();

    // Honest block 2: the claimed post-state is exactly what execution
    // produces.
    let tx = Transaction {
        from: user1,
        to: user2,
        amount: units(2),
        nonce: U256::ZERO,
        fee: tenths(1),
        signature: Vec::new(),
    };
    let batch = vec![tx];
    let claimed = vec![
        (user1, Account::new(tenths(79), U256::from(1))),
        (user2, Account::new(units(7), U256::ZERO)),
    ];
    let r2 = state_root(claimed.clone());
    harness.fund(operator, units(1));
    harness
        .submit_block(operator, units(1), r2, &batch)
        .unwrap();

    // Garbage bytes are rejected outright.
    assert!(matches!(
        harness.challenge(challenger, 2, &[0xDE, 0xAD]),
        Err(SettlementError::MalformedProof(_))
    ));

    // A well-formed proof of an honest transition is rejected by the
    // verifier.
    let (pre_addresses, pre_accounts) = sorted_state(pre);
    let (claimed_addresses, claimed_accounts) = sorted_state(claimed);
    let honest_proof = build_fraud_proof(
        &batch,
        0,
        &pre_addresses,
        &pre_accounts,
        &claimed_addresses,
        &claimed_accounts,
    )
    .unwrap();
    assert!(matches!(
        harness.challenge(challenger, 2, &honest_proof.to_bytes().unwrap()),
        Err(SettlementError::ChallengeRejected { .. })
    ));

    // A proof about some other transition does not bind to this block.
    let other_claimed = vec![
        (user1, Account::new(units(1), U256::from(1))),
        (user2, Account::new(units(1), U256::ZERO)),
    ];
    let (other_addresses, other_accounts) = sorted_state(other_claimed);
    let unbound_proof = build_fraud_proof(
        &batch,
        0,
        &pre_addresses,
        &pre_accounts,
        &other_addresses,
        &other_accounts,
    )
    .unwrap();
    assert!(matches!(
        harness.challenge(challenger, 2, &unbound_proof.to_bytes().unwrap()),
        Err(SettlementError::ProofNotBoundToBlock)
    ));

    // Nothing was slashed by any of the rejected challenges.
    assert_eq!(harness.settlement.operator_bond(operator), units(2));
    assert!(!harness.settlement.rollup_block(2).unwrap().challenged);
    assert_eq!(harness.ledger.balance_of(challenger), U256::ZERO);
    harness.assert_conservation(&[operator]);
}

#[test]
fn challenges_outside_the_window_are_rejected() {
    let mut harness = Harness::new();
    let operator = addr(0x0B);
    harness.fund(operator, units(1));

    let r1 = B256::repeat_byte(0xA1);
    harness
        .submit_block(operator, units(1), r1, &filler_batch(0x57))
        .unwrap();

    harness.advance_blocks(50_401);
    assert!(!harness.settlement.can_challenge(1, harness.host_block));

    // Even a would-be-valid payload is refused once the window closed;
    // the window check runs before proof decoding.
    assert!(matches!(
        harness.challenge(addr(0x0D), 1, &[0u8; 8]),
        Err(SettlementError::ChallengeWindowClosed(1))
    ));
}

#[test]
fn withdrawals_are_bound_to_finalization() {
    let mut harness = Harness::new();
    let user1 = addr(0x0A);
    let operator = addr(0x0B);
    harness.fund(user1, units(5));
    harness.fund(operator, units(2));
    harness.deposit(user1, units(5)).unwrap();

    // Block 1 finalizes; a request bound to it pays out.
    harness
        .submit_block(operator, units(1), B256::repeat_byte(0xA1), &filler_batch(0x58))
        .unwrap();
    harness.advance_blocks(50_401);
    harness.finalize(operator, 1).unwrap();

    let id = harness.request_withdrawal(user1, units(1)).unwrap();
    assert_eq!(harness.settlement.balance_of(user1), units(4));
    assert_eq!(
        harness.settlement.withdrawal_request(id).unwrap().rollup_block_number,
        1
    );
    assert!(harness.settlement.can_process_withdrawal(id));

    harness.process_withdrawal(user1, id).unwrap();
    assert_eq!(harness.ledger.balance_of(user1), units(1));
    assert_eq!(harness.settlement.total_value_locked(), units(4));
    assert!(harness.settlement.withdrawal_request(id).unwrap().processed);

    // A request bound to a pending block does not pay out.
    harness
        .submit_block(operator, units(1), B256::repeat_byte(0xA2), &filler_batch(0x59))
        .unwrap();
    harness.advance_blocks(1);
    let pending_id = harness.request_withdrawal(user1, units(1)).unwrap();
    assert!(!harness.settlement.can_process_withdrawal(pending_id));

    let err = harness.process_withdrawal(user1, pending_id).unwrap_err();
    assert!(matches!(err, SettlementError::BlockNotFinalized(2)));
    assert_eq!(err.to_string(), "Rollup block not finalized");

    // Once the block finalizes the same request goes through.
    harness.advance_blocks(50_401);
    harness.finalize(operator, 2).unwrap();
    harness.process_withdrawal(user1, pending_id).unwrap();
    assert_eq!(harness.ledger.balance_of(user1), units(2));
    harness.assert_conservation(&[operator]);
}

#[test]
fn withdrawal_preconditions_are_enforced() {
    let mut harness = Harness::new();
    let user1 = addr(0x0A);
    let other = addr(0x0E);
    harness.fund(user1, units(2));
    harness.deposit(user1, units(2)).unwrap();

    assert!(matches!(
        harness.request_withdrawal(user1, U256::ZERO),
        Err(SettlementError::ZeroWithdrawal)
    ));
    assert!(matches!(
        harness.request_withdrawal(user1, units(3)),
        Err(SettlementError::InsufficientBalance { .. })
    ));

    let id = harness.request_withdrawal(user1, units(1)).unwrap();

    assert!(matches!(
        harness.process_withdrawal(other, id),
        Err(SettlementError::NotWithdrawalOwner(_))
    ));
    assert!(matches!(
        harness.process_withdrawal(user1, B256::repeat_byte(0x99)),
        Err(SettlementError::WithdrawalNotFound(_))
    ));

    harness.process_withdrawal(user1, id).unwrap();
    assert!(matches!(
        harness.process_withdrawal(user1, id),
        Err(SettlementError::WithdrawalAlreadyProcessed(_))
    ));
}

#[test]
fn conservation_holds_across_a_full_lifecycle() {
    let mut harness = Harness::new();
    let user1 = addr(0x0A);
    let operator = addr(0x0B);
    let challenger = addr(0x0D);
    harness.fund(user1, units(6));
    harness.fund(operator, units(2));

    harness.deposit(user1, units(6)).unwrap();
    harness.assert_conservation(&[operator]);

    let user2 = addr(0x22);
    let pre = vec![
        (user1, Account::new(units(6), U256::ZERO)),
        (user2, Account::new(units(1), U256::ZERO)),
    ];
    let r1 = state_root(pre.clone());
    harness
        .submit_block(operator, units(1), r1, &filler_batch(0x5A))
        .unwrap();
    harness.assert_conservation(&[operator]);

    // The withdrawal is requested now so it binds to block 1; a request
    // made after block 2 would be stuck behind a block that can never
    // finalize once challenged.
    let id = harness.request_withdrawal(user1, units(6)).unwrap();
    harness.assert_conservation(&[operator]);

    // A fraudulent block 2 gets slashed.
    let tx = Transaction {
        from: user1,
        to: user2,
        amount: units(1),
        nonce: U256::ZERO,
        fee: U256::ZERO,
        signature: Vec::new(),
    };
    let batch = vec![tx];
    let claimed = vec![
        (user1, Account::new(units(6), U256::from(1))),
        (user2, Account::new(units(2), U256::ZERO)),
    ];
    let r2 = state_root(claimed.clone());
    harness
        .submit_block(operator, units(1), r2, &batch)
        .unwrap();
    harness.assert_conservation(&[operator]);

    let (pre_addresses, pre_accounts) = sorted_state(pre);
    let (claimed_addresses, claimed_accounts) = sorted_state(claimed);
    let proof = build_fraud_proof(
        &batch,
        0,
        &pre_addresses,
        &pre_accounts,
        &claimed_addresses,
        &claimed_accounts,
    )
    .unwrap();
    harness
        .challenge(challenger, 2, &proof.to_bytes().unwrap())
        .unwrap();
    harness.assert_conservation(&[operator]);

    // Block 1 cannot finalize its full bond back: the aggregate was
    // slashed to zero.
    harness.advance_blocks(50_401);
    harness.finalize(operator, 1).unwrap();
    assert_eq!(harness.ledger.balance_of(operator), U256::ZERO);
    harness.assert_conservation(&[operator]);

    // With block 1 final the earlier request pays out in full.
    harness.process_withdrawal(user1, id).unwrap();
    assert_eq!(harness.settlement.total_value_locked(), U256::ZERO);
    harness.assert_conservation(&[operator]);

    // What remains in escrow is exactly the treasury.
    assert_eq!(harness.ledger.escrow_balance(), harness.settlement.treasury());
}

#[test]
fn terminal_states_are_mutually_exclusive() {
    let mut harness = Harness::new();
    let operator = addr(0x0B);
    harness.fund(operator, units(1));

    harness
        .submit_block(operator, units(1), B256::repeat_byte(0xA1), &filler_batch(0x5B))
        .unwrap();
    harness.advance_blocks(50_401);
    harness.finalize(operator, 1).unwrap();

    let block = harness.settlement.rollup_block(1).unwrap();
    assert!(block.finalized && !block.challenged);

    // A finalized block rejects challenges before even reading the
    // proof.
    assert!(matches!(
        harness.challenge(addr(0x0D), 1, &[0u8; 4]),
        Err(SettlementError::BlockAlreadyFinalized(1))
    ));
}

#[test]
fn unknown_blocks_are_rejected() {
    let mut harness = Harness::new();

    assert!(matches!(
        harness.finalize(addr(0x0B), 7),
        Err(SettlementError::BlockNotFound(7))
    ));
    assert!(matches!(
        harness.challenge(addr(0x0D), 7, &[0u8; 4]),
        Err(SettlementError::BlockNotFound(7))
    ));
    assert!(!harness.settlement.can_finalize(7, 10));
    assert!(!harness.settlement.can_challenge(7, 10));
}
