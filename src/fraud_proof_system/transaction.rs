//! Transaction engine for the layer-2 system.
//!
//! Canonical transaction encoding, Merkle leaf and signing hashes,
//! secp256k1 signer recovery, and the deterministic single-transfer
//! execution engine the fraud proof verifier re-runs on chain.

use alloy_primitives::{keccak256, Address, B256, U256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// EIP-712 style type string committed into every signing hash.
const TRANSACTION_TYPE: &str =
    "Transaction(address from,address to,uint256 amount,uint256 nonce,uint256 fee)";

/// Prefix the host applies before signature recovery over a 32-byte hash.
const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Errors that can occur while decoding or recovering transactions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The canonical encoding has a fixed width.
    #[error("Invalid transaction encoding: expected {expected} bytes, got {got}")]
    InvalidEncoding {
        /// Required length.
        expected: usize,
        /// Provided length.
        got: usize,
    },

    /// Signatures are exactly 65 bytes, `r || s || v`.
    #[error("Invalid signature length: expected 65 bytes, got {0}")]
    InvalidSignatureLength(usize),

    /// The `r` and `s` components do not form a valid secp256k1 signature.
    #[error("Malformed signature components")]
    MalformedSignature,

    /// The recovery byte is not one of 0, 1, 27, 28.
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// Public key recovery failed.
    #[error("Signer recovery failed")]
    RecoveryFailed,

    /// A balance or nonce update left the 256-bit range. The host rejects
    /// such a transfer outright instead of wrapping.
    #[error("Arithmetic overflow during transfer execution")]
    ArithmeticOverflow,
}

/// A layer-2 account: balance plus outbound-transfer nonce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account balance in wei.
    pub balance: U256,

    /// Number of successful outbound transfers.
    pub nonce: U256,
}

impl Account {
    /// Create an account with the given balance and nonce.
    pub fn new(balance: U256, nonce: U256) -> Self {
        Self { balance, nonce }
    }
}

/// A layer-2 value transfer.
///
/// The signature is carried alongside the payload but is not part of the
/// canonical encoding or the Merkle leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender address.
    pub from: Address,

    /// Recipient address.
    pub to: Address,

    /// Amount to transfer, in wei.
    pub amount: U256,

    /// Sender nonce at execution time.
    pub nonce: U256,

    /// Fee burned by the transfer, in wei.
    pub fee: U256,

    /// 65-byte `r || s || v` signature over the signing hash.
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Width of the canonical encoding: two addresses and three
    /// 256-bit words.
    pub const ENCODED_LEN: usize = 20 + 20 + 32 + 32 + 32;

    /// Canonical serialization of `(from, to, amount, nonce, fee)`,
    /// fixed-width big-endian. The signature is excluded.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::ENCODED_LEN);
        out.extend_from_slice(self.from.as_slice());
        out.extend_from_slice(self.to.as_slice());
        out.extend_from_slice(&self.amount.to_be_bytes::<32>());
        out.extend_from_slice(&self.nonce.to_be_bytes::<32>());
        out.extend_from_slice(&self.fee.to_be_bytes::<32>());
        out
    }

    /// Decode a canonical serialization. The signature field comes back
    /// empty since it is not part of the encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, TransactionError> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(TransactionError::InvalidEncoding {
                expected: Self::ENCODED_LEN,
                got: bytes.len(),
            });
        }

        Ok(Self {
            from: Address::from_slice(&bytes[..20]),
            to: Address::from_slice(&bytes[20..40]),
            amount: U256::from_be_slice(&bytes[40..72]),
            nonce: U256::from_be_slice(&bytes[72..104]),
            fee: U256::from_be_slice(&bytes[104..136]),
            signature: Vec::new(),
        })
    }

    /// Merkle leaf committed into the batch root.
    pub fn merkle_leaf(&self) -> B256 {
        keccak256(self.encode())
    }

    /// Hash the signer commits to: the typed payload hash wrapped in the
    /// host's signed-message prefix.
    pub fn signing_hash(&self) -> B256 {
        let type_hash = keccak256(TRANSACTION_TYPE.as_bytes());

        let mut payload = Vec::with_capacity(32 + Self::ENCODED_LEN);
        payload.extend_from_slice(type_hash.as_slice());
        payload.extend_from_slice(self.from.as_slice());
        payload.extend_from_slice(self.to.as_slice());
        payload.extend_from_slice(&self.amount.to_be_bytes::<32>());
        payload.extend_from_slice(&self.nonce.to_be_bytes::<32>());
        payload.extend_from_slice(&self.fee.to_be_bytes::<32>());
        let inner = keccak256(&payload);

        let mut message = Vec::with_capacity(SIGNED_MESSAGE_PREFIX.len() + 32);
        message.extend_from_slice(SIGNED_MESSAGE_PREFIX);
        message.extend_from_slice(inner.as_slice());
        keccak256(&message)
    }

    /// Recover the purported signer from the attached signature.
    pub fn recover_signer(&self) -> Result<Address, TransactionError> {
        if self.signature.len() != 65 {
            return Err(TransactionError::InvalidSignatureLength(self.signature.len()));
        }

        let signature = Signature::from_slice(&self.signature[..64])
            .map_err(|_| TransactionError::MalformedSignature)?;

        let v = self.signature[64];
        let recovery_id = match v {
            0 | 27 => RecoveryId::from_byte(0),
            1 | 28 => RecoveryId::from_byte(1),
            _ => None,
        }
        .ok_or(TransactionError::InvalidRecoveryId(v))?;

        let key = VerifyingKey::recover_from_prehash(
            self.signing_hash().as_slice(),
            &signature,
            recovery_id,
        )
        .map_err(|_| TransactionError::RecoveryFailed)?;

        // Ethereum address: low 20 bytes of the keccak of the
        // uncompressed public key without its 0x04 tag.
        let encoded = key.to_encoded_point(false);
        let digest = keccak256(&encoded.as_bytes()[1..]);
        Ok(Address::from_slice(&digest.as_slice()[12..]))
    }

    /// A signature is valid exactly when it is 65 bytes, recovery
    /// succeeds, and the recovered signer is the non-zero `from` address.
    pub fn verify_signature(&self) -> bool {
        match self.recover_signer() {
            Ok(signer) => signer != Address::ZERO && signer == self.from,
            Err(_) => false,
        }
    }

    /// Structural validity checked before any state access: real
    /// endpoints, distinct endpoints, positive amount.
    pub fn is_well_formed(&self) -> bool {
        self.from != Address::ZERO
            && self.to != Address::ZERO
            && self.from != self.to
            && self.amount > U256::ZERO
    }
}

/// Outcome classification of a single transfer execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionResult {
    /// The transfer applied.
    Success,

    /// Sender balance below `amount + fee`.
    InsufficientBalance,

    /// Transaction nonce does not match the sender account nonce.
    InvalidNonce,

    /// Structurally invalid transaction.
    InvalidSignature,
}

/// Result of executing one transfer over an account pair. On any
/// non-`Success` result both accounts are returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Sender account after execution.
    pub from_account: Account,

    /// Recipient account after execution.
    pub to_account: Account,

    /// Classification of the execution.
    pub result: ExecutionResult,
}

impl ExecutionOutcome {
    fn unchanged(from_account: &Account, to_account: &Account, result: ExecutionResult) -> Self {
        Self {
            from_account: *from_account,
            to_account: *to_account,
            result,
        }
    }
}

/// Execute a single transfer over the sender and recipient accounts.
///
/// Checks run in order and the first failure decides the result:
/// structure, then nonce, then balance. Cryptographic signature
/// verification is a batch-boundary concern and is deliberately not part
/// of execution. All arithmetic is checked; an overflow on the credit
/// path is the host-level rejection `ArithmeticOverflow`.
pub fn execute_transfer(
    tx: &Transaction,
    from_account: &Account,
    to_account: &Account,
) -> Result<ExecutionOutcome, TransactionError> {
    if !tx.is_well_formed() {
        return Ok(ExecutionOutcome::unchanged(
            from_account,
            to_account,
            ExecutionResult::InvalidSignature,
        ));
    }

    if tx.nonce != from_account.nonce {
        return Ok(ExecutionOutcome::unchanged(
            from_account,
            to_account,
            ExecutionResult::InvalidNonce,
        ));
    }

    // A debit that does not even fit in 256 bits cannot be covered.
    let total_debit = match tx.amount.checked_add(tx.fee) {
        Some(total) => total,
        None => {
            return Ok(ExecutionOutcome::unchanged(
                from_account,
                to_account,
                ExecutionResult::InsufficientBalance,
            ))
        }
    };
    if from_account.balance < total_debit {
        return Ok(ExecutionOutcome::unchanged(
            from_account,
            to_account,
            ExecutionResult::InsufficientBalance,
        ));
    }

    let new_from = Account {
        balance: from_account
            .balance
            .checked_sub(total_debit)
            .ok_or(TransactionError::ArithmeticOverflow)?,
        nonce: from_account
            .nonce
            .checked_add(U256::from(1))
            .ok_or(TransactionError::ArithmeticOverflow)?,
    };
    let new_to = Account {
        balance: to_account
            .balance
            .checked_add(tx.amount)
            .ok_or(TransactionError::ArithmeticOverflow)?,
        nonce: to_account.nonce,
    };

    Ok(ExecutionOutcome {
        from_account: new_from,
        to_account: new_to,
        result: ExecutionResult::Success,
    })
}
