//! Protocol constants and settlement configuration.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Bond an operator must escrow with every rollup block submission,
/// in wei. One whole native unit.
pub const OPERATOR_BOND: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Number of host blocks after submission during which a rollup block
/// may be challenged. Roughly seven days at 12-second blocks.
pub const CHALLENGE_PERIOD_BLOCKS: u64 = 50_400;

/// Tunable settlement parameters.
///
/// The defaults reproduce the protocol constants; deployments override
/// them through any serde front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Minimum value an operator must attach to `submit_rollup_block`.
    #[serde(default = "default_operator_bond")]
    pub operator_bond: U256,

    /// Length of the challenge window, in host blocks.
    #[serde(default = "default_challenge_period")]
    pub challenge_period_blocks: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            operator_bond: OPERATOR_BOND,
            challenge_period_blocks: CHALLENGE_PERIOD_BLOCKS,
        }
    }
}

fn default_operator_bond() -> U256 {
    OPERATOR_BOND
}

fn default_challenge_period() -> u64 {
    CHALLENGE_PERIOD_BLOCKS
}
