use crate::{constants::GWEI_TO_WEI, serde_helper::u64_hex};
use alloy_primitives::{Address, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

/// Withdrawal represents a validator withdrawal from the consensus layer.
#[derive(
    Debug, Clone, PartialEq, Eq, Default, Hash, RlpEncodable, RlpDecodable, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    /// Monotonically increasing identifier issued by consensus layer.
    #[serde(with = "u64_hex")]
    pub index: u64,
    /// Index of validator associated with withdrawal.
    #[serde(with = "u64_hex")]
    pub validator_index: u64,
    /// Target address for withdrawn ether.
    pub address: Address,
    /// Value of the withdrawal in gwei.
    #[serde(with = "u64_hex")]
    pub amount: u64,
}

impl Withdrawal {
    /// Return the withdrawal amount in wei.
    pub fn amount_wei(&self) -> U256 {
        U256::from(self.amount) * U256::from(GWEI_TO_WEI)
    }
}
