//! 手续费
//!
//! `Fee` = 金额 + 链特定参数。参数由钱包管理器的 get_fee 产生，TransactionBuilder 只读使用。

use serde::{Deserialize, Serialize};

use crate::domain::Amount;

/// 链特定的手续费参数，对通用层不透明
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeParameters {
    /// 无额外参数（固定手续费的链）
    None,
    /// UTXO 链：按字节计费
    Utxo { sat_per_byte: u64 },
    /// EVM 旧费用模型
    EthereumLegacy { gas_limit: u64, gas_price: u128 },
    /// EVM EIP-1559
    EthereumEip1559 {
        gas_limit: u64,
        max_fee_per_gas: u128,
        priority_fee: u128,
    },
    Xrp { drops: u64 },
    Casper { motes: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Amount,
    pub parameters: FeeParameters,
}

impl Fee {
    pub fn new(amount: Amount, parameters: FeeParameters) -> Self {
        Self { amount, parameters }
    }

    pub fn simple(amount: Amount) -> Self {
        Self::new(amount, FeeParameters::None)
    }

    /// 慢 → 快 档位的费用不递减
    pub fn is_non_decreasing(tiers: &[Fee]) -> bool {
        tiers
            .windows(2)
            .all(|pair| pair[0].amount.value <= pair[1].amount.value)
    }

    /// 按金额升序排列档位（稳定排序）
    pub fn sort_tiers(tiers: &mut [Fee]) {
        tiers.sort_by(|a, b| a.amount.value.cmp(&b.amount.value));
    }
}
