//! UTXO 链交易（Bitcoin, Litecoin, Dogecoin, Dash, Ravencoin）

pub mod builder;
pub mod selection;

use bitcoin::hashes::Hash as _;
use bitcoin::{OutPoint, Txid};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WalletError};

pub use builder::UtxoTransactionBuilder;
pub use selection::{FeeMode, PreImage, SizeCalculator};

/// 未花费输出
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnspentOutput {
    /// 交易哈希（内部字节序，即展示用十六进制的逆序）
    pub tx_hash: [u8; 32],
    pub index: u32,
    /// satoshi
    pub amount: u64,
    /// 输出锁定脚本
    pub script: Vec<u8>,
}

impl UnspentOutput {
    /// `tx_id` 为区块浏览器展示的十六进制
    pub fn new(tx_id: &str, index: u32, amount: u64, script: Vec<u8>) -> Result<Self> {
        let mut tx_hash: [u8; 32] = hex::decode(tx_id)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| WalletError::invalid_transaction(format!("bad tx id {}", tx_id)))?;
        tx_hash.reverse();
        Ok(Self {
            tx_hash,
            index,
            amount,
            script,
        })
    }

    pub fn tx_id(&self) -> String {
        let mut display = self.tx_hash;
        display.reverse();
        hex::encode(display)
    }

    pub(crate) fn outpoint(&self) -> OutPoint {
        OutPoint::new(Txid::from_byte_array(self.tx_hash), self.index)
    }
}
