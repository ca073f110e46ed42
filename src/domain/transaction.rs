//! 交易意图与广播载荷
//!
//! `Transaction` 创建后不再修改；重新构建意味着构造新的值。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, Fee};

/// 链特定的交易参数
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionParams {
    #[default]
    None,
    Utxo {
        /// 非零时启用时间锁，输入 sequence 置为 0xFFFFFFFE
        lock_time: u32,
    },
    Ethereum {
        /// 为空时由钱包管理器用最近一次 update 的 nonce 绑定
        nonce: Option<u64>,
        /// 自定义 calldata（代币转账由构建器生成，无需填写）
        data: Option<Vec<u8>>,
    },
    Xrp {
        destination_tag: Option<u32>,
        /// 为空时由钱包管理器绑定
        sequence: Option<u32>,
    },
    Casper {
        /// 部署时间戳（毫秒）
        timestamp_ms: u64,
        transfer_id: Option<u64>,
    },
}

/// 未签名交易意图
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: Amount,
    pub fee: Fee,
    pub source_address: String,
    pub destination_address: String,
    /// UTXO 找零地址，缺省同源地址
    pub change_address: String,
    pub params: TransactionParams,
}

impl Transaction {
    pub fn new(
        amount: Amount,
        fee: Fee,
        source_address: impl Into<String>,
        destination_address: impl Into<String>,
    ) -> Self {
        let source_address = source_address.into();
        Self {
            amount,
            fee,
            change_address: source_address.clone(),
            source_address,
            destination_address: destination_address.into(),
            params: TransactionParams::None,
        }
    }

    pub fn with_params(mut self, params: TransactionParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_change_address(mut self, change_address: impl Into<String>) -> Self {
        self.change_address = change_address.into();
        self
    }
}

/// 已签名、可广播的载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub payload: Vec<u8>,
    /// 对应的交易意图，用于状态追踪
    pub transaction: Transaction,
}

impl SignedTransaction {
    pub fn new(payload: Vec<u8>, transaction: Transaction) -> Self {
        Self {
            payload,
            transaction,
        }
    }

    pub fn payload_hex(&self) -> String {
        hex::encode(&self.payload)
    }
}

/// 广播结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub hash: String,
    pub signed: SignedTransaction,
}

/// 广播后、确认前的交易
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: String,
    pub source: String,
    pub destination: String,
    pub value: Amount,
    pub fee: Option<Amount>,
    pub date: DateTime<Utc>,
    pub is_incoming: bool,
    pub params: TransactionParams,
}

impl PendingTransaction {
    /// 本地广播成功后记录
    pub fn outgoing(hash: impl Into<String>, transaction: &Transaction) -> Self {
        Self {
            hash: hash.into(),
            source: transaction.source_address.clone(),
            destination: transaction.destination_address.clone(),
            value: transaction.amount.clone(),
            fee: Some(transaction.fee.amount.clone()),
            date: Utc::now(),
            is_incoming: false,
            params: transaction.params.clone(),
        }
    }
}
