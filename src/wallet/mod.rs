//! 钱包管理层
//!
//! [`WalletManager`] 组合地址服务、交易构建器与节点 Provider，
//! 对外提供刷新、估费与发送。每条链的差异集中在 [`ChainAdapter`] 中，
//! [`WalletManagerFactory`] 通过注册表选择实现。

pub mod adapters;
pub mod factory;
pub mod manager;
pub mod registry;
pub mod state;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use factory::{ChainRegistration, FactoryContext, WalletManagerFactory};
pub use manager::{ChainAdapter, ChainSnapshot, ChainWalletManager};
pub use registry::{WalletId, WalletRegistry};
pub use state::{SendState, UpdateState};

use crate::crypto::{PublicKey, Signature};
use crate::domain::{
    Address, Amount, AmountType, Blockchain, Fee, PendingTransaction, SendResult, Token,
    Transaction, TransactionParams,
};
use crate::error::Result;

/// 外部签名器（硬件或安全芯片），可能很慢，也可能被用户取消
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// 对每个哈希签名，返回顺序与输入一致
    async fn sign(&self, hashes: &[Vec<u8>], public_key: &PublicKey) -> Result<Vec<Signature>>;
}

/// 一次刷新的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// 结果已写入钱包快照
    Applied,
    /// 期间有更新的刷新请求，本次结果被丢弃
    Superseded,
}

/// 钱包快照
#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    pub blockchain: Blockchain,
    /// 第一个为默认地址
    pub addresses: Vec<Address>,
    pub amounts: HashMap<AmountType, Amount>,
    pub pending_transactions: Vec<PendingTransaction>,
    pub tokens: Vec<Token>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Wallet {
    pub fn new(blockchain: Blockchain, addresses: Vec<Address>) -> Self {
        Self {
            blockchain,
            addresses,
            amounts: HashMap::new(),
            pending_transactions: Vec::new(),
            tokens: Vec::new(),
            last_updated: None,
        }
    }

    /// 默认地址
    pub fn address(&self) -> &str {
        self.addresses.first().map_or("", |a| a.value.as_str())
    }

    pub fn owns_address(&self, address: &str) -> bool {
        self.addresses.iter().any(|a| a.value == address)
    }

    pub fn amount(&self, amount_type: &AmountType) -> Option<&Amount> {
        self.amounts.get(amount_type)
    }

    /// 主币余额；未刷新过时为 None
    pub fn balance(&self) -> Option<&Amount> {
        self.amount(&AmountType::Coin)
    }

    pub fn has_pending_outgoing(&self) -> bool {
        self.pending_transactions.iter().any(|tx| !tx.is_incoming)
    }
}

#[async_trait]
pub trait WalletManager: Send + Sync {
    fn blockchain(&self) -> Blockchain;

    fn public_key(&self) -> &PublicKey;

    /// 默认地址
    fn address(&self) -> String;

    async fn wallet_snapshot(&self) -> Wallet;

    async fn update_state(&self) -> UpdateState;

    async fn send_state(&self) -> SendState;

    /// 刷新余额、待确认交易与链状态
    async fn update(&self) -> Result<UpdateOutcome>;

    /// 费用档位，慢 → 快
    async fn get_fee(&self, amount: &Amount, destination: &str) -> Result<Vec<Fee>>;

    /// 以默认地址为来源和找零地址构造交易；`params` 缺省时使用链的默认参数
    async fn make_transaction(
        &self,
        amount: Amount,
        fee: Fee,
        destination: &str,
        params: Option<TransactionParams>,
    ) -> Result<Transaction>;

    async fn send(
        &self,
        transaction: Transaction,
        signer: &dyn TransactionSigner,
    ) -> Result<SendResult>;

    fn validate_address(&self, address: &str) -> bool;

    /// 关注一个代币，下次刷新时查询余额
    async fn add_token(&self, token: Token);
}
