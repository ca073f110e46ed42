//! 交易构建
//!
//! 每条链一个构建器：先产出待签名的哈希（或消息），
//! 再用外部签名器返回的签名组装成可广播的载荷。
//! 同一交易与同一快照多次构建，得到的字节完全相同。

pub mod casper;
pub mod ethereum;
pub mod utxo;
pub mod xrp;

use crate::crypto::Signature;
use crate::domain::{AmountType, Blockchain, FeeParameters, SignedTransaction, Transaction};
use crate::error::{Result, WalletError};

pub use casper::CasperTransactionBuilder;
pub use ethereum::EthereumTransactionBuilder;
pub use utxo::UtxoTransactionBuilder;
pub use xrp::XrpTransactionBuilder;

/// 链交易构建器
pub trait TransactionBuilder: Send + Sync {
    /// 序列化后的字节数（UTXO 链为虚拟字节数）
    fn estimate_size(&self, transaction: &Transaction) -> Result<usize>;

    /// 待签名数据，每个签名一项
    fn build_for_sign(&self, transaction: &Transaction) -> Result<Vec<Vec<u8>>>;

    /// 用签名组装最终载荷
    fn build_for_send(
        &self,
        transaction: &Transaction,
        signatures: &[Signature],
    ) -> Result<SignedTransaction>;
}

/// 金额与手续费必须属于本链
pub(crate) fn ensure_blockchain(transaction: &Transaction, blockchain: Blockchain) -> Result<()> {
    if transaction.amount.blockchain != blockchain || transaction.fee.amount.blockchain != blockchain
    {
        return Err(WalletError::AmountMismatch(format!(
            "transaction amounts must be on {}",
            blockchain
        )));
    }
    if transaction.fee.amount.amount_type != AmountType::Coin {
        return Err(WalletError::invalid_transaction("fee must be paid in coin"));
    }
    Ok(())
}

pub(crate) fn ensure_signature_count(expected: usize, signatures: &[Signature]) -> Result<()> {
    if signatures.len() != expected {
        return Err(WalletError::SignatureCountMismatch {
            expected,
            actual: signatures.len(),
        });
    }
    Ok(())
}

pub(crate) fn missing_fee(blockchain: Blockchain, expected: &'static str) -> WalletError {
    WalletError::MissingFeeParameters {
        blockchain: blockchain.display_name(),
        expected,
    }
}

pub(crate) fn to_u64(value: u128, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| WalletError::InvalidAmount(format!("{} {} overflows", what, value)))
}

/// 仅用于诊断日志
pub(crate) fn fee_kind(parameters: &FeeParameters) -> &'static str {
    match parameters {
        FeeParameters::None => "none",
        FeeParameters::Utxo { .. } => "utxo",
        FeeParameters::EthereumLegacy { .. } => "ethereum_legacy",
        FeeParameters::EthereumEip1559 { .. } => "ethereum_eip1559",
        FeeParameters::Xrp { .. } => "xrp",
        FeeParameters::Casper { .. } => "casper",
    }
}
