//! IronCore Chains - 多链钱包抽象层
//!
//! 只处理公钥与签名：地址派生、交易构建、费用估算与广播。
//! 私钥由外部签名器持有，本库不接触。

pub mod address;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod logging;
pub mod network;
pub mod transaction;
pub mod wallet;

// 重新导出常用类型
pub use error::{ErrorCategory, NetworkError, Result, WalletError};

// 统一模块导出
pub mod prelude {
    pub use crate::{
        address::{Address, AddressService, AddressServiceFactory, AddressType},
        config::SdkConfig,
        crypto::{EllipticCurve, PublicKey, Signature},
        domain::{
            Amount, AmountType, Blockchain, Fee, FeeParameters, SignedTransaction, Transaction,
            TransactionParams,
        },
        error::{ErrorCategory, NetworkError, Result, WalletError},
        transaction::TransactionBuilder,
        wallet::{TransactionSigner, WalletManager, WalletManagerFactory, WalletRegistry},
    };
}
