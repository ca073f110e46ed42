//! Domain 模块
//!
//! 链标识、金额、手续费、交易意图等值类型

pub mod address;
pub mod amount;
pub mod blockchain;
pub mod fee;
pub mod transaction;

// 重新导出常用类型
pub use address::{Address, AddressType};
pub use amount::{Amount, AmountType, Token};
pub use blockchain::{AddressPolicy, Blockchain};
pub use fee::{Fee, FeeParameters};
pub use transaction::{
    PendingTransaction, SendResult, SignedTransaction, Transaction, TransactionParams,
};
