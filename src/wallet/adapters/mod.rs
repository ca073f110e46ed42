//! 各链的 [`ChainAdapter`](crate::wallet::ChainAdapter) 实现
//!
//! 每个模块提供一个 `registration()`，由工厂登记。

pub mod casper;
pub mod ethereum;
pub mod utxo;
pub mod xrp;

pub use casper::CasperAdapter;
pub use ethereum::{EthereumAdapter, EthereumState};
pub use utxo::{UtxoAdapter, UtxoState};
pub use xrp::{XrpAdapter, XrpState};

use std::sync::Arc;

use crate::domain::Blockchain;
use crate::error::Result;
use crate::network::{HostFallback, NetworkProvider};
use crate::wallet::FactoryContext;

/// 为配置中的每个节点创建 Provider
pub(crate) fn providers_for<P, F>(
    context: &FactoryContext,
    blockchain: Blockchain,
    make: F,
) -> Result<HostFallback<P>>
where
    P: NetworkProvider + ?Sized,
    F: Fn(&str) -> Arc<P>,
{
    let hosts = context.hosts(blockchain)?;
    HostFallback::new(
        crate::config::HostsConfig::key_for(&blockchain),
        hosts.iter().map(|host| make(host.as_str())).collect(),
    )
}
