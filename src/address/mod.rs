//! 地址层
//!
//! 每条链一个 `AddressService` 实现：公钥 → 地址（纯函数），以及独立于公钥的地址校验。

pub mod alephium;
pub mod bitcoin;
pub mod casper;
pub mod cosmos;
pub mod decimal;
pub mod ethereum;
pub mod kaspa;
pub mod koinos;
pub mod xrp;

use std::sync::Arc;

pub use crate::domain::{Address, AddressType};

use crate::crypto::PublicKey;
use crate::domain::Blockchain;
use crate::error::{Result, WalletError};

pub use self::alephium::AlephiumAddressService;
pub use self::bitcoin::{BitcoinAddressService, NetworkParams, ScriptType};
pub use self::casper::CasperAddressService;
pub use self::cosmos::CosmosAddressService;
pub use self::decimal::{DecimalAddressConverter, DecimalAddressService};
pub use self::ethereum::EthereumAddressService;
pub use self::kaspa::KaspaAddressService;
pub use self::koinos::KoinosAddressService;
pub use self::xrp::XrpAddressService;

/// 地址派生与校验
pub trait AddressService: Send + Sync {
    /// 由公钥派生指定类型的地址；曲线不符时返回错误
    fn make_address(&self, public_key: &PublicKey, address_type: AddressType) -> Result<Address>;

    /// 校验地址字符串；格式错误一律返回 false
    fn validate(&self, address: &str) -> bool;

    /// 支持的地址类型，第一个为默认类型
    fn supported_types(&self) -> Vec<AddressType> {
        vec![AddressType::Default]
    }

    /// 派生所有支持类型的地址
    fn make_addresses(&self, public_key: &PublicKey) -> Result<Vec<Address>> {
        self.supported_types()
            .into_iter()
            .map(|address_type| self.make_address(public_key, address_type))
            .collect()
    }
}

/// 单一地址类型的链拒绝其他类型
pub(crate) fn ensure_default_type(chain: &str, address_type: AddressType) -> Result<()> {
    match address_type {
        AddressType::Default => Ok(()),
        other => Err(WalletError::UnsupportedAddressType {
            blockchain: chain.to_string(),
            address_type: other.to_string(),
        }),
    }
}

/// 按链选择地址服务
pub struct AddressServiceFactory;

impl AddressServiceFactory {
    pub fn make(blockchain: Blockchain) -> Result<Arc<dyn AddressService>> {
        let service: Arc<dyn AddressService> = match blockchain {
            Blockchain::Bitcoin { .. }
            | Blockchain::Litecoin
            | Blockchain::Dogecoin
            | Blockchain::Dash { .. }
            | Blockchain::Ravencoin { .. } => {
                let params = NetworkParams::for_blockchain(blockchain).ok_or_else(|| {
                    WalletError::UnsupportedBlockchain(blockchain.display_name())
                })?;
                Arc::new(BitcoinAddressService::new(params))
            }
            Blockchain::Ethereum { .. } | Blockchain::Bsc { .. } | Blockchain::Polygon { .. } => {
                Arc::new(EthereumAddressService)
            }
            Blockchain::Decimal { .. } => Arc::new(DecimalAddressService),
            Blockchain::Xrp { .. } => Arc::new(XrpAddressService),
            Blockchain::Casper { .. } => Arc::new(CasperAddressService),
            Blockchain::Kaspa { testnet } => Arc::new(KaspaAddressService::new(testnet)),
            Blockchain::Alephium { .. } => Arc::new(AlephiumAddressService),
            Blockchain::Cosmos { .. } => Arc::new(CosmosAddressService::cosmos_hub()),
            Blockchain::Koinos { .. } => Arc::new(KoinosAddressService),
        };
        Ok(service)
    }
}
