//! 区块链标识
//!
//! 每条链对应唯一的默认曲线和一个对外 API 使用的网络 ID。

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::crypto::EllipticCurve;
use crate::domain::AddressType;
use crate::error::{Result, WalletError};

/// 支持的区块链
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "network", rename_all = "snake_case")]
pub enum Blockchain {
    Bitcoin { testnet: bool },
    Litecoin,
    Dogecoin,
    Dash { testnet: bool },
    Ravencoin { testnet: bool },
    Ethereum { testnet: bool },
    Bsc { testnet: bool },
    Polygon { testnet: bool },
    Decimal { testnet: bool },
    Xrp { curve: EllipticCurve },
    Casper { curve: EllipticCurve, testnet: bool },
    Kaspa { testnet: bool },
    Alephium { testnet: bool },
    Cosmos { testnet: bool },
    Koinos { testnet: bool },
}

/// 地址类型策略：默认展示类型与可选的其他类型，由链显式声明
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPolicy {
    pub default_type: AddressType,
    pub alternates: &'static [AddressType],
}

impl AddressPolicy {
    const SINGLE: AddressPolicy = AddressPolicy {
        default_type: AddressType::Default,
        alternates: &[],
    };

    pub fn all_types(&self) -> Vec<AddressType> {
        std::iter::once(self.default_type)
            .chain(self.alternates.iter().copied())
            .collect()
    }
}

impl Blockchain {
    /// 全部规范网络 ID
    pub const NETWORK_IDS: &'static [&'static str] = &[
        "bitcoin",
        "litecoin",
        "dogecoin",
        "dash",
        "ravencoin",
        "ethereum",
        "bsc",
        "polygon",
        "decimal",
        "xrp",
        "casper-network",
        "kaspa",
        "alephium",
        "cosmos-hub",
        "koinos",
    ];

    /// 节点配置使用的键（主网 ID 与 `-testnet` 变体）
    pub fn all_network_keys() -> Vec<String> {
        Self::NETWORK_IDS
            .iter()
            .flat_map(|id| [id.to_string(), format!("{}-testnet", id)])
            .collect()
    }

    /// 由网络 ID 构造；XRP 与 Casper 需要曲线，缺省为 secp256k1
    pub fn from_network_id(
        network_id: &str,
        testnet: bool,
        curve: Option<EllipticCurve>,
    ) -> Result<Self> {
        let curve = curve.unwrap_or(EllipticCurve::Secp256k1);
        let chain = match network_id {
            "bitcoin" => Self::Bitcoin { testnet },
            "litecoin" => Self::Litecoin,
            "dogecoin" => Self::Dogecoin,
            "dash" => Self::Dash { testnet },
            "ravencoin" => Self::Ravencoin { testnet },
            "ethereum" => Self::Ethereum { testnet },
            "bsc" => Self::Bsc { testnet },
            "polygon" | "matic" => Self::Polygon { testnet },
            "decimal" => Self::Decimal { testnet },
            "xrp" => Self::Xrp { curve },
            "casper-network" => Self::Casper { curve, testnet },
            "kaspa" => Self::Kaspa { testnet },
            "alephium" => Self::Alephium { testnet },
            "cosmos-hub" => Self::Cosmos { testnet },
            "koinos" => Self::Koinos { testnet },
            other => return Err(WalletError::UnsupportedBlockchain(other.to_string())),
        };
        if !chain.supported_curves().contains(&curve)
            && matches!(chain, Self::Xrp { .. } | Self::Casper { .. })
        {
            return Err(WalletError::CurveMismatch {
                expected: chain.supported_curves().to_vec(),
                actual: curve,
            });
        }
        Ok(chain)
    }

    /// 对外 API 使用的规范网络 ID
    pub fn network_id(&self) -> &'static str {
        match self {
            Self::Bitcoin { .. } => "bitcoin",
            Self::Litecoin => "litecoin",
            Self::Dogecoin => "dogecoin",
            Self::Dash { .. } => "dash",
            Self::Ravencoin { .. } => "ravencoin",
            Self::Ethereum { .. } => "ethereum",
            Self::Bsc { .. } => "bsc",
            Self::Polygon { .. } => "polygon",
            Self::Decimal { .. } => "decimal",
            Self::Xrp { .. } => "xrp",
            Self::Casper { .. } => "casper-network",
            Self::Kaspa { .. } => "kaspa",
            Self::Alephium { .. } => "alephium",
            Self::Cosmos { .. } => "cosmos-hub",
            Self::Koinos { .. } => "koinos",
        }
    }

    pub fn display_name(&self) -> String {
        let name = match self {
            Self::Bitcoin { .. } => "Bitcoin",
            Self::Litecoin => "Litecoin",
            Self::Dogecoin => "Dogecoin",
            Self::Dash { .. } => "Dash",
            Self::Ravencoin { .. } => "Ravencoin",
            Self::Ethereum { .. } => "Ethereum",
            Self::Bsc { .. } => "BNB Smart Chain",
            Self::Polygon { .. } => "Polygon",
            Self::Decimal { .. } => "Decimal Smart Chain",
            Self::Xrp { .. } => "XRP Ledger",
            Self::Casper { .. } => "Casper",
            Self::Kaspa { .. } => "Kaspa",
            Self::Alephium { .. } => "Alephium",
            Self::Cosmos { .. } => "Cosmos",
            Self::Koinos { .. } => "Koinos",
        };
        if self.is_testnet() {
            format!("{} Testnet", name)
        } else {
            name.to_string()
        }
    }

    pub fn currency_symbol(&self) -> &'static str {
        match self {
            Self::Bitcoin { .. } => "BTC",
            Self::Litecoin => "LTC",
            Self::Dogecoin => "DOGE",
            Self::Dash { .. } => "DASH",
            Self::Ravencoin { .. } => "RVN",
            Self::Ethereum { .. } => "ETH",
            Self::Bsc { .. } => "BNB",
            Self::Polygon { .. } => "POL",
            Self::Decimal { .. } => "DEL",
            Self::Xrp { .. } => "XRP",
            Self::Casper { .. } => "CSPR",
            Self::Kaspa { .. } => "KAS",
            Self::Alephium { .. } => "ALPH",
            Self::Cosmos { .. } => "ATOM",
            Self::Koinos { .. } => "KOIN",
        }
    }

    /// 原生币小数位
    pub fn decimal_count(&self) -> u32 {
        match self {
            Self::Bitcoin { .. }
            | Self::Litecoin
            | Self::Dogecoin
            | Self::Dash { .. }
            | Self::Ravencoin { .. }
            | Self::Kaspa { .. }
            | Self::Koinos { .. } => 8,
            Self::Ethereum { .. }
            | Self::Bsc { .. }
            | Self::Polygon { .. }
            | Self::Decimal { .. }
            | Self::Alephium { .. } => 18,
            Self::Xrp { .. } | Self::Cosmos { .. } => 6,
            Self::Casper { .. } => 9,
        }
    }

    /// 10^decimal_count
    pub fn decimal_value(&self) -> Decimal {
        Decimal::from(10u64.pow(self.decimal_count()))
    }

    /// 默认曲线
    pub fn curve(&self) -> EllipticCurve {
        match self {
            Self::Xrp { curve } | Self::Casper { curve, .. } => *curve,
            _ => EllipticCurve::Secp256k1,
        }
    }

    /// 该链地址派生接受的曲线
    pub fn supported_curves(&self) -> &'static [EllipticCurve] {
        match self {
            Self::Xrp { .. } | Self::Casper { .. } => {
                &[EllipticCurve::Secp256k1, EllipticCurve::Ed25519]
            }
            _ => &[EllipticCurve::Secp256k1],
        }
    }

    pub fn is_testnet(&self) -> bool {
        match self {
            Self::Bitcoin { testnet }
            | Self::Dash { testnet }
            | Self::Ravencoin { testnet }
            | Self::Ethereum { testnet }
            | Self::Bsc { testnet }
            | Self::Polygon { testnet }
            | Self::Decimal { testnet }
            | Self::Casper { testnet, .. }
            | Self::Kaspa { testnet }
            | Self::Alephium { testnet }
            | Self::Cosmos { testnet }
            | Self::Koinos { testnet } => *testnet,
            Self::Litecoin | Self::Dogecoin | Self::Xrp { .. } => false,
        }
    }

    /// UTXO 模型链
    pub fn is_utxo(&self) -> bool {
        matches!(
            self,
            Self::Bitcoin { .. }
                | Self::Litecoin
                | Self::Dogecoin
                | Self::Dash { .. }
                | Self::Ravencoin { .. }
                | Self::Kaspa { .. }
        )
    }

    pub fn is_evm(&self) -> bool {
        self.evm_chain_id().is_some()
    }

    /// 是否提供多个费用档位供用户选择
    pub fn supports_fee_selection(&self) -> bool {
        !matches!(
            self,
            Self::Casper { .. } | Self::Koinos { .. } | Self::Alephium { .. }
        )
    }

    /// 是否支持备注（Casper transfer id、Cosmos memo）
    pub fn supports_memo(&self) -> bool {
        matches!(self, Self::Casper { .. } | Self::Cosmos { .. })
    }

    pub fn supports_destination_tag(&self) -> bool {
        matches!(self, Self::Xrp { .. })
    }

    /// EIP-155 chain id
    pub fn evm_chain_id(&self) -> Option<u64> {
        match self {
            Self::Ethereum { testnet } => Some(if *testnet { 11155111 } else { 1 }),
            Self::Bsc { testnet } => Some(if *testnet { 97 } else { 56 }),
            Self::Polygon { testnet } => Some(if *testnet { 80002 } else { 137 }),
            Self::Decimal { testnet } => Some(if *testnet { 202020 } else { 75 }),
            _ => None,
        }
    }

    /// 是否使用 EIP-1559 费用模型
    pub fn supports_eip1559(&self) -> bool {
        matches!(
            self,
            Self::Ethereum { .. } | Self::Bsc { .. } | Self::Polygon { .. } | Self::Decimal { .. }
        )
    }

    /// 地址类型策略
    pub fn address_policy(&self) -> AddressPolicy {
        match self {
            Self::Bitcoin { .. } | Self::Litecoin => AddressPolicy {
                default_type: AddressType::Default,
                alternates: &[AddressType::Legacy],
            },
            _ => AddressPolicy::SINGLE,
        }
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}
