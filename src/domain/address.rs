use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;

/// 地址类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    /// 链声明的默认类型（比特币为 segwit）
    Default,
    /// 旧格式（比特币 P2PKH）
    Legacy,
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}

/// 派生出的地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub value: String,
    pub address_type: AddressType,
    /// 生成该地址的公钥
    pub public_key: PublicKey,
    /// 锁定脚本（UTXO 链与 Koinos）
    pub locking_script: Option<Vec<u8>>,
}

impl Address {
    pub fn new(value: impl Into<String>, address_type: AddressType, public_key: PublicKey) -> Self {
        Self {
            value: value.into(),
            address_type,
            public_key,
            locking_script: None,
        }
    }

    pub fn with_locking_script(mut self, script: Vec<u8>) -> Self {
        self.locking_script = Some(script);
        self
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
