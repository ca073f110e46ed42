//! Decimal Smart Chain 地址
//!
//! 与 EVM 地址共用 20 字节，展示形式为 bech32("d0", bytes)。

use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32, Hrp};

use crate::address::ethereum::{EthereumAddressService, EVM_ADDRESS_LEN};
use crate::address::{ensure_default_type, Address, AddressService, AddressType};
use crate::crypto::PublicKey;
use crate::error::{Result, WalletError};

const DECIMAL_HRP: &str = "d0";

/// 0x 地址与 d0 地址之间的无损互转
pub struct DecimalAddressConverter;

impl DecimalAddressConverter {
    fn hrp() -> Result<Hrp> {
        Hrp::parse(DECIMAL_HRP).map_err(|e| WalletError::InvalidEncoding(e.to_string()))
    }

    pub fn encode(bytes: &[u8; EVM_ADDRESS_LEN]) -> Result<String> {
        bech32::encode::<Bech32>(Self::hrp()?, bytes)
            .map_err(|e| WalletError::InvalidEncoding(e.to_string()))
    }

    pub fn decode(address: &str) -> Option<[u8; EVM_ADDRESS_LEN]> {
        let checked = CheckedHrpstring::new::<Bech32>(address).ok()?;
        if checked.hrp().to_lowercase() != DECIMAL_HRP {
            return None;
        }
        checked.byte_iter().collect::<Vec<u8>>().try_into().ok()
    }

    /// 0x 地址 → d0 地址
    pub fn to_decimal(address: &str) -> Result<String> {
        if Self::decode(address).is_some() {
            return Ok(address.to_lowercase());
        }
        let bytes = EthereumAddressService::parse(address)
            .ok_or_else(|| WalletError::invalid_address(address))?;
        Self::encode(&bytes)
    }

    /// d0 地址 → 0x 地址（小写）
    pub fn to_evm(address: &str) -> Result<String> {
        if let Some(bytes) = EthereumAddressService::parse(address) {
            return Ok(format!("0x{}", hex::encode(bytes)));
        }
        let bytes = Self::decode(address).ok_or_else(|| WalletError::invalid_address(address))?;
        Ok(format!("0x{}", hex::encode(bytes)))
    }
}

pub struct DecimalAddressService;

impl AddressService for DecimalAddressService {
    fn make_address(&self, public_key: &PublicKey, address_type: AddressType) -> Result<Address> {
        ensure_default_type("Decimal", address_type)?;
        let bytes = EthereumAddressService::address_bytes(public_key)?;
        Ok(Address::new(
            DecimalAddressConverter::encode(&bytes)?,
            AddressType::Default,
            public_key.clone(),
        ))
    }

    fn validate(&self, address: &str) -> bool {
        EthereumAddressService::parse(address).is_some()
            || DecimalAddressConverter::decode(address).is_some()
    }
}
