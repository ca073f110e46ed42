//! EVM 地址（Ethereum, BSC, Polygon）
//!
//! Keccak-256(非压缩公钥去掉 0x04 前缀) 的后 20 字节，EIP-55 大小写校验和。

use crate::address::{ensure_default_type, Address, AddressService, AddressType};
use crate::crypto::{hash::keccak256, EllipticCurve, PublicKey};
use crate::error::Result;

pub const EVM_ADDRESS_LEN: usize = 20;

pub struct EthereumAddressService;

impl EthereumAddressService {
    /// 公钥 → 20 字节地址
    pub fn address_bytes(public_key: &PublicKey) -> Result<[u8; EVM_ADDRESS_LEN]> {
        public_key.require_curve(&[EllipticCurve::Secp256k1])?;
        let uncompressed = public_key.decompressed()?;
        let hash = keccak256(&uncompressed[1..]);
        let mut out = [0u8; EVM_ADDRESS_LEN];
        out.copy_from_slice(&hash[12..]);
        Ok(out)
    }

    /// EIP-55 校验和地址
    /// https://eips.ethereum.org/EIPS/eip-55
    pub fn to_checksum_address(bytes: &[u8; EVM_ADDRESS_LEN]) -> String {
        let lower = hex::encode(bytes);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, ch) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if ch.is_ascii_alphabetic() && nibble >= 8 {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// 校验并解析地址；全小写/全大写不做校验和检查，混合大小写必须符合 EIP-55
    pub fn parse(address: &str) -> Option<[u8; EVM_ADDRESS_LEN]> {
        let hex_part = address.strip_prefix("0x")?;
        if hex_part.len() != EVM_ADDRESS_LEN * 2 || !hex_part.chars().all(|c| c.is_ascii_hexdigit())
        {
            return None;
        }
        let mut bytes = [0u8; EVM_ADDRESS_LEN];
        hex::decode_to_slice(hex_part, &mut bytes).ok()?;

        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower && Self::to_checksum_address(&bytes) != address {
            return None;
        }
        Some(bytes)
    }
}

impl AddressService for EthereumAddressService {
    fn make_address(&self, public_key: &PublicKey, address_type: AddressType) -> Result<Address> {
        ensure_default_type("Ethereum", address_type)?;
        let bytes = Self::address_bytes(public_key)?;
        Ok(Address::new(
            Self::to_checksum_address(&bytes),
            AddressType::Default,
            public_key.clone(),
        ))
    }

    fn validate(&self, address: &str) -> bool {
        Self::parse(address).is_some()
    }
}
