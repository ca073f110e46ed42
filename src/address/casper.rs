//! Casper 地址（CEP-57 校验和十六进制）
//!
//! 地址 = 曲线标签（01 ed25519 / 02 secp256k1）+ 公钥的校验和十六进制。
//! 校验和：对公钥字节做 blake2b-256，按字节内低位优先循环取比特，
//! 每遇到一个字母 nibble 消耗一个比特，比特为 1 时大写。

use crate::address::{ensure_default_type, Address, AddressService, AddressType};
use crate::crypto::{
    hash::blake2b_256,
    public_key::{ED25519_KEY_LEN, SECP256K1_COMPRESSED_LEN},
    EllipticCurve, PublicKey,
};
use crate::error::{Result, WalletError};

pub const ED25519_TAG: u8 = 0x01;
pub const SECP256K1_TAG: u8 = 0x02;

const HEX_CHARS: &[u8; 22] = b"0123456789abcdefABCDEF";

/// 按 CEP-57 对字节做大小写校验和编码
pub fn checksummed_hex(bytes: &[u8]) -> String {
    let hash = blake2b_256(bytes);
    let mut bits = hash
        .iter()
        .flat_map(|byte| (0..8).map(move |i| (byte >> i) & 1 == 1))
        .cycle();

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        for nibble in [byte >> 4, byte & 0x0f] {
            let mut index = nibble as usize;
            if nibble >= 10 && bits.next().unwrap_or(false) {
                index += 6;
            }
            out.push(HEX_CHARS[index] as char);
        }
    }
    out
}

pub struct CasperAddressService;

impl CasperAddressService {
    /// 带标签的账户公钥字节（部署头与转账目标使用）
    pub fn tagged_key(public_key: &PublicKey) -> Result<Vec<u8>> {
        let (tag, key) = match public_key.curve() {
            EllipticCurve::Ed25519 | EllipticCurve::Ed25519Slip0010 => {
                (ED25519_TAG, public_key.blockchain_key().to_vec())
            }
            EllipticCurve::Secp256k1 => (SECP256K1_TAG, public_key.compressed()?),
        };
        let mut out = Vec::with_capacity(key.len() + 1);
        out.push(tag);
        out.extend_from_slice(&key);
        Ok(out)
    }

    /// 解析地址为带标签的公钥字节
    pub fn parse(address: &str) -> Option<Vec<u8>> {
        if !address.is_ascii() || address.len() < 2 {
            return None;
        }
        let (tag_hex, key_hex) = address.split_at(2);
        let tag = match tag_hex {
            "01" => ED25519_TAG,
            "02" => SECP256K1_TAG,
            _ => return None,
        };
        let expected_len = if tag == ED25519_TAG {
            ED25519_KEY_LEN
        } else {
            SECP256K1_COMPRESSED_LEN
        };
        if key_hex.len() != expected_len * 2 {
            return None;
        }
        let key = hex::decode(key_hex).ok()?;

        // 全小写或全大写不带校验和，混合大小写必须与校验和一致
        let has_upper = key_hex.bytes().any(|c| c.is_ascii_uppercase());
        let has_lower = key_hex.bytes().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower && checksummed_hex(&key) != key_hex {
            return None;
        }

        let mut out = Vec::with_capacity(key.len() + 1);
        out.push(tag);
        out.extend(key);
        Some(out)
    }

    pub fn require_tagged_key(address: &str) -> Result<Vec<u8>> {
        Self::parse(address).ok_or_else(|| WalletError::invalid_address(address))
    }
}

impl AddressService for CasperAddressService {
    fn make_address(&self, public_key: &PublicKey, address_type: AddressType) -> Result<Address> {
        ensure_default_type("Casper", address_type)?;
        let tagged = Self::tagged_key(public_key)?;
        let value = format!("{:02x}{}", tagged[0], checksummed_hex(&tagged[1..]));
        Ok(Address::new(value, AddressType::Default, public_key.clone()))
    }

    fn validate(&self, address: &str) -> bool {
        Self::parse(address).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ED_ADDRESS: &str = "0198c07D7e72D89A681d7227a7Af8A6fd5F22fe0105c8741d55A95dF415454b82E";
    const SECP_ADDRESS: &str =
        "02021f997DfbbFd32817C0E110EAeE26BCbD2BB70b4640C515D9721c9664312eaCd8";

    #[test]
    fn test_ed25519_address() {
        let key = PublicKey::from_hex(
            "98C07D7E72D89A681D7227A7AF8A6FD5F22FE0105C8741D55A95DF415454B82E",
            EllipticCurve::Ed25519,
        )
        .unwrap();
        let address = CasperAddressService
            .make_address(&key, AddressType::Default)
            .unwrap();
        assert_eq!(address.value, ED_ADDRESS);
        assert!(CasperAddressService.validate(ED_ADDRESS));
    }

    #[test]
    fn test_secp256k1_address() {
        let key = PublicKey::from_hex(
            "021F997DFBBFD32817C0E110EAEE26BCBD2BB70B4640C515D9721C9664312EACD8",
            EllipticCurve::Secp256k1,
        )
        .unwrap();
        let address = CasperAddressService
            .make_address(&key, AddressType::Default)
            .unwrap();
        assert_eq!(address.value, SECP_ADDRESS);
        assert!(CasperAddressService.validate(SECP_ADDRESS));
    }

    #[test]
    fn test_validation_rules() {
        assert!(CasperAddressService.validate(&ED_ADDRESS.to_lowercase()));
        // 大小写被篡改
        let tampered = ED_ADDRESS.replacen("D7e", "d7e", 1);
        assert!(!CasperAddressService.validate(&tampered));
        assert!(!CasperAddressService.validate(&ED_ADDRESS[..64]));
        assert!(!CasperAddressService.validate(&format!("03{}", &ED_ADDRESS[2..])));
        assert!(!CasperAddressService.validate("01"));
    }
}
