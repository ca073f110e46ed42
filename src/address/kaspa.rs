//! Kaspa 地址（CashAddr 变体）

use crate::address::{ensure_default_type, Address, AddressService, AddressType};
use crate::crypto::{cashaddr, EllipticCurve, PublicKey};
use crate::error::Result;

/// Schnorr 公钥（32 字节 x-only）
pub const VERSION_SCHNORR: u8 = 0x00;
/// ECDSA 公钥（33 字节压缩）
pub const VERSION_ECDSA: u8 = 0x01;
/// P2SH 脚本哈希（32 字节）
pub const VERSION_P2SH: u8 = 0x08;

pub struct KaspaAddressService {
    prefix: &'static str,
}

impl KaspaAddressService {
    pub fn new(testnet: bool) -> Self {
        Self {
            prefix: if testnet { "kaspatest" } else { "kaspa" },
        }
    }

    pub fn decode(&self, address: &str) -> Option<(u8, Vec<u8>)> {
        let (version, payload) = cashaddr::decode(address, self.prefix)?;
        let expected_len = match version {
            VERSION_SCHNORR | VERSION_P2SH => 32,
            VERSION_ECDSA => 33,
            _ => return None,
        };
        (payload.len() == expected_len).then_some((version, payload))
    }
}

impl AddressService for KaspaAddressService {
    fn make_address(&self, public_key: &PublicKey, address_type: AddressType) -> Result<Address> {
        ensure_default_type("Kaspa", address_type)?;
        public_key.require_curve(&[EllipticCurve::Secp256k1])?;
        let compressed = public_key.compressed()?;
        Ok(Address::new(
            cashaddr::encode(self.prefix, VERSION_ECDSA, &compressed),
            AddressType::Default,
            public_key.clone(),
        ))
    }

    fn validate(&self, address: &str) -> bool {
        self.decode(address).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_address() {
        let service = KaspaAddressService::new(false);
        let compressed = PublicKey::from_hex(
            "0241DCD64B5F4A039FC339A16300A833A883B218909F2EBCAF3906651C76842C45",
            EllipticCurve::Secp256k1,
        )
        .unwrap();
        let uncompressed =
            PublicKey::new(compressed.decompressed().unwrap(), EllipticCurve::Secp256k1).unwrap();
        let expected = "kaspa:qypyrhxkfd055qulcvu6zccq4qe63qajrzgf7t4u4uusveguw6zzc3grrceeuex";
        for key in [&compressed, &uncompressed] {
            assert_eq!(
                service.make_address(key, AddressType::Default).unwrap().value,
                expected
            );
        }

        let other = PublicKey::from_hex(
            "02f1d3780546da20728ea8a1f5e5e51b8438002cd7c8382aafa7ddf680e12557e4",
            EllipticCurve::Secp256k1,
        )
        .unwrap();
        assert_eq!(
            service.make_address(&other, AddressType::Default).unwrap().value,
            "kaspa:qyp0r5mcq4rd5grj3652ra09u5dcgwqq9ntuswp247nama5quyj40eq03sc2dkx"
        );
    }

    #[test]
    fn test_validate() {
        let service = KaspaAddressService::new(false);
        assert!(service.validate(
            "kaspa:qypyrhxkfd055qulcvu6zccq4qe63qajrzgf7t4u4uusveguw6zzc3grrceeuex"
        ));
        assert!(!service.validate(
            "kaspb:qyp5ez9p4q6xnh0jp5xq0ewy58nmsde5uus7vrty9w222v3zc37xwrgeqhkq7v3"
        ));
        assert!(!service.validate(
            "kaspb:qyp5ez9p4q6xnh0jp5xq0ewy58nmsde5uus7vrty9w222v3zc37xwrgeqhkq7v4"
        ));
        assert!(!KaspaAddressService::new(true).validate(
            "kaspa:qypyrhxkfd055qulcvu6zccq4qe63qajrzgf7t4u4uusveguw6zzc3grrceeuex"
        ));
    }
}
