//! Alephium 地址
//!
//! P2PKH: Base58(0x00 || blake2b-256(压缩公钥))，无额外校验和。

use crate::address::{ensure_default_type, Address, AddressService, AddressType};
use crate::crypto::{
    base_n::{self, Alphabet},
    hash::blake2b_256,
    EllipticCurve, PublicKey,
};
use crate::error::Result;

const P2PKH: u8 = 0x00;
const P2SH: u8 = 0x02;
const P2C: u8 = 0x03;
const HASH_LEN: usize = 32;

pub struct AlephiumAddressService;

impl AddressService for AlephiumAddressService {
    fn make_address(&self, public_key: &PublicKey, address_type: AddressType) -> Result<Address> {
        ensure_default_type("Alephium", address_type)?;
        public_key.require_curve(&[EllipticCurve::Secp256k1])?;
        let mut payload = Vec::with_capacity(HASH_LEN + 1);
        payload.push(P2PKH);
        payload.extend_from_slice(&blake2b_256(&public_key.compressed()?));
        Ok(Address::new(
            base_n::encode(&payload, &Alphabet::BITCOIN),
            AddressType::Default,
            public_key.clone(),
        ))
    }

    fn validate(&self, address: &str) -> bool {
        match base_n::decode(address, &Alphabet::BITCOIN) {
            Some(bytes) if bytes.len() == HASH_LEN + 1 => matches!(bytes[0], P2PKH | P2SH | P2C),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_address() {
        let key = PublicKey::from_hex(
            "025ad4a937b43f426d1bc2de5a5061c82c5218b2d0f52c132b3ddd0d6c07c4efca",
            EllipticCurve::Secp256k1,
        )
        .unwrap();
        let address = AlephiumAddressService
            .make_address(&key, AddressType::Default)
            .unwrap();
        assert_eq!(address.value, "1HqAa1eHkqmXuSh7ECW6jF9ygZ2CMZYe1JthwcQ7NbgUe");

        let other = PublicKey::from_hex(
            "0241DCD64B5F4A039FC339A16300A833A883B218909F2EBCAF3906651C76842C45",
            EllipticCurve::Secp256k1,
        )
        .unwrap();
        assert_eq!(
            AlephiumAddressService
                .make_address(&other, AddressType::Default)
                .unwrap()
                .value,
            "12ZGzgQEpgQCWQrD8eyNihFXBF7QPGbWzSnGQSSUES98E"
        );
    }

    #[test]
    fn test_validate() {
        let service = AlephiumAddressService;
        assert!(service.validate("1HqAa1eHkqmXuSh7ECW6jF9ygZ2CMZYe1JthwcQ7NbgUe"));
        assert!(!service.validate("0x00"));
        assert!(!service.validate("1HqAa1eHkqmXuSh7ECW6jF9ygZ2CMZYe1JthwcQ7NsKSmsak"));
        assert!(!service.validate("1HqAa1eHkqmXuSh7ECW6jF9ygZ2CMZYe1J"));
    }
}
