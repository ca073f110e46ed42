//! Koinos 地址
//!
//! 地址与锁定脚本都由压缩公钥派生：Base58Check(0x00 || hash160)，脚本为 P2PKH 形式。

use crate::address::bitcoin::p2pkh_script;
use crate::address::{ensure_default_type, Address, AddressService, AddressType};
use crate::crypto::{
    base_n::{self, Alphabet},
    hash::hash160,
    EllipticCurve, PublicKey,
};
use crate::error::Result;

const VERSION: u8 = 0x00;

pub struct KoinosAddressService;

impl AddressService for KoinosAddressService {
    fn make_address(&self, public_key: &PublicKey, address_type: AddressType) -> Result<Address> {
        ensure_default_type("Koinos", address_type)?;
        public_key.require_curve(&[EllipticCurve::Secp256k1])?;
        let hash = hash160(&public_key.compressed()?);
        let mut payload = Vec::with_capacity(21);
        payload.push(VERSION);
        payload.extend_from_slice(&hash);
        Ok(Address::new(
            base_n::encode_check(&payload, &Alphabet::BITCOIN),
            AddressType::Default,
            public_key.clone(),
        )
        .with_locking_script(p2pkh_script(&hash)))
    }

    fn validate(&self, address: &str) -> bool {
        matches!(
            base_n::decode_check(address, &Alphabet::BITCOIN),
            Some(payload) if payload.len() == 21 && payload[0] == VERSION
        )
    }
}
