//! XRP Ledger 地址
//!
//! AccountID = hash160(公钥)，secp256k1 使用压缩公钥，ed25519 在公钥前加 0xED。
//! 地址为版本字节 0x00 的 Base58Check，使用 Ripple 字母表。

use crate::address::{ensure_default_type, Address, AddressService, AddressType};
use crate::crypto::{
    base_n::{self, Alphabet},
    hash::hash160,
    EllipticCurve, PublicKey,
};
use crate::error::{Result, WalletError};

pub const ACCOUNT_ID_LEN: usize = 20;
const ACCOUNT_VERSION: u8 = 0x00;
/// ed25519 公钥在 XRP 中的类型前缀
pub const ED25519_KEY_PREFIX: u8 = 0xED;

pub struct XrpAddressService;

impl XrpAddressService {
    /// XRP 交易中 SigningPubKey 字段使用的公钥格式
    pub fn signing_public_key(public_key: &PublicKey) -> Result<Vec<u8>> {
        public_key.require_curve(&[
            EllipticCurve::Secp256k1,
            EllipticCurve::Ed25519,
            EllipticCurve::Ed25519Slip0010,
        ])?;
        if public_key.curve().is_edwards() {
            let mut key = Vec::with_capacity(33);
            key.push(ED25519_KEY_PREFIX);
            key.extend_from_slice(public_key.blockchain_key());
            Ok(key)
        } else {
            public_key.compressed()
        }
    }

    pub fn account_id(public_key: &PublicKey) -> Result<[u8; ACCOUNT_ID_LEN]> {
        Ok(hash160(&Self::signing_public_key(public_key)?))
    }

    pub fn encode_account_id(account_id: &[u8; ACCOUNT_ID_LEN]) -> String {
        let mut payload = Vec::with_capacity(ACCOUNT_ID_LEN + 1);
        payload.push(ACCOUNT_VERSION);
        payload.extend_from_slice(account_id);
        base_n::encode_check(&payload, &Alphabet::RIPPLE)
    }

    pub fn decode_account_id(address: &str) -> Option<[u8; ACCOUNT_ID_LEN]> {
        let payload = base_n::decode_check(address, &Alphabet::RIPPLE)?;
        match payload.split_first() {
            Some((&ACCOUNT_VERSION, id)) => id.try_into().ok(),
            _ => None,
        }
    }

    pub fn require_account_id(address: &str) -> Result<[u8; ACCOUNT_ID_LEN]> {
        Self::decode_account_id(address).ok_or_else(|| WalletError::invalid_address(address))
    }
}

impl AddressService for XrpAddressService {
    fn make_address(&self, public_key: &PublicKey, address_type: AddressType) -> Result<Address> {
        ensure_default_type("XRP", address_type)?;
        let account_id = Self::account_id(public_key)?;
        Ok(Address::new(
            Self::encode_account_id(&account_id),
            AddressType::Default,
            public_key.clone(),
        ))
    }

    fn validate(&self, address: &str) -> bool {
        Self::decode_account_id(address).is_some()
    }
}
