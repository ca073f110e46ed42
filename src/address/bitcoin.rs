//! Bitcoin 系列地址（Bitcoin, Litecoin, Dogecoin, Dash, Ravencoin）
//!
//! - Legacy (P2PKH): Base58Check(version || hash160(pubkey))，公钥按原样（压缩或非压缩）哈希
//! - SegWit (P2WPKH): bech32(hrp, v0, hash160(compressed pubkey))

use bech32::{segwit, Hrp};
use bitcoin::hashes::Hash as _;
use bitcoin::{PubkeyHash, Script, ScriptBuf, ScriptHash, WPubkeyHash, WScriptHash};

use crate::address::{Address, AddressService, AddressType};
use crate::crypto::{
    base_n::{self, Alphabet},
    hash::hash160,
    EllipticCurve, PublicKey,
};
use crate::domain::Blockchain;
use crate::error::{Result, WalletError};

/// 输出脚本类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
}

/// 网络参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    pub name: &'static str,
    pub p2pkh_prefix: u8,
    pub p2sh_prefix: u8,
    /// 不支持 segwit 的网络为 None
    pub bech32_hrp: Option<&'static str>,
    /// P2PKH 输出的粉尘阈值（satoshi）
    pub dust_p2pkh: u64,
    /// 见证输出的粉尘阈值（satoshi）
    pub dust_p2wpkh: u64,
}

impl NetworkParams {
    pub const BITCOIN: NetworkParams = NetworkParams {
        name: "Bitcoin",
        p2pkh_prefix: 0x00,
        p2sh_prefix: 0x05,
        bech32_hrp: Some("bc"),
        dust_p2pkh: 546,
        dust_p2wpkh: 294,
    };

    pub const BITCOIN_TESTNET: NetworkParams = NetworkParams {
        name: "Bitcoin Testnet",
        p2pkh_prefix: 0x6f,
        p2sh_prefix: 0xc4,
        bech32_hrp: Some("tb"),
        dust_p2pkh: 546,
        dust_p2wpkh: 294,
    };

    pub const LITECOIN: NetworkParams = NetworkParams {
        name: "Litecoin",
        p2pkh_prefix: 0x30,
        p2sh_prefix: 0x32,
        bech32_hrp: Some("ltc"),
        dust_p2pkh: 5460,
        dust_p2wpkh: 5460,
    };

    pub const DOGECOIN: NetworkParams = NetworkParams {
        name: "Dogecoin",
        p2pkh_prefix: 0x1e,
        p2sh_prefix: 0x16,
        bech32_hrp: None,
        dust_p2pkh: 1_000_000,
        dust_p2wpkh: 1_000_000,
    };

    pub const DASH: NetworkParams = NetworkParams {
        name: "Dash",
        p2pkh_prefix: 0x4c,
        p2sh_prefix: 0x10,
        bech32_hrp: None,
        dust_p2pkh: 546,
        dust_p2wpkh: 546,
    };

    pub const DASH_TESTNET: NetworkParams = NetworkParams {
        name: "Dash Testnet",
        p2pkh_prefix: 0x8c,
        p2sh_prefix: 0x13,
        bech32_hrp: None,
        dust_p2pkh: 546,
        dust_p2wpkh: 546,
    };

    pub const RAVENCOIN: NetworkParams = NetworkParams {
        name: "Ravencoin",
        p2pkh_prefix: 0x3c,
        p2sh_prefix: 0x7a,
        bech32_hrp: None,
        dust_p2pkh: 546,
        dust_p2wpkh: 546,
    };

    pub const RAVENCOIN_TESTNET: NetworkParams = NetworkParams {
        name: "Ravencoin Testnet",
        p2pkh_prefix: 0x6f,
        p2sh_prefix: 0xc4,
        bech32_hrp: None,
        dust_p2pkh: 546,
        dust_p2wpkh: 546,
    };

    pub fn for_blockchain(blockchain: Blockchain) -> Option<NetworkParams> {
        match blockchain {
            Blockchain::Bitcoin { testnet: false } => Some(Self::BITCOIN),
            Blockchain::Bitcoin { testnet: true } => Some(Self::BITCOIN_TESTNET),
            Blockchain::Litecoin => Some(Self::LITECOIN),
            Blockchain::Dogecoin => Some(Self::DOGECOIN),
            Blockchain::Dash { testnet: false } => Some(Self::DASH),
            Blockchain::Dash { testnet: true } => Some(Self::DASH_TESTNET),
            Blockchain::Ravencoin { testnet: false } => Some(Self::RAVENCOIN),
            Blockchain::Ravencoin { testnet: true } => Some(Self::RAVENCOIN_TESTNET),
            _ => None,
        }
    }

    pub fn supports_segwit(&self) -> bool {
        self.bech32_hrp.is_some()
    }

    pub fn dust(&self, script: ScriptType) -> u64 {
        match script {
            ScriptType::P2pkh | ScriptType::P2sh => self.dust_p2pkh,
            ScriptType::P2wpkh | ScriptType::P2wsh => self.dust_p2wpkh,
        }
    }
}

pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(*pubkey_hash)).into_bytes()
}

pub fn p2sh_script(script_hash: &[u8; 20]) -> Vec<u8> {
    ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(*script_hash)).into_bytes()
}

pub fn p2wpkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array(*pubkey_hash)).into_bytes()
}

/// 由 P2WPKH 输出脚本还原对应的 P2PKH 脚本（BIP-143 scriptCode）
pub fn p2wpkh_script_code(script: &[u8]) -> Option<Vec<u8>> {
    Script::from_bytes(script)
        .p2wpkh_script_code()
        .map(ScriptBuf::into_bytes)
}

/// 识别输出脚本类型
pub fn classify_script(script: &[u8]) -> Option<ScriptType> {
    let script = Script::from_bytes(script);
    if script.is_p2pkh() {
        Some(ScriptType::P2pkh)
    } else if script.is_p2sh() {
        Some(ScriptType::P2sh)
    } else if script.is_p2wpkh() {
        Some(ScriptType::P2wpkh)
    } else if script.is_p2wsh() {
        Some(ScriptType::P2wsh)
    } else {
        None
    }
}

pub struct BitcoinAddressService {
    params: NetworkParams,
}

impl BitcoinAddressService {
    pub fn new(params: NetworkParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    fn legacy_address(&self, public_key: &PublicKey) -> Address {
        let hash = hash160(public_key.blockchain_key());
        let mut payload = Vec::with_capacity(21);
        payload.push(self.params.p2pkh_prefix);
        payload.extend_from_slice(&hash);
        let value = base_n::encode_check(&payload, &Alphabet::BITCOIN);
        Address::new(value, AddressType::Legacy, public_key.clone())
            .with_locking_script(p2pkh_script(&hash))
    }

    fn segwit_address(&self, public_key: &PublicKey, hrp: &str) -> Result<Address> {
        // 见证程序只接受压缩公钥
        let hash = hash160(&public_key.compressed()?);
        let hrp = Hrp::parse(hrp).map_err(|e| WalletError::InvalidEncoding(e.to_string()))?;
        let value = segwit::encode(hrp, segwit::VERSION_0, &hash)
            .map_err(|e| WalletError::InvalidEncoding(e.to_string()))?;
        Ok(Address::new(value, AddressType::Default, public_key.clone())
            .with_locking_script(p2wpkh_script(&hash)))
    }

    /// 地址 → 输出脚本
    pub fn locking_script(&self, address: &str) -> Result<(ScriptType, Vec<u8>)> {
        if let Some(payload) = base_n::decode_check(address, &Alphabet::BITCOIN) {
            if payload.len() == 21 {
                let hash: [u8; 20] = payload[1..]
                    .try_into()
                    .map_err(|_| WalletError::invalid_address(address))?;
                if payload[0] == self.params.p2pkh_prefix {
                    return Ok((ScriptType::P2pkh, p2pkh_script(&hash)));
                }
                if payload[0] == self.params.p2sh_prefix {
                    return Ok((ScriptType::P2sh, p2sh_script(&hash)));
                }
            }
            return Err(WalletError::invalid_address(address));
        }

        let (version, program) = self
            .decode_segwit(address)
            .ok_or_else(|| WalletError::invalid_address(address))?;
        match (version, program.len()) {
            (0, 20) => {
                let hash = WPubkeyHash::from_slice(&program)
                    .map_err(|_| WalletError::invalid_address(address))?;
                Ok((ScriptType::P2wpkh, ScriptBuf::new_p2wpkh(&hash).into_bytes()))
            }
            (0, 32) => {
                let hash = WScriptHash::from_slice(&program)
                    .map_err(|_| WalletError::invalid_address(address))?;
                Ok((ScriptType::P2wsh, ScriptBuf::new_p2wsh(&hash).into_bytes()))
            }
            _ => Err(WalletError::invalid_address(address)),
        }
    }

    fn decode_segwit(&self, address: &str) -> Option<(u8, Vec<u8>)> {
        let expected = self.params.bech32_hrp?;
        let (hrp, version, program) = segwit::decode(address).ok()?;
        if hrp.to_lowercase() != expected {
            return None;
        }
        Some((version.to_u8(), program))
    }
}

impl AddressService for BitcoinAddressService {
    fn make_address(&self, public_key: &PublicKey, address_type: AddressType) -> Result<Address> {
        public_key.require_curve(&[EllipticCurve::Secp256k1])?;
        match (address_type, self.params.bech32_hrp) {
            (AddressType::Default, Some(hrp)) => self.segwit_address(public_key, hrp),
            (AddressType::Default, None) => {
                let address = self.legacy_address(public_key);
                Ok(Address {
                    address_type: AddressType::Default,
                    ..address
                })
            }
            (AddressType::Legacy, Some(_)) => Ok(self.legacy_address(public_key)),
            (AddressType::Legacy, None) => Err(WalletError::UnsupportedAddressType {
                blockchain: self.params.name.to_string(),
                address_type: address_type.to_string(),
            }),
        }
    }

    fn validate(&self, address: &str) -> bool {
        self.locking_script(address).is_ok()
    }

    fn supported_types(&self) -> Vec<AddressType> {
        if self.params.supports_segwit() {
            vec![AddressType::Default, AddressType::Legacy]
        } else {
            vec![AddressType::Default]
        }
    }
}
