//! 外部签名器返回的签名
//!
//! secp256k1 与 ed25519 签名均为 64 字节 r||s。

use ed25519_dalek::Verifier;
use k256::ecdsa::{signature::hazmat::PrehashVerifier, RecoveryId, VerifyingKey};

use crate::crypto::PublicKey;
use crate::error::{Result, WalletError};

pub const SIGNATURE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() != SIGNATURE_LEN {
            return Err(WalletError::InvalidSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn ecdsa(&self) -> Result<k256::ecdsa::Signature> {
        let sig = k256::ecdsa::Signature::from_slice(&self.0)
            .map_err(|e| WalletError::InvalidSignature(e.to_string()))?;
        Ok(sig.normalize_s().unwrap_or(sig))
    }

    /// low-s 规范化后的 r||s
    pub fn normalized(&self) -> Result<[u8; SIGNATURE_LEN]> {
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(&self.ecdsa()?.to_bytes());
        Ok(out)
    }

    /// low-s 规范化后的 DER 编码（比特币脚本、XRP）
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.ecdsa()?.to_der().as_bytes().to_vec())
    }

    /// 校验 secp256k1 签名（`key` 为 SEC1 编码公钥）
    pub fn verify_prehash(&self, prehash: &[u8], key: &[u8]) -> Result<()> {
        let verifying_key = VerifyingKey::from_sec1_bytes(key)
            .map_err(|e| WalletError::InvalidPublicKey(e.to_string()))?;
        verifying_key
            .verify_prehash(prehash, &self.ecdsa()?)
            .map_err(|_| WalletError::InvalidSignature("signature does not match public key".into()))
    }

    /// 校验 ed25519 签名（对完整消息）
    pub fn verify_ed25519(&self, message: &[u8], key: &[u8]) -> Result<()> {
        let key: [u8; 32] = key
            .try_into()
            .map_err(|_| WalletError::InvalidPublicKey("ed25519 key must be 32 bytes".into()))?;
        let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&key)
            .map_err(|e| WalletError::InvalidPublicKey(e.to_string()))?;
        let bytes: [u8; SIGNATURE_LEN] = self
            .0
            .as_slice()
            .try_into()
            .map_err(|_| WalletError::InvalidSignature("bad length".into()))?;
        verifying_key
            .verify(message, &ed25519_dalek::Signature::from_bytes(&bytes))
            .map_err(|_| WalletError::InvalidSignature("signature does not match public key".into()))
    }

    /// 通过试恢复求出 recovery id（EVM 的 v / y_parity）
    pub fn recovery_id(&self, prehash: &[u8], key: &PublicKey) -> Result<u8> {
        let verifying_key = VerifyingKey::from_sec1_bytes(key.blockchain_key())
            .map_err(|e| WalletError::InvalidPublicKey(e.to_string()))?;
        let recid = RecoveryId::trial_recovery_from_prehash(&verifying_key, prehash, &self.ecdsa()?)
            .map_err(|_| {
                WalletError::InvalidSignature("signature does not match public key".into())
            })?;
        Ok(recid.to_byte())
    }
}
