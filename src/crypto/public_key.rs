//! 公钥与曲线
//!
//! 公钥由外部签名器提供，构造时校验长度与曲线点结构，之后不再修改。

use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::crypto::EllipticCurve;
use crate::error::{Result, WalletError};

pub const SECP256K1_COMPRESSED_LEN: usize = 33;
pub const SECP256K1_UNCOMPRESSED_LEN: usize = 65;
pub const ED25519_KEY_LEN: usize = 32;

/// 确定性派生信息
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationInfo {
    /// 派生路径，例如 m/44'/3'/0'/0/0
    pub path: String,
    /// 派生出的子公钥
    pub derived_key: Vec<u8>,
}

/// 公钥 + 曲线 + 可选派生信息
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    seed_key: Vec<u8>,
    curve: EllipticCurve,
    derivation: Option<DerivationInfo>,
}

impl PublicKey {
    pub fn new(bytes: impl Into<Vec<u8>>, curve: EllipticCurve) -> Result<Self> {
        let seed_key = bytes.into();
        validate_key_bytes(&seed_key, curve)?;
        Ok(Self {
            seed_key,
            curve,
            derivation: None,
        })
    }

    pub fn from_hex(hex_key: &str, curve: EllipticCurve) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim_start_matches("0x"))
            .map_err(|e| WalletError::InvalidPublicKey(format!("invalid hex: {}", e)))?;
        Self::new(bytes, curve)
    }

    /// 附加派生信息；派生子公钥必须与种子公钥同曲线
    pub fn with_derivation(mut self, path: impl Into<String>, derived_key: Vec<u8>) -> Result<Self> {
        validate_key_bytes(&derived_key, self.curve)?;
        self.derivation = Some(DerivationInfo {
            path: path.into(),
            derived_key,
        });
        Ok(self)
    }

    pub fn curve(&self) -> EllipticCurve {
        self.curve
    }

    pub fn seed_key(&self) -> &[u8] {
        &self.seed_key
    }

    pub fn derivation(&self) -> Option<&DerivationInfo> {
        self.derivation.as_ref()
    }

    /// 链上实际使用的公钥：有派生信息时为子公钥，否则为种子公钥
    pub fn blockchain_key(&self) -> &[u8] {
        match &self.derivation {
            Some(info) => &info.derived_key,
            None => &self.seed_key,
        }
    }

    /// 曲线不在要求范围内时返回声明式错误
    pub fn require_curve(&self, expected: &[EllipticCurve]) -> Result<()> {
        if expected.contains(&self.curve) {
            Ok(())
        } else {
            Err(WalletError::CurveMismatch {
                expected: expected.to_vec(),
                actual: self.curve,
            })
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.curve == EllipticCurve::Secp256k1
            && self.blockchain_key().len() == SECP256K1_COMPRESSED_LEN
    }

    /// 33 字节压缩格式（仅 secp256k1）
    pub fn compressed(&self) -> Result<Vec<u8>> {
        self.sec1_point(true)
    }

    /// 65 字节非压缩格式（仅 secp256k1）
    pub fn decompressed(&self) -> Result<Vec<u8>> {
        self.sec1_point(false)
    }

    fn sec1_point(&self, compress: bool) -> Result<Vec<u8>> {
        if self.curve != EllipticCurve::Secp256k1 {
            return Err(WalletError::UnsupportedCurveOperation {
                curve: self.curve,
                operation: if compress { "compress" } else { "decompress" },
            });
        }
        let point = k256::PublicKey::from_sec1_bytes(self.blockchain_key())
            .map_err(|e| WalletError::InvalidPublicKey(e.to_string()))?;
        Ok(point.to_encoded_point(compress).as_bytes().to_vec())
    }
}

fn validate_key_bytes(bytes: &[u8], curve: EllipticCurve) -> Result<()> {
    match curve {
        EllipticCurve::Secp256k1 => {
            let well_formed = matches!(
                (bytes.len(), bytes.first()),
                (SECP256K1_COMPRESSED_LEN, Some(0x02 | 0x03))
                    | (SECP256K1_UNCOMPRESSED_LEN, Some(0x04))
            );
            if !well_formed {
                return Err(WalletError::InvalidPublicKey(format!(
                    "secp256k1 key must be 33 or 65 bytes SEC1, got {} bytes",
                    bytes.len()
                )));
            }
            k256::PublicKey::from_sec1_bytes(bytes)
                .map(|_| ())
                .map_err(|_| WalletError::InvalidPublicKey("point is not on secp256k1".into()))
        }
        EllipticCurve::Ed25519 | EllipticCurve::Ed25519Slip0010 => {
            let raw: [u8; ED25519_KEY_LEN] = bytes.try_into().map_err(|_| {
                WalletError::InvalidPublicKey(format!(
                    "ed25519 key must be 32 bytes, got {}",
                    bytes.len()
                ))
            })?;
            ed25519_dalek::VerifyingKey::from_bytes(&raw)
                .map(|_| ())
                .map_err(|_| WalletError::InvalidPublicKey("point is not on ed25519".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECP_COMPRESSED: &str =
        "0241DCD64B5F4A039FC339A16300A833A883B218909F2EBCAF3906651C76842C45";
    const SECP_UNCOMPRESSED: &str = "0441DCD64B5F4A039FC339A16300A833A883B218909F2EBCAF3906651C76842C45E3D67E8D2947E6FEE8B62D3D3B6A4D5F212DA23E478DD69A2C6CCC851F300D80";
    const ED_KEY: &str = "9FE5BB2CC7D83C1DA10845AFD8A34B141FD8FD72500B95B1547E12B9BB8AAC3D";

    #[test]
    fn test_compress_decompress() {
        let compressed = PublicKey::from_hex(SECP_COMPRESSED, EllipticCurve::Secp256k1).unwrap();
        let uncompressed =
            PublicKey::from_hex(SECP_UNCOMPRESSED, EllipticCurve::Secp256k1).unwrap();

        assert!(compressed.is_compressed());
        assert!(!uncompressed.is_compressed());
        assert_eq!(
            hex::encode_upper(compressed.decompressed().unwrap()),
            SECP_UNCOMPRESSED
        );
        assert_eq!(
            hex::encode_upper(uncompressed.compressed().unwrap()),
            SECP_COMPRESSED
        );
    }

    #[test]
    fn test_rejects_bad_lengths_and_points() {
        assert!(PublicKey::new(vec![0x02; 32], EllipticCurve::Secp256k1).is_err());
        assert!(PublicKey::new(vec![0x05; 33], EllipticCurve::Secp256k1).is_err());
        // x = 0 不在曲线上
        let mut off_curve = vec![0x02];
        off_curve.extend_from_slice(&[0u8; 32]);
        assert!(PublicKey::new(off_curve, EllipticCurve::Secp256k1).is_err());
        assert!(PublicKey::new(vec![0u8; 31], EllipticCurve::Ed25519).is_err());
    }

    #[test]
    fn test_edwards_key_has_no_sec1_forms() {
        let key = PublicKey::from_hex(ED_KEY, EllipticCurve::Ed25519).unwrap();
        assert!(matches!(
            key.compressed(),
            Err(WalletError::UnsupportedCurveOperation { .. })
        ));
        assert!(key.require_curve(&[EllipticCurve::Secp256k1]).is_err());
        assert!(key
            .require_curve(&[EllipticCurve::Ed25519, EllipticCurve::Ed25519Slip0010])
            .is_ok());
    }

    #[test]
    fn test_derivation_overrides_blockchain_key() {
        let seed = PublicKey::from_hex(SECP_UNCOMPRESSED, EllipticCurve::Secp256k1).unwrap();
        let child = hex::decode(SECP_COMPRESSED).unwrap();
        let key = seed.with_derivation("m/44'/0'/0'/0/0", child.clone()).unwrap();
        assert_eq!(key.blockchain_key(), child.as_slice());
        assert_eq!(key.derivation().unwrap().path, "m/44'/0'/0'/0/0");
    }
}
