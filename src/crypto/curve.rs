use std::fmt;

use serde::{Deserialize, Serialize};

/// 椭圆曲线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EllipticCurve {
    /// secp256k1 (Bitcoin 系列, EVM, XRP, Casper, Kaspa)
    Secp256k1,
    /// ed25519 (XRP, Casper)
    Ed25519,
    /// SLIP-0010 派生的 ed25519，公钥格式与 ed25519 相同
    Ed25519Slip0010,
}

impl EllipticCurve {
    /// Edwards 曲线族
    pub fn is_edwards(&self) -> bool {
        matches!(self, Self::Ed25519 | Self::Ed25519Slip0010)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secp256k1 => "secp256k1",
            Self::Ed25519 => "ed25519",
            Self::Ed25519Slip0010 => "ed25519_slip0010",
        }
    }
}

impl fmt::Display for EllipticCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
