//! 编解码、哈希与曲线原语

pub mod base_n;
pub mod cashaddr;
pub mod curve;
pub mod hash;
pub mod public_key;
pub mod signature;

pub use base_n::Alphabet;
pub use curve::EllipticCurve;
pub use public_key::{DerivationInfo, PublicKey};
pub use signature::Signature;
