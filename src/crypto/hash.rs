//! 哈希原语
//!
//! 全部为无状态纯函数，输出长度由各算法的摘要长度常量给出。

use blake2::{digest::consts::U32, Blake2b};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};
use sha3::Keccak256;

type Blake2b256 = Blake2b<U32>;

pub const SHA256_LEN: usize = 32;
pub const SHA512_LEN: usize = 64;
pub const RIPEMD160_LEN: usize = 20;
pub const KECCAK256_LEN: usize = 32;
pub const BLAKE2B256_LEN: usize = 32;

fn fixed<const N: usize>(digest: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&digest[..N]);
    out
}

pub fn sha256(data: &[u8]) -> [u8; SHA256_LEN] {
    fixed(&Sha256::digest(data))
}

/// SHA256(SHA256(data))，Base58Check 校验和与比特币签名哈希使用
pub fn double_sha256(data: &[u8]) -> [u8; SHA256_LEN] {
    sha256(&sha256(data))
}

pub fn sha512(data: &[u8]) -> [u8; SHA512_LEN] {
    fixed(&Sha512::digest(data))
}

/// SHA-512 的前 32 字节（XRP 签名哈希）
pub fn sha512_half(data: &[u8]) -> [u8; 32] {
    fixed(&sha512(data))
}

pub fn ripemd160(data: &[u8]) -> [u8; RIPEMD160_LEN] {
    fixed(&Ripemd160::digest(data))
}

/// Hash160 = RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; RIPEMD160_LEN] {
    ripemd160(&sha256(data))
}

pub fn keccak256(data: &[u8]) -> [u8; KECCAK256_LEN] {
    fixed(&Keccak256::digest(data))
}

pub fn blake2b_256(data: &[u8]) -> [u8; BLAKE2B256_LEN] {
    fixed(&Blake2b256::digest(data))
}

/// DJB2 字符串哈希（h = h * 33 + c）
pub fn djb_hash(data: &[u8]) -> u32 {
    data.iter()
        .fold(5381u32, |h, &b| h.wrapping_shl(5).wrapping_add(h).wrapping_add(b as u32))
}
