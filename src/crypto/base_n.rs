//! Base-N 编解码（Base58 及其变体字母表）
//!
//! 编码：把字节串视为大端整数逐位换算到目标基数，再为每个前导 0x00 字节补一个零符号。
//! 解码：去掉前导零符号，按位权换算回 256 进制，再补回同样数量的 0x00 字节。
//!
//! 两个方向都用小端数字数组做进位运算，复杂度 O(n²)，地址长度下足够。

use std::borrow::Cow;

use crate::crypto::hash::double_sha256;
use crate::error::{Result, WalletError};

/// Base58Check 校验和长度
pub const CHECKSUM_LEN: usize = 4;

/// Base-N 字母表
///
/// 第一个符号是"零符号"，编码时代表前导 0x00 字节。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Cow<'static, [u8]>,
}

impl Alphabet {
    /// 比特币字母表
    pub const BITCOIN: Alphabet = Alphabet {
        symbols: Cow::Borrowed(b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz"),
    };

    /// Ripple (XRP) 字母表，与比特币为同一组符号的不同排列
    pub const RIPPLE: Alphabet = Alphabet {
        symbols: Cow::Borrowed(b"rpshnaf39wBUDNEGHJKLM4PQRST7VWXYZ2bcdeCg65jkm8oFqi1tuvAxyz"),
    };

    /// 自定义字母表：至少两个符号，仅 ASCII，不能重复
    pub fn new(symbols: &str) -> Result<Self> {
        let bytes = symbols.as_bytes();
        if bytes.len() < 2 || bytes.len() > 256 {
            return Err(WalletError::InvalidEncoding(format!(
                "alphabet must have 2..=256 symbols, got {}",
                bytes.len()
            )));
        }
        if !symbols.is_ascii() {
            return Err(WalletError::InvalidEncoding(
                "alphabet must be ASCII".to_string(),
            ));
        }
        for (i, c) in bytes.iter().enumerate() {
            if bytes[..i].contains(c) {
                return Err(WalletError::InvalidEncoding(format!(
                    "duplicate alphabet symbol '{}'",
                    *c as char
                )));
            }
        }
        Ok(Self {
            symbols: Cow::Owned(bytes.to_vec()),
        })
    }

    pub fn radix(&self) -> usize {
        self.symbols.len()
    }

    pub fn zero_symbol(&self) -> u8 {
        self.symbols[0]
    }

    fn symbol(&self, digit: usize) -> u8 {
        self.symbols[digit]
    }

    fn digit_of(&self, symbol: u8) -> Option<usize> {
        self.symbols.iter().position(|&s| s == symbol)
    }
}

/// 编码任意字节序列
pub fn encode(bytes: &[u8], alphabet: &Alphabet) -> String {
    let zeros = bytes.iter().take_while(|&&b| b == 0).count();
    let radix = alphabet.radix() as u32;

    // 目标基数下的小端数字
    let mut digits: Vec<u32> = Vec::with_capacity(bytes.len() * 138 / 100 + 1);
    for &byte in &bytes[zeros..] {
        let mut carry = u32::from(byte);
        for digit in digits.iter_mut() {
            carry += *digit << 8;
            *digit = carry % radix;
            carry /= radix;
        }
        while carry > 0 {
            digits.push(carry % radix);
            carry /= radix;
        }
    }

    let mut out = String::with_capacity(zeros + digits.len());
    out.extend(std::iter::repeat(char::from(alphabet.zero_symbol())).take(zeros));
    // 字母表保证为 ASCII
    out.extend(
        digits
            .iter()
            .rev()
            .map(|&d| char::from(alphabet.symbol(d as usize))),
    );
    out
}

/// 解码；遇到字母表之外的符号返回 `None`
pub fn decode(input: &str, alphabet: &Alphabet) -> Option<Vec<u8>> {
    let symbols = input.as_bytes();
    let zero = alphabet.zero_symbol();
    let zeros = symbols.iter().take_while(|&&c| c == zero).count();
    let radix = alphabet.radix() as u32;

    // 256 进制的小端字节
    let mut bytes: Vec<u32> = Vec::with_capacity(symbols.len());
    for &c in &symbols[zeros..] {
        let mut carry = alphabet.digit_of(c)? as u32;
        for byte in bytes.iter_mut() {
            carry += *byte * radix;
            *byte = carry & 0xff;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push(carry & 0xff);
            carry >>= 8;
        }
    }

    let mut out = vec![0u8; zeros];
    out.extend(bytes.iter().rev().map(|&b| b as u8));
    Some(out)
}

/// Base58Check：payload 后附 double-SHA256 的前 4 字节
pub fn encode_check(payload: &[u8], alphabet: &Alphabet) -> String {
    let checksum = double_sha256(payload);
    let mut data = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    encode(&data, alphabet)
}

/// 解码并校验 Base58Check，返回去掉校验和的 payload
pub fn decode_check(input: &str, alphabet: &Alphabet) -> Option<Vec<u8>> {
    let data = decode(input, alphabet)?;
    if data.len() <= CHECKSUM_LEN {
        return None;
    }
    let (payload, checksum) = data.split_at(data.len() - CHECKSUM_LEN);
    if double_sha256(payload)[..CHECKSUM_LEN] != *checksum {
        return None;
    }
    Some(payload.to_vec())
}
