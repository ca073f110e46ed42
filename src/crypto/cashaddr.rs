//! CashAddr 编码（Kaspa 使用）
//!
//! `prefix:payload`，payload 为 5-bit 分组的 version || data，末尾 8 个字符是 40-bit BCH 校验和。

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const CHECKSUM_LEN: usize = 8;
const GENERATORS: [u64; 5] = [
    0x98f2bc8e61,
    0x79b76d99e2,
    0xf33e5fb3c4,
    0xae2eabe2a8,
    0x1e4f43e470,
];

fn polymod(values: impl Iterator<Item = u8>) -> u64 {
    let mut c: u64 = 1;
    for d in values {
        let c0 = c >> 35;
        c = ((c & 0x07_ffff_ffff) << 5) ^ d as u64;
        for (i, g) in GENERATORS.iter().enumerate() {
            if (c0 >> i) & 1 == 1 {
                c ^= g;
            }
        }
    }
    c ^ 1
}

fn prefix_values(prefix: &str) -> impl Iterator<Item = u8> + '_ {
    prefix.bytes().map(|b| b & 0x1f).chain(std::iter::once(0))
}

/// 位宽转换（8 -> 5 编码时补零；5 -> 8 解码时不允许非零填充）
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max = (1u32 << to) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);
    for &value in data {
        if (value as u32) >> from != 0 {
            return None;
        }
        acc = (acc << from) | value as u32;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max) != 0 {
        return None;
    }
    Some(out)
}

pub fn encode(prefix: &str, version: u8, payload: &[u8]) -> String {
    let mut raw = Vec::with_capacity(payload.len() + 1);
    raw.push(version);
    raw.extend_from_slice(payload);
    // 8 -> 5 补零转换不会失败
    let data = convert_bits(&raw, 8, 5, true).unwrap_or_default();

    let checksum = polymod(
        prefix_values(prefix)
            .chain(data.iter().copied())
            .chain(std::iter::repeat(0).take(CHECKSUM_LEN)),
    );

    let mut out = String::with_capacity(prefix.len() + 1 + data.len() + CHECKSUM_LEN);
    out.push_str(prefix);
    out.push(':');
    out.extend(data.iter().map(|&d| CHARSET[d as usize] as char));
    out.extend((0..CHECKSUM_LEN).map(|i| {
        let d = (checksum >> (5 * (CHECKSUM_LEN - 1 - i))) & 0x1f;
        CHARSET[d as usize] as char
    }));
    out
}

/// 解码并校验；返回 (version, payload)
pub fn decode(address: &str, expected_prefix: &str) -> Option<(u8, Vec<u8>)> {
    let (prefix, body) = address.split_once(':')?;
    if prefix != expected_prefix || body.len() <= CHECKSUM_LEN {
        return None;
    }

    let values = body
        .bytes()
        .map(|c| CHARSET.iter().position(|&s| s == c).map(|p| p as u8))
        .collect::<Option<Vec<u8>>>()?;

    if polymod(prefix_values(prefix).chain(values.iter().copied())) != 0 {
        return None;
    }

    let data = &values[..values.len() - CHECKSUM_LEN];
    let raw = convert_bits(data, 5, 8, false)?;
    let (&version, payload) = raw.split_first()?;
    Some((version, payload.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0241DCD64B5F4A039FC339A16300A833A883B218909F2EBCAF3906651C76842C45";
    const ADDRESS: &str = "kaspa:qypyrhxkfd055qulcvu6zccq4qe63qajrzgf7t4u4uusveguw6zzc3grrceeuex";

    #[test]
    fn test_encode_known_vector() {
        let key = hex::decode(KEY).unwrap();
        assert_eq!(encode("kaspa", 0x01, &key), ADDRESS);
    }

    #[test]
    fn test_decode_known_vector() {
        let (version, payload) = decode(ADDRESS, "kaspa").unwrap();
        assert_eq!(version, 0x01);
        assert_eq!(hex::encode_upper(payload), KEY);
    }

    #[test]
    fn test_decode_rejects_wrong_prefix_and_checksum() {
        assert!(decode(ADDRESS, "kaspatest").is_none());
        let tampered = ADDRESS.replace("uex", "uez");
        assert!(decode(&tampered, "kaspa").is_none());
        assert!(decode("kaspa:", "kaspa").is_none());
        assert!(decode("kaspa", "kaspa").is_none());
    }
}
