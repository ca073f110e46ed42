//! 费用与网络层
//!
//! 每条链的 Provider 只负责和一个节点对话（请求/响应 DTO 映射），
//! 多节点切换由 [`HostFallback`] 统一处理。节点返回的“软错误”
//! （例如 Casper 的 purse not found）在各自的 Provider 内翻译成领域结果。

pub mod casper;
pub mod ethereum;
pub mod fallback;
pub mod insight;
pub mod rpc;
pub mod transport;
pub mod xrp;

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

pub use casper::{CasperJsonRpcProvider, CasperNetworkProvider};
pub use ethereum::{EthereumJsonRpcProvider, EthereumNetworkProvider};
pub use fallback::HostFallback;
pub use insight::{InsightProvider, UtxoAddressInfo, UtxoFeeRates, UtxoNetworkProvider};
pub use rpc::JsonRpcClient;
pub use transport::{HttpTransport, ReqwestTransport};
pub use xrp::{XrpAccountInfo, XrpFeeDrops, XrpJsonRpcProvider, XrpNetworkProvider};

use crate::error::NetworkError;

/// 单个节点上的网络服务
pub trait NetworkProvider: Send + Sync {
    /// 节点地址
    fn host(&self) -> &str;
}

/// 去掉末尾的 `/`，便于拼接路径
pub(crate) fn trim_host(host: &str) -> String {
    host.trim_end_matches('/').to_string()
}

pub(crate) fn field<'a>(value: &'a Value, key: &str, host: &str) -> Result<&'a Value, NetworkError> {
    value
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| NetworkError::malformed(host, format!("missing field `{}`", key)))
}

pub(crate) fn str_field<'a>(value: &'a Value, key: &str, host: &str) -> Result<&'a str, NetworkError> {
    field(value, key, host)?
        .as_str()
        .ok_or_else(|| NetworkError::malformed(host, format!("field `{}` is not a string", key)))
}

/// 数字字段，兼容节点把整数编码成字符串的情况
pub(crate) fn u64_field(value: &Value, key: &str, host: &str) -> Result<u64, NetworkError> {
    let raw = field(value, key, host)?;
    raw.as_u64()
        .or_else(|| raw.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| NetworkError::malformed(host, format!("field `{}` is not an integer", key)))
}

/// 十进制数值（字符串或 JSON 数字），按文本解析避免浮点误差
pub(crate) fn decimal_of(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// `0x` 前缀的十六进制数量（以太坊 JSON-RPC quantity）
pub(crate) fn parse_quantity(value: &Value, host: &str) -> Result<u128, NetworkError> {
    let text = value
        .as_str()
        .ok_or_else(|| NetworkError::malformed(host, format!("expected hex quantity, got {}", value)))?;
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| NetworkError::malformed(host, format!("quantity {} lacks 0x prefix", text)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| NetworkError::malformed(host, format!("bad quantity {}: {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0x0"), "h").unwrap(), 0);
        assert_eq!(parse_quantity(&json!("0x"), "h").unwrap(), 0);
        assert_eq!(parse_quantity(&json!("0x1bc16d674ec80000"), "h").unwrap(), 2_000_000_000_000_000_000);
        assert!(parse_quantity(&json!("12"), "h").is_err());
        assert!(parse_quantity(&json!(12), "h").is_err());
    }

    #[test]
    fn test_field_helpers() {
        let value = json!({"a": "1", "b": 2, "c": null});
        assert_eq!(u64_field(&value, "a", "h").unwrap(), 1);
        assert_eq!(u64_field(&value, "b", "h").unwrap(), 2);
        assert!(field(&value, "c", "h").is_err());
        assert!(str_field(&value, "b", "h").is_err());
        assert_eq!(trim_host("https://a/api/"), "https://a/api");
        assert_eq!(decimal_of(&json!(0.01)), Some(Decimal::new(1, 2)));
        assert_eq!(decimal_of(&json!("1.50000000")), Some(Decimal::new(15, 1)));
        assert_eq!(decimal_of(&json!(null)), None);
    }
}
