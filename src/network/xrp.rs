//! XRP Ledger 节点（rippled JSON-RPC）
//!
//! rippled 把业务错误放在 `result.status == "error"` 里，而不是 JSON-RPC 的 error 对象。

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::error::{NetworkError, Result, WalletError};
use crate::network::{field, str_field, u64_field, HttpTransport, JsonRpcClient, NetworkProvider};

/// 1 XRP = 10^6 drops
const DROPS_PER_XRP: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrpAccountInfo {
    pub balance_drops: u64,
    pub sequence: u32,
}

/// 费用档位（drops），慢 → 快
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrpFeeDrops {
    pub minimal: u64,
    pub normal: u64,
    pub priority: u64,
}

#[async_trait]
pub trait XrpNetworkProvider: NetworkProvider {
    /// 账户未激活时返回 [`WalletError::NoAccount`]，附带激活所需储备
    async fn get_account_info(&self, address: &str) -> Result<XrpAccountInfo>;
    async fn get_fee(&self) -> Result<XrpFeeDrops>;
    /// 账户激活储备（XRP）
    async fn get_reserve(&self) -> Result<Decimal>;
    /// 提交已签名交易（hex），返回交易哈希
    async fn submit(&self, blob_hex: &str) -> Result<String>;
}

pub struct XrpJsonRpcProvider {
    rpc: JsonRpcClient,
}

impl XrpJsonRpcProvider {
    pub fn new(host: &str, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            rpc: JsonRpcClient::new(host, transport),
        }
    }

    /// 调用并检查 `result.status`
    async fn request(&self, method: &str, params: Value) -> Result<Value, NetworkError> {
        let result = self.rpc.call(method, json!([params])).await?;
        if result.get("status").and_then(Value::as_str) == Some("error") {
            let error = result
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let code = result
                .get("error_code")
                .and_then(Value::as_i64)
                .unwrap_or_default();
            let message = result
                .get("error_message")
                .and_then(Value::as_str)
                .map(|m| format!("{}: {}", error, m))
                .unwrap_or(error);
            return Err(NetworkError::Rpc {
                host: self.rpc.url().to_string(),
                code,
                message,
            });
        }
        Ok(result)
    }
}

impl NetworkProvider for XrpJsonRpcProvider {
    fn host(&self) -> &str {
        self.rpc.url()
    }
}

fn is_account_not_found(error: &NetworkError) -> bool {
    matches!(error, NetworkError::Rpc { message, .. } if message.starts_with("actNotFound"))
}

#[async_trait]
impl XrpNetworkProvider for XrpJsonRpcProvider {
    async fn get_account_info(&self, address: &str) -> Result<XrpAccountInfo> {
        let params = json!({
            "account": address,
            "ledger_index": "current",
        });
        let result = match self.request("account_info", params).await {
            Ok(result) => result,
            Err(e) if is_account_not_found(&e) => {
                let reserve = self.get_reserve().await?;
                tracing::debug!(
                    host = %self.rpc.url(),
                    account = %address,
                    reserve = %reserve,
                    "Account not activated"
                );
                return Err(WalletError::NoAccount { reserve });
            }
            Err(e) => return Err(e.into()),
        };

        let data = field(&result, "account_data", self.rpc.url())?;
        let balance_drops = u64_field(data, "Balance", self.rpc.url())?;
        let sequence = u32::try_from(u64_field(data, "Sequence", self.rpc.url())?)
            .map_err(|_| NetworkError::malformed(self.rpc.url(), "sequence out of range"))?;

        Ok(XrpAccountInfo {
            balance_drops,
            sequence,
        })
    }

    async fn get_fee(&self) -> Result<XrpFeeDrops> {
        let result = self.request("fee", json!({})).await?;
        let drops = field(&result, "drops", self.rpc.url())?;
        let minimal = u64_field(drops, "minimum_fee", self.rpc.url())?;
        let normal = u64_field(drops, "open_ledger_fee", self.rpc.url())?.max(minimal);
        let priority = u64_field(drops, "median_fee", self.rpc.url())?.max(normal);

        Ok(XrpFeeDrops {
            minimal,
            normal,
            priority,
        })
    }

    async fn get_reserve(&self) -> Result<Decimal> {
        let state = self.request("server_state", json!({})).await?;
        let ledger = state
            .pointer("/state/validated_ledger")
            .ok_or_else(|| NetworkError::malformed(self.rpc.url(), "missing validated_ledger"))?;
        let drops = u64_field(ledger, "reserve_base", self.rpc.url())?;
        Ok(Decimal::from(drops) / Decimal::from(10u64.pow(DROPS_PER_XRP)))
    }

    async fn submit(&self, blob_hex: &str) -> Result<String> {
        let result = self
            .request("submit", json!({ "tx_blob": blob_hex.to_uppercase() }))
            .await
            .map_err(|e| match e {
                NetworkError::Rpc { host, message, .. } => NetworkError::Rejected { host, message },
                other => other,
            })?;

        let engine_result = str_field(&result, "engine_result", self.rpc.url())?;
        // tes* 已应用，terQUEUED 已进入队列
        if engine_result.starts_with("tes") || engine_result == "terQUEUED" {
            let hash = result
                .pointer("/tx_json/hash")
                .and_then(Value::as_str)
                .ok_or_else(|| NetworkError::malformed(self.rpc.url(), "missing tx_json.hash"))?;
            return Ok(hash.to_string());
        }

        let message = result
            .get("engine_result_message")
            .and_then(Value::as_str)
            .unwrap_or(engine_result);
        Err(NetworkError::Rejected {
            host: self.rpc.url().to_string(),
            message: format!("{}: {}", engine_result, message),
        }
        .into())
    }
}
