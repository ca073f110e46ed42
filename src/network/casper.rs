//! Casper 节点（JSON-RPC）
//!
//! 账户从未收到过转账时节点报告 purse not found，这里翻译为零余额。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{NetworkError, Result};
use crate::network::{str_field, HttpTransport, JsonRpcClient, NetworkProvider};

/// query_balance 的 purse not found 错误码
const PURSE_NOT_FOUND_CODE: i64 = -32026;

#[async_trait]
pub trait CasperNetworkProvider: NetworkProvider {
    /// 主 purse 余额（motes），账户不存在时为 0
    async fn get_balance(&self, public_key_hex: &str) -> Result<u128>;
    /// 提交 `account_put_deploy` 参数，返回 deploy hash
    async fn put_deploy(&self, params: Value) -> Result<String>;
}

pub struct CasperJsonRpcProvider {
    rpc: JsonRpcClient,
}

impl CasperJsonRpcProvider {
    pub fn new(host: &str, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            rpc: JsonRpcClient::new(host, transport),
        }
    }
}

impl NetworkProvider for CasperJsonRpcProvider {
    fn host(&self) -> &str {
        self.rpc.url()
    }
}

fn is_purse_not_found(error: &NetworkError) -> bool {
    match error {
        NetworkError::Rpc { code, message, .. } => {
            *code == PURSE_NOT_FOUND_CODE || message.to_lowercase().contains("purse not found")
        }
        _ => false,
    }
}

#[async_trait]
impl CasperNetworkProvider for CasperJsonRpcProvider {
    async fn get_balance(&self, public_key_hex: &str) -> Result<u128> {
        let params = json!({
            "purse_identifier": {
                "main_purse_under_public_key": public_key_hex.to_lowercase()
            }
        });

        let result = match self.rpc.call("query_balance", params).await {
            Ok(result) => result,
            Err(e) if is_purse_not_found(&e) => {
                tracing::debug!(
                    host = %self.rpc.url(),
                    account = %public_key_hex,
                    "Purse not found, treating balance as zero"
                );
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let balance = str_field(&result, "balance", self.rpc.url())?;
        balance
            .parse::<u128>()
            .map_err(|_| NetworkError::malformed(self.rpc.url(), format!("bad balance {}", balance)).into())
    }

    async fn put_deploy(&self, params: Value) -> Result<String> {
        let result = self
            .rpc
            .call("account_put_deploy", params)
            .await
            .map_err(|e| match e {
                NetworkError::Rpc { host, message, .. } => NetworkError::Rejected { host, message },
                other => other,
            })?;
        Ok(str_field(&result, "deploy_hash", self.rpc.url())?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::transport::mock::MockTransport;

    const HOST: &str = "https://casper.example/rpc";
    const ACCOUNT: &str = "0198c07d7e72d89a681d7227a7af8a6fd5f22fe0105c8741d55a95df415454b82e";

    #[tokio::test]
    async fn test_balance() {
        let transport = MockTransport::new().on_rpc(
            HOST,
            "query_balance",
            json!({"api_version": "1.5.6", "balance": "2500000000"}),
        );
        let provider = CasperJsonRpcProvider::new(HOST, Arc::new(transport));
        assert_eq!(provider.get_balance(ACCOUNT).await.unwrap(), 2_500_000_000);
    }

    #[tokio::test]
    async fn test_purse_not_found_is_zero_balance() {
        let transport = MockTransport::new().on_rpc_error(
            HOST,
            "query_balance",
            PURSE_NOT_FOUND_CODE,
            "Purse not found",
        );
        let provider = CasperJsonRpcProvider::new(HOST, Arc::new(transport));
        assert_eq!(provider.get_balance(ACCOUNT).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purse_not_found_matched_by_message() {
        let transport = MockTransport::new().on_rpc_error(
            HOST,
            "query_balance",
            -32000,
            "query failed: purse not found",
        );
        let provider = CasperJsonRpcProvider::new(HOST, Arc::new(transport));
        assert_eq!(provider.get_balance(ACCOUNT).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_other_rpc_errors_surface() {
        let transport =
            MockTransport::new().on_rpc_error(HOST, "query_balance", -32602, "invalid params");
        let provider = CasperJsonRpcProvider::new(HOST, Arc::new(transport));
        let err = provider.get_balance(ACCOUNT).await.unwrap_err();
        assert_eq!(err.code(), "rpc_error");
    }

    #[tokio::test]
    async fn test_put_deploy() {
        let transport = Arc::new(MockTransport::new().on_rpc(
            HOST,
            "account_put_deploy",
            json!({"api_version": "1.5.6", "deploy_hash": "ab".repeat(32)}),
        ));
        let provider = CasperJsonRpcProvider::new(HOST, transport.clone());
        let hash = provider
            .put_deploy(json!({"deploy": {"hash": "ab".repeat(32)}}))
            .await
            .unwrap();
        assert_eq!(hash, "ab".repeat(32));
        let (_, body) = &transport.requests()[0];
        assert_eq!(body.as_ref().unwrap()["params"]["deploy"]["hash"], json!("ab".repeat(32)));
    }
}
