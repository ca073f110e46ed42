//! EVM 节点（以太坊 JSON-RPC）

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::address::ethereum::EthereumAddressService;
use crate::error::{NetworkError, Result, WalletError};
use crate::network::{parse_quantity, HttpTransport, JsonRpcClient, NetworkProvider};
use crate::transaction::ethereum::erc20_balance_of_data;

#[async_trait]
pub trait EthereumNetworkProvider: NetworkProvider {
    /// 余额（wei）
    async fn get_balance(&self, address: &str) -> Result<u128>;
    /// `latest` 或 `pending` 的交易计数
    async fn get_transaction_count(&self, address: &str, pending: bool) -> Result<u64>;
    /// ERC-20 `balanceOf`
    async fn get_token_balance(&self, address: &str, contract: &str) -> Result<u128>;
    async fn get_gas_price(&self) -> Result<u128>;
    async fn get_max_priority_fee(&self) -> Result<u128>;
    /// 最新区块的 base fee；不支持 EIP-1559 的链返回 `None`
    async fn get_base_fee(&self) -> Result<Option<u128>>;
    async fn estimate_gas(&self, from: &str, to: &str, value: u128, data: Option<&[u8]>) -> Result<u64>;
    /// 广播已签名交易（hex），返回交易哈希
    async fn send_raw(&self, payload_hex: &str) -> Result<String>;
}

pub struct EthereumJsonRpcProvider {
    rpc: JsonRpcClient,
}

impl EthereumJsonRpcProvider {
    pub fn new(host: &str, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            rpc: JsonRpcClient::new(host, transport),
        }
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u128> {
        let result = self.rpc.call(method, params).await?;
        Ok(parse_quantity(&result, self.rpc.url())?)
    }
}

impl NetworkProvider for EthereumJsonRpcProvider {
    fn host(&self) -> &str {
        self.rpc.url()
    }
}

fn hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

#[async_trait]
impl EthereumNetworkProvider for EthereumJsonRpcProvider {
    async fn get_balance(&self, address: &str) -> Result<u128> {
        self.quantity("eth_getBalance", json!([address, "latest"])).await
    }

    async fn get_transaction_count(&self, address: &str, pending: bool) -> Result<u64> {
        let tag = if pending { "pending" } else { "latest" };
        let count = self
            .quantity("eth_getTransactionCount", json!([address, tag]))
            .await?;
        u64::try_from(count)
            .map_err(|_| NetworkError::malformed(self.rpc.url(), "nonce out of range").into())
    }

    async fn get_token_balance(&self, address: &str, contract: &str) -> Result<u128> {
        let owner = EthereumAddressService::parse(address)
            .ok_or_else(|| WalletError::invalid_address(address))?;
        let data = erc20_balance_of_data(&owner);
        self.quantity(
            "eth_call",
            json!([{ "to": contract, "data": hex_data(&data) }, "latest"]),
        )
        .await
    }

    async fn get_gas_price(&self) -> Result<u128> {
        self.quantity("eth_gasPrice", json!([])).await
    }

    async fn get_max_priority_fee(&self) -> Result<u128> {
        self.quantity("eth_maxPriorityFeePerGas", json!([])).await
    }

    async fn get_base_fee(&self) -> Result<Option<u128>> {
        let block = self
            .rpc
            .call("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        match block.get("baseFeePerGas").filter(|v| !v.is_null()) {
            Some(value) => Ok(Some(parse_quantity(value, self.rpc.url())?)),
            None => Ok(None),
        }
    }

    async fn estimate_gas(&self, from: &str, to: &str, value: u128, data: Option<&[u8]>) -> Result<u64> {
        let mut call = json!({
            "from": from,
            "to": to,
            "value": format!("0x{:x}", value),
        });
        if let Some(data) = data {
            call["data"] = Value::String(hex_data(data));
        }
        let gas = self.quantity("eth_estimateGas", json!([call])).await?;
        u64::try_from(gas)
            .map_err(|_| NetworkError::malformed(self.rpc.url(), "gas out of range").into())
    }

    async fn send_raw(&self, payload_hex: &str) -> Result<String> {
        let params = json!([format!("0x{}", payload_hex.trim_start_matches("0x"))]);
        let result = self
            .rpc
            .call("eth_sendRawTransaction", params)
            .await
            .map_err(|e| match e {
                // 节点对广播的业务错误（nonce too low、余额不足）是终态
                NetworkError::Rpc { host, message, .. } => NetworkError::Rejected { host, message },
                other => other,
            })?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| NetworkError::malformed(self.rpc.url(), "transaction hash is not a string").into())
    }
}

/// 慢/市价/快三档：`(max_fee_per_gas, priority_fee)`，priority ×1、×1.5、×2，
/// `max_fee = 2·base + priority`
pub fn eip1559_tiers(base_fee: u128, priority_fee: u128) -> [(u128, u128); 3] {
    let tier = |priority: u128| (base_fee.saturating_mul(2).saturating_add(priority), priority);
    [
        tier(priority_fee),
        tier(priority_fee.saturating_mul(3) / 2),
        tier(priority_fee.saturating_mul(2)),
    ]
}

/// 旧费用模型：gas price ×1、×1.2、×1.5
pub fn legacy_tiers(gas_price: u128) -> [u128; 3] {
    [
        gas_price,
        gas_price.saturating_mul(12) / 10,
        gas_price.saturating_mul(15) / 10,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::transport::mock::MockTransport;

    const HOST: &str = "https://eth.example";
    const ADDRESS: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";

    fn provider(transport: MockTransport) -> EthereumJsonRpcProvider {
        EthereumJsonRpcProvider::new(HOST, Arc::new(transport))
    }

    #[tokio::test]
    async fn test_balance_and_nonce() {
        let transport = MockTransport::new()
            .on_rpc(HOST, "eth_getBalance", json!("0xde0b6b3a7640000"))
            .on_rpc(HOST, "eth_getTransactionCount", json!("0x2a"));
        let provider = provider(transport);
        assert_eq!(provider.get_balance(ADDRESS).await.unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(provider.get_transaction_count(ADDRESS, true).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_token_balance_uses_balance_of() {
        let transport = Arc::new(MockTransport::new().on_rpc(
            HOST,
            "eth_call",
            json!(format!("0x{:064x}", 5_000_000u64)),
        ));
        let provider = EthereumJsonRpcProvider::new(HOST, transport.clone());
        let balance = provider
            .get_token_balance(ADDRESS, "0xdAC17F958D2ee523a2206206994597C13D831ec7")
            .await
            .unwrap();
        assert_eq!(balance, 5_000_000);

        let (_, body) = &transport.requests()[0];
        let data = body.as_ref().unwrap()["params"][0]["data"].as_str().unwrap().to_string();
        assert!(data.starts_with("0x70a08231"));
        assert!(data.to_lowercase().ends_with("9858effd232b4033e47d90003d41ec34ecaeda94"));
    }

    #[tokio::test]
    async fn test_base_fee_missing_on_legacy_chain() {
        let transport = MockTransport::new().on_rpc(
            HOST,
            "eth_getBlockByNumber",
            json!({"number": "0x1", "gasLimit": "0x1c9c380"}),
        );
        assert_eq!(provider(transport).get_base_fee().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_raw_rejection_is_terminal() {
        let transport = MockTransport::new().on_rpc_error(
            HOST,
            "eth_sendRawTransaction",
            -32000,
            "nonce too low",
        );
        let err = provider(transport).send_raw("f86c").await.unwrap_err();
        assert_eq!(err.code(), "transaction_rejected");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_fee_tiers_are_ordered() {
        let tiers = eip1559_tiers(30, 2);
        assert_eq!(tiers, [(62, 2), (63, 3), (64, 4)]);
        assert_eq!(legacy_tiers(10), [10, 12, 15]);
    }
}
