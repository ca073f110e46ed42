//! JSON-RPC 2.0 客户端

use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::NetworkError;
use crate::network::HttpTransport;

pub struct JsonRpcClient {
    url: String,
    transport: Arc<dyn HttpTransport>,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            url: url.into(),
            transport,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 发起调用并返回 `result`；错误对象映射为 [`NetworkError::Rpc`]
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, NetworkError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self.transport.post_json(&self.url, &payload).await?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let mut message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            // Casper 把具体原因放在 data 里
            if let Some(data) = error.get("data").and_then(Value::as_str) {
                message = format!("{}: {}", message, data);
            }
            return Err(NetworkError::Rpc {
                host: self.url.clone(),
                code,
                message,
            });
        }

        response.get("result").cloned().ok_or_else(|| {
            NetworkError::malformed(&self.url, format!("{} returned no result", method))
        })
    }
}
