//! HTTP 传输层
//!
//! Provider 只依赖 [`HttpTransport`]，测试时可替换为内存实现。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::NetworkConfig;
use crate::error::NetworkError;

/// JSON over HTTP
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, NetworkError>;
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, NetworkError>;
}

/// 基于 reqwest 的生产实现
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &NetworkConfig) -> Self {
        // 连接池与超时设置
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }

    async fn read_json(
        url: &str,
        response: reqwest::Result<reqwest::Response>,
    ) -> Result<Value, NetworkError> {
        let response = response.map_err(|e| map_reqwest_error(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpStatus {
                host: origin(url),
                status: status.as_u16(),
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| NetworkError::malformed(origin(url), e.to_string()))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &str) -> Result<Value, NetworkError> {
        tracing::trace!(url = %url, "GET");
        let response = self.client.get(url).send().await;
        Self::read_json(url, response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, NetworkError> {
        tracing::trace!(url = %url, "POST");
        let response = self.client.post(url).json(body).send().await;
        Self::read_json(url, response).await
    }
}

fn map_reqwest_error(url: &str, error: reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout { host: origin(url) }
    } else if error.is_decode() {
        NetworkError::malformed(origin(url), error.to_string())
    } else {
        NetworkError::Unreachable {
            host: origin(url),
            message: error.to_string(),
        }
    }
}

/// `scheme://authority` 部分，用于错误里标识节点
pub(crate) fn origin(url: &str) -> String {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            let end = rest.find('/').map_or(url.len(), |i| scheme_end + 3 + i);
            url[..end].to_string()
        }
        None => url.to_string(),
    }
}
