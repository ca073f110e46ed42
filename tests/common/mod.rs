//! 测试辅助模块
//! 提供脚本化的 HTTP 传输层和使用固定私钥的签名器

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ironcore_chains::config::SdkConfig;
use ironcore_chains::crypto::{EllipticCurve, PublicKey, Signature};
use ironcore_chains::domain::Blockchain;
use ironcore_chains::network::HttpTransport;
use ironcore_chains::wallet::{TransactionSigner, WalletManagerFactory};
use ironcore_chains::{NetworkError, Result, WalletError};
use serde_json::{json, Value};

struct Route {
    url: String,
    rpc_method: Option<String>,
    response: std::result::Result<Value, NetworkError>,
}

/// 按 URL（以及 JSON-RPC 方法名）应答的传输层；未登记的请求返回 404
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Vec<Route>,
    requests: Mutex<Vec<(String, Option<Value>)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(mut self, url: &str, response: Value) -> Self {
        self.routes.push(Route {
            url: url.into(),
            rpc_method: None,
            response: Ok(response),
        });
        self
    }

    pub fn post(mut self, url: &str, response: Value) -> Self {
        self.routes.push(Route {
            url: url.into(),
            rpc_method: None,
            response: Ok(response),
        });
        self
    }

    pub fn rpc(mut self, url: &str, method: &str, result: Value) -> Self {
        self.routes.push(Route {
            url: url.into(),
            rpc_method: Some(method.into()),
            response: Ok(json!({"jsonrpc": "2.0", "id": 1, "result": result})),
        });
        self
    }

    pub fn rpc_error(mut self, url: &str, method: &str, code: i64, message: &str) -> Self {
        self.routes.push(Route {
            url: url.into(),
            rpc_method: Some(method.into()),
            response: Ok(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": code, "message": message}
            })),
        });
        self
    }

    /// 该 URL 的所有请求都以 `error` 失败
    pub fn down(mut self, url: &str, error: NetworkError) -> Self {
        self.routes.push(Route {
            url: url.into(),
            rpc_method: None,
            response: Err(error),
        });
        self
    }

    pub fn requests(&self) -> Vec<(String, Option<Value>)> {
        self.requests.lock().unwrap().clone()
    }

    /// 发往 `url` 的 JSON-RPC 方法名，按请求顺序
    pub fn rpc_methods(&self, url: &str) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|(u, _)| u == url)
            .filter_map(|(_, body)| body?.get("method")?.as_str().map(str::to_string))
            .collect()
    }

    fn respond(&self, url: &str, body: Option<&Value>) -> std::result::Result<Value, NetworkError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), body.cloned()));
        let method = body.and_then(|b| b.get("method")).and_then(Value::as_str);
        self.routes
            .iter()
            .find(|r| r.url == url && (r.rpc_method.is_none() || r.rpc_method.as_deref() == method))
            .map(|r| r.response.clone())
            .unwrap_or_else(|| {
                Err(NetworkError::HttpStatus {
                    host: url.to_string(),
                    status: 404,
                })
            })
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get_json(&self, url: &str) -> std::result::Result<Value, NetworkError> {
        self.respond(url, None)
    }

    async fn post_json(&self, url: &str, body: &Value) -> std::result::Result<Value, NetworkError> {
        self.respond(url, Some(body))
    }
}

pub fn unreachable(host: &str) -> NetworkError {
    NetworkError::Unreachable {
        host: host.to_string(),
        message: "connection refused".into(),
    }
}

/// 只配置给定链节点的工厂
pub fn factory_with(
    hosts: &[(Blockchain, Vec<&str>)],
    transport: Arc<ScriptedTransport>,
) -> WalletManagerFactory {
    let mut config = SdkConfig::default();
    config.hosts.0.clear();
    for (blockchain, urls) in hosts {
        config
            .hosts
            .set(blockchain, urls.iter().map(|u| u.to_string()).collect());
    }
    WalletManagerFactory::new(config, transport)
}

/// 持有固定私钥的软件签名器
pub enum KeySigner {
    Secp256k1(k256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl KeySigner {
    pub fn secp256k1(seed: u8) -> Self {
        Self::Secp256k1(k256::ecdsa::SigningKey::from_slice(&[seed; 32]).unwrap())
    }

    pub fn ed25519(seed: u8) -> Self {
        Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&[seed; 32]))
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Secp256k1(key) => PublicKey::new(
                key.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
                EllipticCurve::Secp256k1,
            )
            .unwrap(),
            Self::Ed25519(key) => PublicKey::new(
                key.verifying_key().as_bytes().to_vec(),
                EllipticCurve::Ed25519,
            )
            .unwrap(),
        }
    }
}

#[async_trait]
impl TransactionSigner for KeySigner {
    async fn sign(&self, hashes: &[Vec<u8>], _public_key: &PublicKey) -> Result<Vec<Signature>> {
        hashes
            .iter()
            .map(|hash| {
                let bytes = match self {
                    Self::Secp256k1(key) => {
                        let (sig, _) = key
                            .sign_prehash_recoverable(hash)
                            .map_err(|e| WalletError::Signer(e.to_string()))?;
                        sig.to_bytes().to_vec()
                    }
                    Self::Ed25519(key) => {
                        use ed25519_dalek::Signer;
                        key.sign(hash).to_bytes().to_vec()
                    }
                };
                Signature::new(bytes)
            })
            .collect()
    }
}

/// 用户在设备上拒绝签名
pub struct RejectingSigner;

#[async_trait]
impl TransactionSigner for RejectingSigner {
    async fn sign(&self, _hashes: &[Vec<u8>], _public_key: &PublicKey) -> Result<Vec<Signature>> {
        Err(WalletError::SignerCancelled)
    }
}
