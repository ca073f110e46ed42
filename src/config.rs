//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::Blockchain;

/// SDK 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SdkConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub hosts: HostsConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

/// HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

/// 节点列表：网络 ID -> 有序节点地址（第一个优先）
///
/// 测试网的键为 `<network_id>-testnet`，例如 `casper-network-testnet`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostsConfig(pub BTreeMap<String, Vec<String>>);

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: std::env::var("SDK_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            connect_timeout_secs: std::env::var("SDK_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            user_agent: std::env::var("SDK_USER_AGENT")
                .unwrap_or_else(|_| concat!("ironcore-chains/", env!("CARGO_PKG_VERSION")).into()),
        }
    }
}

/// 内置公共节点
const DEFAULT_HOSTS: &[(&str, &[&str])] = &[
    ("dash", &["https://insight.dash.org/insight-api"]),
    ("ravencoin", &["https://api.ravencoin.org/api", "https://ravencoin.network/api"]),
    ("ethereum", &["https://eth.llamarpc.com", "https://rpc.ankr.com/eth"]),
    ("ethereum-testnet", &["https://rpc.sepolia.org"]),
    ("bsc", &["https://bsc-dataseed.binance.org", "https://bsc-dataseed1.defibit.io"]),
    ("bsc-testnet", &["https://data-seed-prebsc-1-s1.binance.org:8545"]),
    ("polygon", &["https://polygon-rpc.com", "https://rpc.ankr.com/polygon"]),
    ("polygon-testnet", &["https://rpc-amoy.polygon.technology"]),
    ("decimal", &["https://node.decimalchain.com/web3/"]),
    ("xrp", &["https://xrplcluster.com", "https://s1.ripple.com:51234"]),
    ("casper-network", &["https://rpc.mainnet.casperlabs.io/rpc"]),
    ("casper-network-testnet", &["https://rpc.testnet.casperlabs.io/rpc"]),
];

impl Default for HostsConfig {
    fn default() -> Self {
        let mut hosts: BTreeMap<String, Vec<String>> = DEFAULT_HOSTS
            .iter()
            .map(|(key, urls)| (key.to_string(), urls.iter().map(|u| u.to_string()).collect()))
            .collect();

        // SDK_HOSTS_<KEY>=https://a,https://b
        let keys: Vec<String> = Blockchain::all_network_keys();
        for key in keys {
            let var = format!("SDK_HOSTS_{}", key.to_uppercase().replace('-', "_"));
            if let Ok(value) = std::env::var(&var) {
                let urls: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                if !urls.is_empty() {
                    hosts.insert(key, urls);
                }
            }
        }
        Self(hosts)
    }
}

impl HostsConfig {
    pub fn key_for(blockchain: &Blockchain) -> String {
        if blockchain.is_testnet() {
            format!("{}-testnet", blockchain.network_id())
        } else {
            blockchain.network_id().to_string()
        }
    }

    pub fn hosts_for(&self, blockchain: &Blockchain) -> &[String] {
        self.0
            .get(&Self::key_for(blockchain))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn set(&mut self, blockchain: &Blockchain, hosts: Vec<String>) {
        self.0.insert(Self::key_for(blockchain), hosts);
    }

    /// `other` 中出现的网络覆盖当前值
    pub fn merge(&mut self, other: HostsConfig) {
        self.0.extend(other.0);
    }
}

impl SdkConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            logging: LoggingConfig::default(),
            network: NetworkConfig::default(),
            hosts: HostsConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let mut config: SdkConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        // 文件只需列出要覆盖的网络
        let mut hosts = HostsConfig::default();
        hosts.merge(std::mem::take(&mut config.hosts));
        config.hosts = hosts;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if self.network.request_timeout_secs == 0 || self.network.connect_timeout_secs == 0 {
            anyhow::bail!("network timeouts must be positive");
        }

        for (network, urls) in &self.hosts.0 {
            if urls.is_empty() {
                anyhow::bail!("no hosts configured for {}", network);
            }
            if let Some(bad) = urls
                .iter()
                .find(|u| !u.starts_with("https://") && !u.starts_with("http://"))
            {
                anyhow::bail!("host {} for {} must start with http:// or https://", bad, network);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_config_from_env() {
        let config = SdkConfig::from_env().unwrap();
        assert!(config.network.request_timeout_secs > 0);
        assert!(!config
            .hosts
            .hosts_for(&Blockchain::Xrp {
                curve: crate::crypto::EllipticCurve::Secp256k1
            })
            .is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[logging]
level = "debug"
format = "json"

[network]
request_timeout_secs = 5
connect_timeout_secs = 2
user_agent = "test"

[hosts]
dogecoin = ["https://doge-a.example", "https://doge-b.example"]
"#
        )
        .unwrap();

        let config = SdkConfig::from_file(file.path()).unwrap();
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.network.request_timeout_secs, 5);
        assert_eq!(
            config.hosts.hosts_for(&Blockchain::Dogecoin),
            &["https://doge-a.example", "https://doge-b.example"]
        );
        // 未列出的网络保留内置节点
        assert!(!config
            .hosts
            .hosts_for(&Blockchain::Ethereum { testnet: false })
            .is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hosts_env_override() {
        std::env::set_var("SDK_HOSTS_RAVENCOIN_TESTNET", "https://rvn-1.example, https://rvn-2.example");
        let hosts = HostsConfig::default();
        assert_eq!(
            hosts.hosts_for(&Blockchain::Ravencoin { testnet: true }),
            &["https://rvn-1.example", "https://rvn-2.example"]
        );
        std::env::remove_var("SDK_HOSTS_RAVENCOIN_TESTNET");
    }

    #[test]
    fn test_config_validation() {
        let mut config = SdkConfig::from_env().unwrap();
        config.logging.level = "verbose".into();
        assert!(config.validate().is_err());

        let mut config = SdkConfig::from_env().unwrap();
        config.hosts.set(&Blockchain::Dogecoin, vec!["ftp://doge".into()]);
        assert!(config.validate().is_err());

        let mut config = SdkConfig::from_env().unwrap();
        config.hosts.set(&Blockchain::Dogecoin, vec![]);
        assert!(config.validate().is_err());
    }
}
