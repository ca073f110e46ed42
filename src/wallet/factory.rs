//! 钱包管理器工厂
//!
//! 每条链通过一个 [`ChainRegistration`] 登记；新增链只需新增一个适配器模块
//! 并调用 [`WalletManagerFactory::register`]，不需要修改已有链的代码。

use std::sync::Arc;

use crate::config::{HostsConfig, SdkConfig};
use crate::crypto::PublicKey;
use crate::domain::Blockchain;
use crate::error::{NetworkError, Result, WalletError};
use crate::network::{HttpTransport, ReqwestTransport};
use crate::wallet::adapters;
use crate::wallet::WalletManager;

/// 构造函数可用的共享资源
pub struct FactoryContext {
    config: SdkConfig,
    transport: Arc<dyn HttpTransport>,
}

impl FactoryContext {
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.transport)
    }

    /// 该链配置的节点；为空时返回 [`NetworkError::NoHosts`]
    pub fn hosts(&self, blockchain: Blockchain) -> Result<&[String]> {
        let hosts = self.config.hosts.hosts_for(&blockchain);
        if hosts.is_empty() {
            return Err(NetworkError::NoHosts {
                network: HostsConfig::key_for(&blockchain),
            }
            .into());
        }
        Ok(hosts)
    }
}

pub type ManagerConstructor =
    fn(&FactoryContext, Blockchain, PublicKey) -> Result<Arc<dyn WalletManager>>;

/// 一条（或一族）链的登记项
#[derive(Clone, Copy)]
pub struct ChainRegistration {
    pub name: &'static str,
    pub supports: fn(&Blockchain) -> bool,
    pub make: ManagerConstructor,
}

pub struct WalletManagerFactory {
    context: FactoryContext,
    registrations: Vec<ChainRegistration>,
}

impl WalletManagerFactory {
    /// 使用内置的链登记
    pub fn new(config: SdkConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            context: FactoryContext { config, transport },
            registrations: vec![
                adapters::utxo::registration(),
                adapters::ethereum::registration(),
                adapters::casper::registration(),
                adapters::xrp::registration(),
            ],
        }
    }

    /// 使用 reqwest 作为传输层
    pub fn with_reqwest(config: SdkConfig) -> Self {
        let transport = Arc::new(ReqwestTransport::new(&config.network));
        Self::new(config, transport)
    }

    /// 登记新链；后登记的优先
    pub fn register(&mut self, registration: ChainRegistration) {
        tracing::debug!(name = registration.name, "Registering chain");
        self.registrations.push(registration);
    }

    pub fn context(&self) -> &FactoryContext {
        &self.context
    }

    pub fn supports(&self, blockchain: &Blockchain) -> bool {
        self.registrations.iter().any(|r| (r.supports)(blockchain))
    }

    pub fn make_wallet_manager(
        &self,
        blockchain: Blockchain,
        public_key: PublicKey,
    ) -> Result<Arc<dyn WalletManager>> {
        public_key.require_curve(blockchain.supported_curves())?;
        if public_key.curve() != blockchain.curve() {
            return Err(WalletError::CurveMismatch {
                expected: vec![blockchain.curve()],
                actual: public_key.curve(),
            });
        }

        let registration = self
            .registrations
            .iter()
            .rev()
            .find(|r| (r.supports)(&blockchain))
            .ok_or_else(|| WalletError::UnsupportedBlockchain(blockchain.display_name()))?;

        tracing::debug!(
            chain = %blockchain,
            registration = registration.name,
            "Creating wallet manager"
        );
        (registration.make)(&self.context, blockchain, public_key)
    }
}
