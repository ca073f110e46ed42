//! Casper：固定手续费，部署时间戳在构造交易时确定

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::address::AddressServiceFactory;
use crate::crypto::PublicKey;
use crate::domain::{
    Amount, AmountType, Blockchain, Fee, FeeParameters, SignedTransaction, Token, Transaction,
    TransactionParams,
};
use crate::error::{Result, WalletError};
use crate::network::{CasperJsonRpcProvider, CasperNetworkProvider, HostFallback};
use crate::transaction::casper::TRANSFER_FEE_MOTES;
use crate::transaction::{CasperTransactionBuilder, TransactionBuilder};
use crate::wallet::adapters::providers_for;
use crate::wallet::{
    ChainAdapter, ChainRegistration, ChainSnapshot, ChainWalletManager, FactoryContext,
    WalletManager,
};

pub struct CasperAdapter {
    blockchain: Blockchain,
    public_key: PublicKey,
    providers: HostFallback<dyn CasperNetworkProvider>,
}

impl CasperAdapter {
    pub fn new(
        blockchain: Blockchain,
        public_key: PublicKey,
        providers: HostFallback<dyn CasperNetworkProvider>,
    ) -> Result<Self> {
        CasperTransactionBuilder::new(blockchain, public_key.clone())?;
        Ok(Self {
            blockchain,
            public_key,
            providers,
        })
    }

    async fn balance_motes(&self, address: &str) -> Result<u128> {
        let account = address.to_lowercase();
        let account = account.as_str();
        self.providers
            .execute(|p| async move { p.get_balance(account).await })
            .await
    }

    fn motes(&self, value: u128) -> Result<Amount> {
        Amount::from_smallest_unit(self.blockchain, AmountType::Coin, value)
    }
}

pub fn supports(blockchain: &Blockchain) -> bool {
    matches!(blockchain, Blockchain::Casper { .. })
}

fn make(
    context: &FactoryContext,
    blockchain: Blockchain,
    public_key: PublicKey,
) -> Result<Arc<dyn WalletManager>> {
    let transport = context.transport();
    let providers = providers_for(context, blockchain, |host| {
        Arc::new(CasperJsonRpcProvider::new(host, transport.clone())) as Arc<dyn CasperNetworkProvider>
    })?;
    let adapter = CasperAdapter::new(blockchain, public_key.clone(), providers)?;
    let manager = ChainWalletManager::new(adapter, public_key, AddressServiceFactory::make(blockchain)?)?;
    Ok(Arc::new(manager))
}

pub fn registration() -> ChainRegistration {
    ChainRegistration {
        name: "casper",
        supports,
        make,
    }
}

fn now_params() -> TransactionParams {
    TransactionParams::Casper {
        timestamp_ms: u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default(),
        transfer_id: None,
    }
}

#[async_trait]
impl ChainAdapter for CasperAdapter {
    type State = ();

    fn blockchain(&self) -> Blockchain {
        self.blockchain
    }

    async fn fetch(&self, address: &str, _tokens: &[Token]) -> Result<ChainSnapshot<()>> {
        let balance = self.balance_motes(address).await?;
        Ok(ChainSnapshot {
            amounts: vec![self.motes(balance)?],
            pending: Vec::new(),
            has_unconfirmed: false,
            state: (),
        })
    }

    async fn get_fee(
        &self,
        amount: &Amount,
        source: &str,
        _destination: &str,
        _state: Option<&()>,
    ) -> Result<Vec<Fee>> {
        // 未激活账户（purse not found）余额按 0 处理，估费照常返回
        let balance = self.balance_motes(source).await?;
        let fee = u128::from(TRANSFER_FEE_MOTES);
        let required = amount.to_smallest_unit()?.saturating_add(fee);
        if balance < required {
            tracing::debug!(
                chain = %self.blockchain,
                balance = %balance,
                required = %required,
                "Balance does not cover amount and fee"
            );
        }
        Ok(vec![Fee::new(
            self.motes(fee)?,
            FeeParameters::Casper {
                motes: TRANSFER_FEE_MOTES,
            },
        )])
    }

    fn default_params(&self) -> TransactionParams {
        now_params()
    }

    fn prepare(&self, _state: &(), transaction: Transaction) -> Result<Transaction> {
        match &transaction.params {
            TransactionParams::Casper { .. } => {}
            TransactionParams::None => return Ok(transaction.with_params(now_params())),
            other => {
                return Err(WalletError::invalid_transaction(format!(
                    "unexpected parameters {:?} for {}",
                    other, self.blockchain
                )))
            }
        }
        Ok(transaction)
    }

    fn builder(&self, _state: &()) -> Result<Box<dyn TransactionBuilder>> {
        Ok(Box::new(CasperTransactionBuilder::new(
            self.blockchain,
            self.public_key.clone(),
        )?))
    }

    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
        let params: serde_json::Value = serde_json::from_slice(&signed.payload)
            .map_err(|e| WalletError::InvalidEncoding(format!("deploy json: {}", e)))?;
        let params = &params;
        self.providers
            .execute(|p| async move { p.put_deploy(params.clone()).await })
            .await
    }
}
