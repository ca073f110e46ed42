//! XRP Ledger

use std::sync::Arc;

use async_trait::async_trait;

use crate::address::AddressServiceFactory;
use crate::crypto::PublicKey;
use crate::domain::{
    Amount, AmountType, Blockchain, Fee, FeeParameters, SignedTransaction, Token, Transaction,
    TransactionParams,
};
use crate::error::{Result, WalletError};
use crate::network::{HostFallback, XrpJsonRpcProvider, XrpNetworkProvider};
use crate::transaction::{TransactionBuilder, XrpTransactionBuilder};
use crate::wallet::adapters::providers_for;
use crate::wallet::{
    ChainAdapter, ChainRegistration, ChainSnapshot, ChainWalletManager, FactoryContext,
    WalletManager,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrpState {
    pub sequence: u32,
}

pub struct XrpAdapter {
    blockchain: Blockchain,
    public_key: PublicKey,
    providers: HostFallback<dyn XrpNetworkProvider>,
}

impl XrpAdapter {
    pub fn new(
        blockchain: Blockchain,
        public_key: PublicKey,
        providers: HostFallback<dyn XrpNetworkProvider>,
    ) -> Result<Self> {
        XrpTransactionBuilder::new(blockchain, public_key.clone())?;
        Ok(Self {
            blockchain,
            public_key,
            providers,
        })
    }

    fn drops(&self, value: u64) -> Result<Amount> {
        Amount::from_smallest_unit(self.blockchain, AmountType::Coin, u128::from(value))
    }
}

pub fn supports(blockchain: &Blockchain) -> bool {
    matches!(blockchain, Blockchain::Xrp { .. })
}

fn make(
    context: &FactoryContext,
    blockchain: Blockchain,
    public_key: PublicKey,
) -> Result<Arc<dyn WalletManager>> {
    let transport = context.transport();
    let providers = providers_for(context, blockchain, |host| {
        Arc::new(XrpJsonRpcProvider::new(host, transport.clone())) as Arc<dyn XrpNetworkProvider>
    })?;
    let adapter = XrpAdapter::new(blockchain, public_key.clone(), providers)?;
    let manager = ChainWalletManager::new(adapter, public_key, AddressServiceFactory::make(blockchain)?)?;
    Ok(Arc::new(manager))
}

pub fn registration() -> ChainRegistration {
    ChainRegistration {
        name: "xrp",
        supports,
        make,
    }
}

#[async_trait]
impl ChainAdapter for XrpAdapter {
    type State = XrpState;

    fn blockchain(&self) -> Blockchain {
        self.blockchain
    }

    async fn fetch(&self, address: &str, _tokens: &[Token]) -> Result<ChainSnapshot<XrpState>> {
        let (info, reserve) = futures::try_join!(
            self.providers
                .execute(|p| async move { p.get_account_info(address).await }),
            self.providers.execute(|p| async move { p.get_reserve().await }),
        )?;

        Ok(ChainSnapshot {
            amounts: vec![
                self.drops(info.balance_drops)?,
                Amount::new(self.blockchain, AmountType::Reserve, reserve),
            ],
            pending: Vec::new(),
            has_unconfirmed: false,
            state: XrpState {
                sequence: info.sequence,
            },
        })
    }

    async fn get_fee(
        &self,
        _amount: &Amount,
        _source: &str,
        _destination: &str,
        _state: Option<&XrpState>,
    ) -> Result<Vec<Fee>> {
        let fee = self
            .providers
            .execute(|p| async move { p.get_fee().await })
            .await?;
        [fee.minimal, fee.normal, fee.priority]
            .into_iter()
            .map(|drops| -> Result<Fee> {
                Ok(Fee::new(self.drops(drops)?, FeeParameters::Xrp { drops }))
            })
            .collect()
    }

    fn default_params(&self) -> TransactionParams {
        TransactionParams::Xrp {
            destination_tag: None,
            sequence: None,
        }
    }

    fn prepare(&self, state: &XrpState, transaction: Transaction) -> Result<Transaction> {
        let params = match transaction.params {
            TransactionParams::Xrp {
                destination_tag,
                sequence,
            } => TransactionParams::Xrp {
                destination_tag,
                sequence: sequence.or(Some(state.sequence)),
            },
            TransactionParams::None => TransactionParams::Xrp {
                destination_tag: None,
                sequence: Some(state.sequence),
            },
            ref other => {
                return Err(WalletError::invalid_transaction(format!(
                    "unexpected parameters {:?} for {}",
                    other, self.blockchain
                )))
            }
        };
        Ok(transaction.with_params(params))
    }

    fn builder(&self, _state: &XrpState) -> Result<Box<dyn TransactionBuilder>> {
        Ok(Box::new(XrpTransactionBuilder::new(
            self.blockchain,
            self.public_key.clone(),
        )?))
    }

    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
        let blob = signed.payload_hex();
        let blob = blob.as_str();
        self.providers
            .execute(|p| async move { p.submit(blob).await })
            .await
    }
}
