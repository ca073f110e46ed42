//! UTXO 链（Bitcoin、Litecoin、Dogecoin、Dash、Ravencoin），节点为 insight API

use std::sync::Arc;

use async_trait::async_trait;

use crate::address::AddressServiceFactory;
use crate::crypto::PublicKey;
use crate::domain::{Amount, AmountType, Blockchain, Fee, FeeParameters, SignedTransaction, Token, TransactionParams};
use crate::error::{Result, WalletError};
use crate::network::{HostFallback, InsightProvider, UtxoNetworkProvider};
use crate::transaction::utxo::{UnspentOutput, UtxoTransactionBuilder};
use crate::transaction::{to_u64, TransactionBuilder};
use crate::wallet::adapters::providers_for;
use crate::wallet::{
    ChainAdapter, ChainRegistration, ChainSnapshot, ChainWalletManager, FactoryContext,
    WalletManager,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UtxoState {
    pub unspents: Vec<UnspentOutput>,
}

pub struct UtxoAdapter {
    blockchain: Blockchain,
    public_key: PublicKey,
    providers: HostFallback<dyn UtxoNetworkProvider>,
}

impl UtxoAdapter {
    pub fn new(
        blockchain: Blockchain,
        public_key: PublicKey,
        providers: HostFallback<dyn UtxoNetworkProvider>,
    ) -> Result<Self> {
        // 提前校验链与公钥
        UtxoTransactionBuilder::new(blockchain, public_key.clone())?;
        Ok(Self {
            blockchain,
            public_key,
            providers,
        })
    }

    fn transaction_builder(&self, unspents: Vec<UnspentOutput>) -> Result<UtxoTransactionBuilder> {
        Ok(UtxoTransactionBuilder::new(self.blockchain, self.public_key.clone())?.with_unspents(unspents))
    }
}

pub fn supports(blockchain: &Blockchain) -> bool {
    matches!(
        blockchain,
        Blockchain::Bitcoin { .. }
            | Blockchain::Litecoin
            | Blockchain::Dogecoin
            | Blockchain::Dash { .. }
            | Blockchain::Ravencoin { .. }
    )
}

fn make(
    context: &FactoryContext,
    blockchain: Blockchain,
    public_key: PublicKey,
) -> Result<Arc<dyn WalletManager>> {
    let transport = context.transport();
    let providers = providers_for(context, blockchain, |host| {
        Arc::new(InsightProvider::new(host, transport.clone(), blockchain)) as Arc<dyn UtxoNetworkProvider>
    })?;
    let adapter = UtxoAdapter::new(blockchain, public_key.clone(), providers)?;
    let manager = ChainWalletManager::new(adapter, public_key, AddressServiceFactory::make(blockchain)?)?;
    Ok(Arc::new(manager))
}

pub fn registration() -> ChainRegistration {
    ChainRegistration {
        name: "utxo",
        supports,
        make,
    }
}

#[async_trait]
impl ChainAdapter for UtxoAdapter {
    type State = UtxoState;

    fn blockchain(&self) -> Blockchain {
        self.blockchain
    }

    async fn fetch(&self, address: &str, _tokens: &[Token]) -> Result<ChainSnapshot<UtxoState>> {
        let info = self
            .providers
            .execute(|p| async move { p.get_info(address).await })
            .await?;

        let balance = Amount::from_smallest_unit(self.blockchain, AmountType::Coin, u128::from(info.balance_sat))?;
        Ok(ChainSnapshot {
            amounts: vec![balance],
            pending: info.pending,
            has_unconfirmed: info.has_unconfirmed,
            state: UtxoState {
                unspents: info.unspents,
            },
        })
    }

    async fn get_fee(
        &self,
        amount: &Amount,
        source: &str,
        destination: &str,
        state: Option<&UtxoState>,
    ) -> Result<Vec<Fee>> {
        if amount.amount_type != AmountType::Coin {
            return Err(WalletError::invalid_transaction(
                "only coin transfers are supported on UTXO chains",
            ));
        }
        let amount_sat = to_u64(amount.to_smallest_unit()?, "amount")?;

        let unspents = match state {
            Some(state) => state.unspents.clone(),
            None => {
                self.providers
                    .execute(|p| async move { p.get_info(source).await })
                    .await?
                    .unspents
            }
        };
        let rates = self
            .providers
            .execute(|p| async move { p.get_fee_rates().await })
            .await?;

        let builder = self.transaction_builder(unspents)?;
        [rates.minimal, rates.normal, rates.priority]
            .into_iter()
            .map(|sat_per_byte| -> Result<Fee> {
                let fee = builder.calculate_fee(amount_sat, destination, sat_per_byte)?;
                Ok(Fee::new(
                    Amount::from_smallest_unit(self.blockchain, AmountType::Coin, u128::from(fee))?,
                    FeeParameters::Utxo { sat_per_byte },
                ))
            })
            .collect()
    }

    fn default_params(&self) -> TransactionParams {
        TransactionParams::Utxo { lock_time: 0 }
    }

    fn builder(&self, state: &UtxoState) -> Result<Box<dyn TransactionBuilder>> {
        Ok(Box::new(self.transaction_builder(state.unspents.clone())?))
    }

    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
        let raw = signed.payload_hex();
        let raw = raw.as_str();
        self.providers
            .execute(|p| async move { p.send(raw).await })
            .await
    }
}
