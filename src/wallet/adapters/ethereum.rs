//! EVM 链（Ethereum、BSC、Polygon、Decimal）

use std::sync::Arc;

use async_trait::async_trait;

use crate::address::ethereum::EthereumAddressService;
use crate::address::AddressServiceFactory;
use crate::crypto::PublicKey;
use crate::domain::{
    Amount, AmountType, Blockchain, Fee, FeeParameters, SignedTransaction, Token, Transaction,
    TransactionParams,
};
use crate::error::{Result, WalletError};
use crate::network::ethereum::{eip1559_tiers, legacy_tiers};
use crate::network::{EthereumJsonRpcProvider, EthereumNetworkProvider, HostFallback};
use crate::transaction::ethereum::{erc20_transfer_data, parse_evm_address};
use crate::transaction::{EthereumTransactionBuilder, TransactionBuilder};
use crate::wallet::adapters::providers_for;
use crate::wallet::{
    ChainAdapter, ChainRegistration, ChainSnapshot, ChainWalletManager, FactoryContext,
    WalletManager,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthereumState {
    /// 下一笔交易的 nonce（含节点内待打包交易）
    pub nonce: u64,
}

pub struct EthereumAdapter {
    blockchain: Blockchain,
    public_key: PublicKey,
    providers: HostFallback<dyn EthereumNetworkProvider>,
}

impl EthereumAdapter {
    pub fn new(
        blockchain: Blockchain,
        public_key: PublicKey,
        providers: HostFallback<dyn EthereumNetworkProvider>,
    ) -> Result<Self> {
        EthereumTransactionBuilder::new(blockchain, public_key.clone())?;
        Ok(Self {
            blockchain,
            public_key,
            providers,
        })
    }

    /// 节点只认 0x 地址（Decimal 的 d0 地址需要转换）
    fn rpc_address(&self, address: &str) -> Result<String> {
        let bytes = parse_evm_address(self.blockchain, address)?;
        Ok(EthereumAddressService::to_checksum_address(&bytes))
    }

    fn wei(&self, value: u128) -> Result<Amount> {
        Amount::from_smallest_unit(self.blockchain, AmountType::Coin, value)
    }

    /// eth_estimateGas 的调用目标、金额与数据
    fn call_for(&self, amount: &Amount, destination: &str) -> Result<(String, u128, Option<Vec<u8>>)> {
        let value = amount.to_smallest_unit()?;
        match &amount.amount_type {
            AmountType::Coin => Ok((self.rpc_address(destination)?, value, None)),
            AmountType::Token(token) => {
                let to = parse_evm_address(self.blockchain, destination)?;
                Ok((
                    self.rpc_address(&token.contract_address)?,
                    0,
                    Some(erc20_transfer_data(&to, value)),
                ))
            }
            other => Err(WalletError::invalid_transaction(format!(
                "cannot transfer {:?} on {}",
                other, self.blockchain
            ))),
        }
    }
}

pub fn supports(blockchain: &Blockchain) -> bool {
    blockchain.is_evm()
}

fn make(
    context: &FactoryContext,
    blockchain: Blockchain,
    public_key: PublicKey,
) -> Result<Arc<dyn WalletManager>> {
    let transport = context.transport();
    let providers = providers_for(context, blockchain, |host| {
        Arc::new(EthereumJsonRpcProvider::new(host, transport.clone())) as Arc<dyn EthereumNetworkProvider>
    })?;
    let adapter = EthereumAdapter::new(blockchain, public_key.clone(), providers)?;
    let manager = ChainWalletManager::new(adapter, public_key, AddressServiceFactory::make(blockchain)?)?;
    Ok(Arc::new(manager))
}

pub fn registration() -> ChainRegistration {
    ChainRegistration {
        name: "evm",
        supports,
        make,
    }
}

#[async_trait]
impl ChainAdapter for EthereumAdapter {
    type State = EthereumState;

    fn blockchain(&self) -> Blockchain {
        self.blockchain
    }

    async fn fetch(&self, address: &str, tokens: &[Token]) -> Result<ChainSnapshot<EthereumState>> {
        let address = self.rpc_address(address)?;
        let address = address.as_str();

        let (balance, confirmed_nonce, pending_nonce) = futures::try_join!(
            self.providers.execute(|p| async move { p.get_balance(address).await }),
            self.providers
                .execute(|p| async move { p.get_transaction_count(address, false).await }),
            self.providers
                .execute(|p| async move { p.get_transaction_count(address, true).await }),
        )?;

        let mut amounts = vec![self.wei(balance)?];
        for token in tokens {
            let contract = self.rpc_address(&token.contract_address)?;
            let contract = contract.as_str();
            let units = self
                .providers
                .execute(|p| async move { p.get_token_balance(address, contract).await })
                .await?;
            amounts.push(Amount::from_smallest_unit(
                self.blockchain,
                AmountType::Token(token.clone()),
                units,
            )?);
        }

        Ok(ChainSnapshot {
            amounts,
            pending: Vec::new(),
            has_unconfirmed: pending_nonce > confirmed_nonce,
            state: EthereumState {
                nonce: pending_nonce,
            },
        })
    }

    async fn get_fee(
        &self,
        amount: &Amount,
        source: &str,
        destination: &str,
        _state: Option<&EthereumState>,
    ) -> Result<Vec<Fee>> {
        let from = self.rpc_address(source)?;
        let (to, value, data) = self.call_for(amount, destination)?;
        let (from, to, data) = (from.as_str(), to.as_str(), data.as_deref());

        let gas_limit = self
            .providers
            .execute(|p| async move { p.estimate_gas(from, to, value, data).await })
            .await?;

        let base_fee = if self.blockchain.supports_eip1559() {
            self.providers
                .execute(|p| async move { p.get_base_fee().await })
                .await?
        } else {
            None
        };

        let fees = match base_fee {
            Some(base_fee) => {
                let priority_fee = self
                    .providers
                    .execute(|p| async move { p.get_max_priority_fee().await })
                    .await?;
                eip1559_tiers(base_fee, priority_fee)
                    .into_iter()
                    .map(|(max_fee_per_gas, priority_fee)| -> Result<Fee> {
                        Ok(Fee::new(
                            self.wei(max_fee_per_gas.saturating_mul(u128::from(gas_limit)))?,
                            FeeParameters::EthereumEip1559 {
                                gas_limit,
                                max_fee_per_gas,
                                priority_fee,
                            },
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            None => {
                let gas_price = self
                    .providers
                    .execute(|p| async move { p.get_gas_price().await })
                    .await?;
                legacy_tiers(gas_price)
                    .into_iter()
                    .map(|gas_price| -> Result<Fee> {
                        Ok(Fee::new(
                            self.wei(gas_price.saturating_mul(u128::from(gas_limit)))?,
                            FeeParameters::EthereumLegacy {
                                gas_limit,
                                gas_price,
                            },
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };
        Ok(fees)
    }

    fn default_params(&self) -> TransactionParams {
        TransactionParams::Ethereum {
            nonce: None,
            data: None,
        }
    }

    fn prepare(&self, state: &EthereumState, transaction: Transaction) -> Result<Transaction> {
        let params = match transaction.params.clone() {
            TransactionParams::Ethereum { nonce, data } => TransactionParams::Ethereum {
                nonce: nonce.or(Some(state.nonce)),
                data,
            },
            TransactionParams::None => TransactionParams::Ethereum {
                nonce: Some(state.nonce),
                data: None,
            },
            other => {
                return Err(WalletError::invalid_transaction(format!(
                    "unexpected parameters {:?} for {}",
                    other, self.blockchain
                )))
            }
        };
        Ok(transaction.with_params(params))
    }

    fn builder(&self, _state: &EthereumState) -> Result<Box<dyn TransactionBuilder>> {
        Ok(Box::new(EthereumTransactionBuilder::new(
            self.blockchain,
            self.public_key.clone(),
        )?))
    }

    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
        let raw = signed.payload_hex();
        let raw = raw.as_str();
        self.providers
            .execute(|p| async move { p.send_raw(raw).await })
            .await
    }
}
