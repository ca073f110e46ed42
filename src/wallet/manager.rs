//! 通用钱包管理器
//!
//! 并发约束：
//! - `send` 由每个钱包一把互斥锁串行化，避免基于同一 UTXO/nonce 快照重复花费；
//! - `update` 采用后发者胜出：每次刷新领取一个代号，完成时若已有更新的代号则丢弃结果；
//! - 刷新失败不修改快照；
//! - `send` 只使用最近一次成功刷新得到的链状态，广播成功后立即作废该状态。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::address::AddressService;
use crate::crypto::PublicKey;
use crate::domain::{
    Amount, Blockchain, Fee, PendingTransaction, SendResult, SignedTransaction, Token, Transaction,
    TransactionParams,
};
use crate::error::{Result, WalletError};
use crate::transaction::{fee_kind, TransactionBuilder};
use crate::wallet::{
    SendState, TransactionSigner, UpdateOutcome, UpdateState, Wallet, WalletManager,
};

/// 一次刷新从节点得到的数据
#[derive(Debug, Clone)]
pub struct ChainSnapshot<S> {
    pub amounts: Vec<Amount>,
    pub pending: Vec<PendingTransaction>,
    /// 节点报告仍有未确认交易；为 false 时本地记录的待确认交易被清除
    pub has_unconfirmed: bool,
    /// 构建交易所需的链状态（UTXO 集合、nonce、sequence）
    pub state: S,
}

/// 链相关的部分：查询、估费、补全交易参数、构建与广播
#[async_trait]
pub trait ChainAdapter: Send + Sync + 'static {
    type State: Clone + Send + Sync + 'static;

    fn blockchain(&self) -> Blockchain;

    async fn fetch(&self, address: &str, tokens: &[Token]) -> Result<ChainSnapshot<Self::State>>;

    async fn get_fee(
        &self,
        amount: &Amount,
        source: &str,
        destination: &str,
        state: Option<&Self::State>,
    ) -> Result<Vec<Fee>>;

    /// `make_transaction` 未指定参数时使用
    fn default_params(&self) -> TransactionParams {
        TransactionParams::None
    }

    /// 用链状态补全交易（nonce、sequence）
    fn prepare(&self, _state: &Self::State, transaction: Transaction) -> Result<Transaction> {
        Ok(transaction)
    }

    fn builder(&self, state: &Self::State) -> Result<Box<dyn TransactionBuilder>>;

    /// 广播，返回交易哈希
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String>;
}

struct Inner<S> {
    wallet: Wallet,
    chain_state: Option<S>,
    update_state: UpdateState,
    send_state: SendState,
}

pub struct ChainWalletManager<C: ChainAdapter> {
    adapter: C,
    public_key: PublicKey,
    address: String,
    address_service: Arc<dyn AddressService>,
    inner: RwLock<Inner<C::State>>,
    send_lock: Mutex<()>,
    generation: AtomicU64,
}

impl<C: ChainAdapter> ChainWalletManager<C> {
    pub fn new(
        adapter: C,
        public_key: PublicKey,
        address_service: Arc<dyn AddressService>,
    ) -> Result<Self> {
        let addresses = address_service.make_addresses(&public_key)?;
        let wallet = Wallet::new(adapter.blockchain(), addresses);
        Ok(Self {
            adapter,
            public_key,
            address: wallet.address().to_string(),
            address_service,
            inner: RwLock::new(Inner {
                wallet,
                chain_state: None,
                update_state: UpdateState::Idle,
                send_state: SendState::Idle,
            }),
            send_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        })
    }

    pub fn adapter(&self) -> &C {
        &self.adapter
    }

    async fn transition(&self, next: SendState) {
        let mut inner = self.inner.write().await;
        debug_assert!(
            inner.send_state.can_transition_to(&next),
            "illegal send state transition {} -> {}",
            inner.send_state,
            next
        );
        inner.send_state = next;
    }

    fn apply_snapshot(inner: &mut Inner<C::State>, snapshot: ChainSnapshot<C::State>) {
        let wallet = &mut inner.wallet;
        wallet.amounts = snapshot
            .amounts
            .into_iter()
            .map(|amount| (amount.amount_type.clone(), amount))
            .collect();

        // 节点看不到的本地发出交易，在节点仍报告未确认时保留
        let mut pending = snapshot.pending;
        if snapshot.has_unconfirmed {
            let local: Vec<PendingTransaction> = wallet
                .pending_transactions
                .drain(..)
                .filter(|tx| !tx.is_incoming && !pending.iter().any(|p| p.hash == tx.hash))
                .collect();
            pending.extend(local);
        }
        wallet.pending_transactions = pending;
        wallet.last_updated = Some(Utc::now());
        inner.chain_state = Some(snapshot.state);
    }

    async fn build_sign_broadcast(
        &self,
        state: &C::State,
        transaction: Transaction,
        signer: &dyn TransactionSigner,
    ) -> Result<SendResult> {
        let transaction = self.adapter.prepare(state, transaction)?;
        let builder = self.adapter.builder(state)?;
        let hashes = builder.build_for_sign(&transaction)?;

        self.transition(SendState::AwaitingSignature).await;
        let signatures = signer.sign(&hashes, &self.public_key).await?;
        let signed = builder.build_for_send(&transaction, &signatures)?;

        self.transition(SendState::Sending).await;
        let hash = self.adapter.broadcast(&signed).await?;
        Ok(SendResult { hash, signed })
    }
}

#[async_trait]
impl<C: ChainAdapter> WalletManager for ChainWalletManager<C> {
    fn blockchain(&self) -> Blockchain {
        self.adapter.blockchain()
    }

    fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    fn address(&self) -> String {
        self.address.clone()
    }

    async fn wallet_snapshot(&self) -> Wallet {
        self.inner.read().await.wallet.clone()
    }

    async fn update_state(&self) -> UpdateState {
        self.inner.read().await.update_state
    }

    async fn send_state(&self) -> SendState {
        self.inner.read().await.send_state
    }

    async fn update(&self) -> Result<UpdateOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let tokens = {
            let mut inner = self.inner.write().await;
            inner.update_state = UpdateState::Updating;
            inner.wallet.tokens.clone()
        };

        let result = self.adapter.fetch(&self.address, &tokens).await;

        let mut inner = self.inner.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(
                chain = %self.blockchain(),
                generation = generation,
                "Discarding superseded update"
            );
            return Ok(UpdateOutcome::Superseded);
        }
        inner.update_state = UpdateState::Idle;

        match result {
            Ok(snapshot) => {
                Self::apply_snapshot(&mut inner, snapshot);
                tracing::debug!(chain = %self.blockchain(), address = %self.address, "Wallet updated");
                Ok(UpdateOutcome::Applied)
            }
            Err(e) => {
                tracing::warn!(chain = %self.blockchain(), error = ?e, "Wallet update failed");
                Err(e)
            }
        }
    }

    async fn get_fee(&self, amount: &Amount, destination: &str) -> Result<Vec<Fee>> {
        if !self.validate_address(destination) {
            return Err(WalletError::invalid_address(destination));
        }
        let state = self.inner.read().await.chain_state.clone();

        let mut fees = self
            .adapter
            .get_fee(amount, &self.address, destination, state.as_ref())
            .await?;
        Fee::sort_tiers(&mut fees);
        Ok(fees)
    }

    async fn make_transaction(
        &self,
        amount: Amount,
        fee: Fee,
        destination: &str,
        params: Option<TransactionParams>,
    ) -> Result<Transaction> {
        if amount.blockchain != self.blockchain() {
            return Err(WalletError::AmountMismatch(format!(
                "amount is for {}, wallet is {}",
                amount.blockchain,
                self.blockchain()
            )));
        }
        if !self.validate_address(destination) {
            return Err(WalletError::invalid_address(destination));
        }
        let params = params.unwrap_or_else(|| self.adapter.default_params());
        Ok(Transaction::new(amount, fee, self.address.clone(), destination).with_params(params))
    }

    async fn send(
        &self,
        transaction: Transaction,
        signer: &dyn TransactionSigner,
    ) -> Result<SendResult> {
        let _guard = self.send_lock.lock().await;

        let state = {
            let mut inner = self.inner.write().await;
            if !inner.wallet.owns_address(&transaction.source_address) {
                return Err(WalletError::invalid_transaction(format!(
                    "source address {} does not belong to this wallet",
                    transaction.source_address
                )));
            }
            let state = inner.chain_state.clone().ok_or(WalletError::StateOutdated)?;
            debug_assert!(inner.send_state.can_transition_to(&SendState::Building));
            inner.send_state = SendState::Building;
            state
        };

        tracing::debug!(
            chain = %self.blockchain(),
            fee_kind = fee_kind(&transaction.fee.parameters),
            destination = %transaction.destination_address,
            "Sending transaction"
        );

        let result = self.build_sign_broadcast(&state, transaction, signer).await;

        let mut inner = self.inner.write().await;
        match &result {
            Ok(sent) => {
                inner.send_state = SendState::Confirmed;
                // 作废链状态；进行中的刷新也一并作废
                inner.chain_state = None;
                self.generation.fetch_add(1, Ordering::SeqCst);
                inner.update_state = UpdateState::Idle;
                inner
                    .wallet
                    .pending_transactions
                    .push(PendingTransaction::outgoing(&sent.hash, &sent.signed.transaction));
                tracing::info!(chain = %self.blockchain(), hash = %sent.hash, "Transaction sent");
            }
            Err(e) => {
                inner.send_state = SendState::Failed;
                tracing::warn!(
                    chain = %self.blockchain(),
                    error = ?e,
                    category = ?e.category(),
                    "Transaction send failed"
                );
            }
        }
        result
    }

    fn validate_address(&self, address: &str) -> bool {
        self.address_service.validate(address)
    }

    async fn add_token(&self, token: Token) {
        let mut inner = self.inner.write().await;
        if !inner.wallet.tokens.contains(&token) {
            inner.wallet.tokens.push(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    use rust_decimal::Decimal;
    use tokio::sync::oneshot;

    use super::*;
    use crate::address::AddressServiceFactory;
    use crate::crypto::{EllipticCurve, Signature};
    use crate::error::NetworkError;

    const GENERATOR: &str = "0279BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798";
    const DESTINATION: &str = "DNscoo1xY2Vja65mXgNhhsPFUKWMa7NLEb";

    type Reply = Result<ChainSnapshot<u64>>;

    /// 每次 fetch 取出一个等待中的应答，由测试决定何时完成
    #[derive(Default)]
    struct GatedAdapter {
        replies: StdMutex<VecDeque<oneshot::Receiver<Reply>>>,
        started: AtomicUsize,
        broadcasts: StdMutex<Vec<Vec<u8>>>,
        fail_broadcast: bool,
    }

    impl GatedAdapter {
        fn gate(&self) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().unwrap().push_back(rx);
            tx
        }
    }

    struct EchoBuilder {
        nonce: u64,
    }

    impl TransactionBuilder for EchoBuilder {
        fn estimate_size(&self, _transaction: &Transaction) -> Result<usize> {
            Ok(8)
        }

        fn build_for_sign(&self, _transaction: &Transaction) -> Result<Vec<Vec<u8>>> {
            Ok(vec![self.nonce.to_be_bytes().to_vec()])
        }

        fn build_for_send(
            &self,
            transaction: &Transaction,
            signatures: &[Signature],
        ) -> Result<SignedTransaction> {
            let mut payload = self.nonce.to_be_bytes().to_vec();
            payload.extend_from_slice(signatures[0].as_bytes());
            Ok(SignedTransaction::new(payload, transaction.clone()))
        }
    }

    #[async_trait]
    impl ChainAdapter for GatedAdapter {
        type State = u64;

        fn blockchain(&self) -> Blockchain {
            Blockchain::Dogecoin
        }

        async fn fetch(&self, _address: &str, _tokens: &[Token]) -> Result<ChainSnapshot<u64>> {
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no reply scripted");
            self.started.fetch_add(1, Ordering::SeqCst);
            reply.await.expect("gate dropped")
        }

        async fn get_fee(
            &self,
            _amount: &Amount,
            _source: &str,
            _destination: &str,
            _state: Option<&u64>,
        ) -> Result<Vec<Fee>> {
            Ok(vec![fee(3), fee(1), fee(2)])
        }

        fn builder(&self, state: &u64) -> Result<Box<dyn TransactionBuilder>> {
            Ok(Box::new(EchoBuilder { nonce: *state }))
        }

        async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
            if self.fail_broadcast {
                return Err(NetworkError::Timeout {
                    host: "https://doge.example".into(),
                }
                .into());
            }
            self.broadcasts.lock().unwrap().push(signed.payload.clone());
            Ok(format!("hash-{}", self.broadcasts.lock().unwrap().len()))
        }
    }

    struct FixedSigner;

    #[async_trait]
    impl TransactionSigner for FixedSigner {
        async fn sign(&self, hashes: &[Vec<u8>], _key: &PublicKey) -> Result<Vec<Signature>> {
            hashes.iter().map(|_| Signature::new(vec![7u8; 64])).collect()
        }
    }

    struct CancellingSigner;

    #[async_trait]
    impl TransactionSigner for CancellingSigner {
        async fn sign(&self, _hashes: &[Vec<u8>], _key: &PublicKey) -> Result<Vec<Signature>> {
            Err(WalletError::SignerCancelled)
        }
    }

    fn fee(value: i64) -> Fee {
        Fee::simple(Amount::coin(Blockchain::Dogecoin, Decimal::from(value)))
    }

    fn snapshot(balance: i64, nonce: u64) -> ChainSnapshot<u64> {
        ChainSnapshot {
            amounts: vec![Amount::coin(Blockchain::Dogecoin, Decimal::from(balance))],
            pending: Vec::new(),
            has_unconfirmed: false,
            state: nonce,
        }
    }

    fn manager(adapter: GatedAdapter) -> Arc<ChainWalletManager<GatedAdapter>> {
        let key = PublicKey::from_hex(GENERATOR, EllipticCurve::Secp256k1).unwrap();
        let service = AddressServiceFactory::make(Blockchain::Dogecoin).unwrap();
        Arc::new(ChainWalletManager::new(adapter, key, service).unwrap())
    }

    async fn updated(manager: &ChainWalletManager<GatedAdapter>, balance: i64, nonce: u64) {
        let gate = manager.adapter().gate();
        gate.send(Ok(snapshot(balance, nonce))).ok();
        assert_eq!(manager.update().await.unwrap(), UpdateOutcome::Applied);
    }

    async fn transaction(manager: &ChainWalletManager<GatedAdapter>) -> Transaction {
        manager
            .make_transaction(
                Amount::coin(Blockchain::Dogecoin, Decimal::from(1)),
                fee(1),
                DESTINATION,
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_stale_update_is_discarded() {
        let manager = manager(GatedAdapter::default());
        let first_gate = manager.adapter().gate();
        let second_gate = manager.adapter().gate();

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.update().await }
        });
        while manager.adapter().started.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }
        let second = tokio::spawn({
            let manager = manager.clone();
            async move { manager.update().await }
        });
        while manager.adapter().started.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        second_gate.send(Ok(snapshot(20, 2))).ok();
        assert_eq!(second.await.unwrap().unwrap(), UpdateOutcome::Applied);

        // 先发的刷新后完成，结果被丢弃
        first_gate.send(Ok(snapshot(10, 1))).ok();
        assert_eq!(first.await.unwrap().unwrap(), UpdateOutcome::Superseded);

        let wallet = manager.wallet_snapshot().await;
        assert_eq!(wallet.balance().unwrap().value, Decimal::from(20));
        assert_eq!(manager.update_state().await, UpdateState::Idle);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_snapshot() {
        let manager = manager(GatedAdapter::default());
        updated(&manager, 5, 1).await;

        let gate = manager.adapter().gate();
        gate.send(Err(NetworkError::Timeout {
            host: "https://doge.example".into(),
        }
        .into()))
            .ok();
        let err = manager.update().await.unwrap_err();
        assert!(err.is_retryable());

        let wallet = manager.wallet_snapshot().await;
        assert_eq!(wallet.balance().unwrap().value, Decimal::from(5));
        assert_eq!(manager.update_state().await, UpdateState::Idle);
    }

    #[tokio::test]
    async fn test_send_requires_fresh_state() {
        let manager = manager(GatedAdapter::default());
        let tx = transaction(&manager).await;

        // 从未刷新
        let err = manager.send(tx.clone(), &FixedSigner).await.unwrap_err();
        assert_eq!(err, WalletError::StateOutdated);

        updated(&manager, 5, 9).await;
        let sent = manager.send(tx.clone(), &FixedSigner).await.unwrap();
        assert_eq!(sent.hash, "hash-1");
        assert_eq!(&sent.signed.payload[..8], &9u64.to_be_bytes());
        assert_eq!(manager.send_state().await, SendState::Confirmed);

        let wallet = manager.wallet_snapshot().await;
        assert!(wallet.has_pending_outgoing());
        assert_eq!(wallet.pending_transactions[0].hash, "hash-1");

        // 广播成功后链状态作废
        let err = manager.send(tx.clone(), &FixedSigner).await.unwrap_err();
        assert_eq!(err, WalletError::StateOutdated);

        updated(&manager, 4, 10).await;
        let sent = manager.send(tx, &FixedSigner).await.unwrap();
        assert_eq!(&sent.signed.payload[..8], &10u64.to_be_bytes());
    }

    #[tokio::test]
    async fn test_signer_cancel_keeps_state() {
        let manager = manager(GatedAdapter::default());
        updated(&manager, 5, 3).await;
        let tx = transaction(&manager).await;

        let err = manager.send(tx.clone(), &CancellingSigner).await.unwrap_err();
        assert_eq!(err, WalletError::SignerCancelled);
        assert_eq!(manager.send_state().await, SendState::Failed);
        assert!(manager.adapter().broadcasts.lock().unwrap().is_empty());

        // 未广播，状态仍可用
        manager.send(tx, &FixedSigner).await.unwrap();
    }

    #[tokio::test]
    async fn test_broadcast_failure_is_network_error() {
        let manager = manager(GatedAdapter {
            fail_broadcast: true,
            ..Default::default()
        });
        updated(&manager, 5, 3).await;
        let tx = transaction(&manager).await;

        let err = manager.send(tx, &FixedSigner).await.unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Network);
        assert_eq!(manager.send_state().await, SendState::Failed);
    }

    #[tokio::test]
    async fn test_foreign_source_address_rejected() {
        let manager = manager(GatedAdapter::default());
        updated(&manager, 5, 3).await;
        let mut tx = transaction(&manager).await;
        tx.source_address = DESTINATION.to_string();

        let err = manager.send(tx, &FixedSigner).await.unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Build);
    }

    #[tokio::test]
    async fn test_fees_sorted_and_destination_validated() {
        let manager = manager(GatedAdapter::default());
        let amount = Amount::coin(Blockchain::Dogecoin, Decimal::from(1));

        let fees = manager.get_fee(&amount, DESTINATION).await.unwrap();
        assert!(Fee::is_non_decreasing(&fees));
        assert_eq!(fees.len(), 3);

        let err = manager.get_fee(&amount, "DCGx73ispbchmXfNczfp9TtWfKtzgzgp").await.unwrap_err();
        assert_eq!(err.code(), "invalid_address");
    }

    #[tokio::test]
    async fn test_make_transaction_checks_chain() {
        let manager = manager(GatedAdapter::default());
        let err = manager
            .make_transaction(
                Amount::coin(Blockchain::Litecoin, Decimal::from(1)),
                fee(1),
                DESTINATION,
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "amount_mismatch");

        let tx = transaction(&manager).await;
        assert_eq!(tx.source_address, manager.address());
        assert_eq!(tx.change_address, manager.address());
    }
}
