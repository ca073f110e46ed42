//! 调用方持有的钱包集合，按 [`WalletId`] 索引

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, WalletError};
use crate::wallet::{UpdateOutcome, WalletManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletId(Uuid);

impl WalletId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Default)]
pub struct WalletRegistry {
    wallets: RwLock<HashMap<WalletId, Arc<dyn WalletManager>>>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, manager: Arc<dyn WalletManager>) -> WalletId {
        let id = WalletId::new();
        self.wallets.write().await.insert(id, manager);
        id
    }

    pub async fn get(&self, id: &WalletId) -> Result<Arc<dyn WalletManager>> {
        self.wallets
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| WalletError::WalletNotFound(id.to_string()))
    }

    pub async fn remove(&self, id: &WalletId) -> Result<Arc<dyn WalletManager>> {
        self.wallets
            .write()
            .await
            .remove(id)
            .ok_or_else(|| WalletError::WalletNotFound(id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.wallets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.wallets.read().await.is_empty()
    }

    pub async fn ids(&self) -> Vec<WalletId> {
        self.wallets.read().await.keys().copied().collect()
    }

    /// 并发刷新所有钱包；单个钱包失败不影响其他钱包
    pub async fn update_all(&self) -> Vec<(WalletId, Result<UpdateOutcome>)> {
        let wallets: Vec<(WalletId, Arc<dyn WalletManager>)> = self
            .wallets
            .read()
            .await
            .iter()
            .map(|(id, manager)| (*id, Arc::clone(manager)))
            .collect();

        join_all(wallets.into_iter().map(|(id, manager)| async move {
            let result = manager.update().await;
            (id, result)
        }))
        .await
    }
}
