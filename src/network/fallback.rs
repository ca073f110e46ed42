//! 多节点切换
//!
//! 从当前节点开始依次尝试，每个节点最多一次；只有可重试的网络错误
//! 才切换到下一个节点，其余错误原样返回。成功的节点会被记住。

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{NetworkError, Result, WalletError};
use crate::network::NetworkProvider;

pub struct HostFallback<P: ?Sized> {
    providers: Vec<Arc<P>>,
    current: AtomicUsize,
    network: String,
}

impl<P: NetworkProvider + ?Sized> HostFallback<P> {
    pub fn new(network: impl Into<String>, providers: Vec<Arc<P>>) -> Result<Self> {
        let network = network.into();
        if providers.is_empty() {
            return Err(NetworkError::NoHosts { network }.into());
        }
        Ok(Self {
            providers,
            current: AtomicUsize::new(0),
            network,
        })
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// 当前优先使用的节点
    pub fn current_host(&self) -> &str {
        self.providers[self.current.load(Ordering::Relaxed) % self.providers.len()].host()
    }

    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let count = self.providers.len();
        let start = self.current.load(Ordering::Relaxed) % count;
        let mut last_error = None;

        for attempt in 0..count {
            let index = (start + attempt) % count;
            let provider = Arc::clone(&self.providers[index]);

            match op(provider).await {
                Ok(value) => {
                    if index != start {
                        self.current.store(index, Ordering::Relaxed);
                        tracing::info!(
                            network = %self.network,
                            host = %self.providers[index].host(),
                            "Switched to healthy host"
                        );
                    }
                    return Ok(value);
                }
                Err(WalletError::Network(e)) if e.is_retryable() => {
                    tracing::warn!(
                        network = %self.network,
                        host = %self.providers[index].host(),
                        attempt = attempt + 1,
                        error = ?e,
                        "Host request failed"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let last = last_error.unwrap_or(NetworkError::NoHosts {
            network: self.network.clone(),
        });
        if count == 1 {
            return Err(last.into());
        }
        Err(NetworkError::AllHostsFailed {
            attempts: count,
            last: Box::new(last),
        }
        .into())
    }
}
