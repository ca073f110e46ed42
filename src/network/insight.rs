//! Insight REST API（Ravencoin、Dash 等 UTXO 链的公共节点）
//!
//! - `GET  /addr/{address}`           余额与未确认交易数
//! - `GET  /addr/{address}/utxo`      未花费输出
//! - `GET  /txs?address={address}`    交易列表（用于待确认交易）
//! - `GET  /utils/estimatefee?nbBlocks=10`
//! - `POST /tx/send {"rawtx": hex}`

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::domain::{Amount, Blockchain, PendingTransaction, TransactionParams};
use crate::error::{NetworkError, Result};
use crate::network::{decimal_of, field, str_field, trim_host, u64_field, HttpTransport, NetworkProvider};
use crate::transaction::utxo::UnspentOutput;

/// 估算目标区块数
const FEE_TARGET_BLOCKS: u32 = 10;
const BYTES_PER_KB: i64 = 1000;

/// 地址状态
#[derive(Debug, Clone, PartialEq)]
pub struct UtxoAddressInfo {
    pub balance_sat: u64,
    pub unspents: Vec<UnspentOutput>,
    pub pending: Vec<PendingTransaction>,
    /// 节点报告存在未确认交易
    pub has_unconfirmed: bool,
}

/// 费率档位（sat/byte），慢 → 快
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtxoFeeRates {
    pub minimal: u64,
    pub normal: u64,
    pub priority: u64,
}

#[async_trait]
pub trait UtxoNetworkProvider: NetworkProvider {
    async fn get_info(&self, address: &str) -> Result<UtxoAddressInfo>;
    async fn get_fee_rates(&self) -> Result<UtxoFeeRates>;
    /// 广播原始交易，返回交易哈希
    async fn send(&self, raw_hex: &str) -> Result<String>;
}

pub struct InsightProvider {
    host: String,
    transport: Arc<dyn HttpTransport>,
    blockchain: Blockchain,
}

impl InsightProvider {
    pub fn new(host: &str, transport: Arc<dyn HttpTransport>, blockchain: Blockchain) -> Self {
        Self {
            host: trim_host(host),
            transport,
            blockchain,
        }
    }

    fn coin(&self, value: Decimal) -> Amount {
        Amount::coin(self.blockchain, value)
    }

    fn parse_unspent(&self, utxo: &Value) -> Result<UnspentOutput> {
        let txid = str_field(utxo, "txid", &self.host)?;
        let vout = u64_field(utxo, "vout", &self.host)?;
        let satoshis = u64_field(utxo, "satoshis", &self.host)?;
        let script = hex::decode(str_field(utxo, "scriptPubKey", &self.host)?)
            .map_err(|e| NetworkError::malformed(&self.host, format!("bad scriptPubKey: {}", e)))?;
        let index = u32::try_from(vout)
            .map_err(|_| NetworkError::malformed(&self.host, "vout out of range"))?;
        UnspentOutput::new(txid, index, satoshis, script)
    }

    /// 未确认交易 -> PendingTransaction；无法确定对方地址的交易被跳过
    fn parse_pending(&self, tx: &Value, wallet_address: &str) -> Option<PendingTransaction> {
        let confirmations = tx.get("confirmations").and_then(Value::as_i64).unwrap_or(0);
        let block_height = tx.get("blockheight").and_then(Value::as_i64).unwrap_or(-1);
        if confirmations != 0 && block_height != -1 {
            return None;
        }

        let hash = tx.get("txid")?.as_str()?.to_string();
        let inputs = tx.get("vin").and_then(Value::as_array)?;
        let outputs = tx.get("vout").and_then(Value::as_array)?;

        let is_incoming = inputs
            .iter()
            .all(|vin| vin.get("addr").and_then(Value::as_str) != Some(wallet_address));

        let addresses_of = |vout: &Value| -> Vec<String> {
            vout.pointer("/scriptPubKey/addresses")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };
        let output_value = |vout: &Value| -> Decimal {
            vout.get("value").and_then(decimal_of).unwrap_or_default()
        };

        let value: Decimal = outputs
            .iter()
            .filter(|vout| {
                let addresses = addresses_of(vout);
                if is_incoming {
                    addresses.iter().any(|a| a == wallet_address)
                } else {
                    addresses.iter().any(|a| a != wallet_address)
                }
            })
            .map(output_value)
            .sum();

        let other_address = outputs
            .iter()
            .map(addresses_of)
            .find(|addresses| addresses.iter().any(|a| a != wallet_address))
            .and_then(|addresses| addresses.into_iter().next())?;

        let fee = tx.get("fees").and_then(decimal_of).map(|f| self.coin(f));
        let date = tx
            .get("time")
            .and_then(Value::as_i64)
            .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
            .unwrap_or_else(Utc::now);

        let (source, destination) = if is_incoming {
            (other_address, wallet_address.to_string())
        } else {
            (wallet_address.to_string(), other_address)
        };

        Some(PendingTransaction {
            hash,
            source,
            destination,
            value: self.coin(value),
            fee,
            date,
            is_incoming,
            params: TransactionParams::None,
        })
    }

    /// 节点给出的每 KB 费用 -> sat/byte 档位
    fn fee_rates_from_per_kb(&self, per_kb: Decimal) -> Result<UtxoFeeRates> {
        if per_kb <= Decimal::ZERO {
            return Err(NetworkError::malformed(&self.host, "fee estimate unavailable").into());
        }
        // 节点估算偏低，上浮 10%
        let per_byte = per_kb / Decimal::from(BYTES_PER_KB) * Decimal::new(11, 1);
        let satoshi = per_byte * self.blockchain.decimal_value();
        let to_rate = |value: Decimal| value.ceil().to_u64().unwrap_or(u64::MAX).max(1);

        Ok(UtxoFeeRates {
            minimal: to_rate(satoshi),
            normal: to_rate(satoshi * Decimal::from(12) / Decimal::from(10)),
            priority: to_rate(satoshi * Decimal::from(15) / Decimal::from(10)),
        })
    }
}

impl NetworkProvider for InsightProvider {
    fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl UtxoNetworkProvider for InsightProvider {
    async fn get_info(&self, address: &str) -> Result<UtxoAddressInfo> {
        let info_url = format!("{}/addr/{}", self.host, address);
        let utxo_url = format!("{}/addr/{}/utxo", self.host, address);
        let (info, utxos) = futures::try_join!(
            self.transport.get_json(&info_url),
            self.transport.get_json(&utxo_url)
        )?;

        let balance_sat = match info.get("balanceSat") {
            Some(_) => u64_field(&info, "balanceSat", &self.host)?,
            None => {
                let balance = decimal_of(field(&info, "balance", &self.host)?)
                    .ok_or_else(|| NetworkError::malformed(&self.host, "bad balance"))?;
                (balance * self.blockchain.decimal_value())
                    .round()
                    .to_u64()
                    .ok_or_else(|| NetworkError::malformed(&self.host, "bad balance"))?
            }
        };

        let unspents = utxos
            .as_array()
            .ok_or_else(|| NetworkError::malformed(&self.host, "utxo list is not an array"))?
            .iter()
            .map(|utxo| self.parse_unspent(utxo))
            .collect::<Result<Vec<_>>>()?;

        let unconfirmed = info
            .get("unconfirmedTxApperances")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let pending = if unconfirmed != 0 {
            let txs_url = format!("{}/txs?address={}", self.host, address);
            let history = self.transport.get_json(&txs_url).await?;
            field(&history, "txs", &self.host)?
                .as_array()
                .map(|txs| {
                    txs.iter()
                        .filter_map(|tx| self.parse_pending(tx, address))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(UtxoAddressInfo {
            balance_sat,
            unspents,
            pending,
            has_unconfirmed: unconfirmed != 0,
        })
    }

    async fn get_fee_rates(&self) -> Result<UtxoFeeRates> {
        let url = format!(
            "{}/utils/estimatefee?nbBlocks={}",
            self.host, FEE_TARGET_BLOCKS
        );
        let response = self.transport.get_json(&url).await?;
        let per_kb = decimal_of(field(&response, &FEE_TARGET_BLOCKS.to_string(), &self.host)?)
            .ok_or_else(|| NetworkError::malformed(&self.host, "fee estimate is not a number"))?;
        self.fee_rates_from_per_kb(per_kb)
    }

    async fn send(&self, raw_hex: &str) -> Result<String> {
        let url = format!("{}/tx/send", self.host);
        let response = self
            .transport
            .post_json(&url, &json!({ "rawtx": raw_hex }))
            .await
            .map_err(|e| match e {
                // insight 用 400 表示节点拒绝交易
                NetworkError::HttpStatus { host, status: 400 } => NetworkError::Rejected {
                    host,
                    message: "transaction rejected by node".into(),
                },
                other => other,
            })?;
        Ok(str_field(&response, "txid", &self.host)?.to_string())
    }
}
