//! 链上金额
//!
//! 不同链或不同类型的金额之间做运算属于编程错误，直接返回错误而不是隐式转换。

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Blockchain;
use crate::error::{Result, WalletError};

/// 代币
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub symbol: String,
    pub contract_address: String,
    pub decimal_count: u32,
}

/// 金额类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountType {
    /// 原生币
    Coin,
    Token(Token),
    /// 手续费资源（如 Koinos 的 mana）
    FeeResource(String),
    /// 账户激活保留金（XRP）
    Reserve,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub blockchain: Blockchain,
    pub amount_type: AmountType,
    pub value: Decimal,
}

impl Amount {
    pub fn new(blockchain: Blockchain, amount_type: AmountType, value: Decimal) -> Self {
        Self {
            blockchain,
            amount_type,
            value,
        }
    }

    pub fn coin(blockchain: Blockchain, value: Decimal) -> Self {
        Self::new(blockchain, AmountType::Coin, value)
    }

    pub fn zero_coin(blockchain: Blockchain) -> Self {
        Self::coin(blockchain, Decimal::ZERO)
    }

    pub fn token(blockchain: Blockchain, token: Token, value: Decimal) -> Self {
        Self::new(blockchain, AmountType::Token(token), value)
    }

    /// 由最小单位（satoshi、wei、drops、motes）构造
    pub fn from_smallest_unit(
        blockchain: Blockchain,
        amount_type: AmountType,
        units: u128,
    ) -> Result<Self> {
        let decimals = decimals_of(&blockchain, &amount_type);
        let units = i128::try_from(units)
            .map_err(|_| WalletError::InvalidAmount(format!("{} units overflow", units)))?;
        let value = Decimal::try_from_i128_with_scale(units, decimals)
            .map_err(|e| WalletError::InvalidAmount(e.to_string()))?;
        Ok(Self::new(blockchain, amount_type, value.normalize()))
    }

    pub fn decimals(&self) -> u32 {
        decimals_of(&self.blockchain, &self.amount_type)
    }

    /// 转换为最小单位；负数或超出精度时报错
    pub fn to_smallest_unit(&self) -> Result<u128> {
        if self.value.is_sign_negative() && !self.value.is_zero() {
            return Err(WalletError::InvalidAmount(format!(
                "negative amount {}",
                self.value
            )));
        }
        let scale = 10u128
            .checked_pow(self.decimals())
            .and_then(|s| i128::try_from(s).ok())
            .ok_or_else(|| WalletError::InvalidAmount("decimal count too large".into()))?;
        let mantissa = self.value.mantissa();
        let value_scale = self.value.scale();
        // value = mantissa / 10^value_scale
        if value_scale > self.decimals() {
            let divisor = 10i128.pow(value_scale - self.decimals());
            if mantissa % divisor != 0 {
                return Err(WalletError::InvalidAmount(format!(
                    "{} has more than {} decimal places",
                    self.value,
                    self.decimals()
                )));
            }
            return u128::try_from(mantissa / divisor)
                .map_err(|_| WalletError::InvalidAmount(self.value.to_string()));
        }
        let factor = scale / 10i128.pow(value_scale);
        mantissa
            .checked_mul(factor)
            .and_then(|v| u128::try_from(v).ok())
            .ok_or_else(|| WalletError::InvalidAmount(format!("{} overflows", self.value)))
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    fn ensure_compatible(&self, other: &Amount) -> Result<()> {
        if self.blockchain != other.blockchain {
            return Err(WalletError::AmountMismatch(format!(
                "{} vs {}",
                self.blockchain, other.blockchain
            )));
        }
        if self.amount_type != other.amount_type {
            return Err(WalletError::AmountMismatch(format!(
                "{:?} vs {:?}",
                self.amount_type, other.amount_type
            )));
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount> {
        self.ensure_compatible(other)?;
        let value = self
            .value
            .checked_add(other.value)
            .ok_or_else(|| WalletError::InvalidAmount("addition overflow".into()))?;
        Ok(Self::new(self.blockchain, self.amount_type.clone(), value))
    }

    /// 结果允许为负，调用方据此判断余额是否足够
    pub fn checked_sub(&self, other: &Amount) -> Result<Amount> {
        self.ensure_compatible(other)?;
        let value = self
            .value
            .checked_sub(other.value)
            .ok_or_else(|| WalletError::InvalidAmount("subtraction overflow".into()))?;
        Ok(Self::new(self.blockchain, self.amount_type.clone(), value))
    }

    /// 转为 f64 仅用于展示
    pub fn to_f64_lossy(&self) -> f64 {
        self.value.to_f64().unwrap_or_default()
    }
}

fn decimals_of(blockchain: &Blockchain, amount_type: &AmountType) -> u32 {
    match amount_type {
        AmountType::Token(token) => token.decimal_count,
        _ => blockchain.decimal_count(),
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match &self.amount_type {
            AmountType::Token(token) => token.symbol.as_str(),
            AmountType::FeeResource(name) => name.as_str(),
            _ => self.blockchain.currency_symbol(),
        };
        write!(f, "{} {}", self.value.normalize(), symbol)
    }
}
