//! 统一错误类型
//!
//! 错误分五类：输入错误、构建错误、网络错误、签名错误、状态错误。
//! 只有钱包管理层会把底层错误翻译成面向调用方的类别。

use rust_decimal::Decimal;
use thiserror::Error;

use crate::crypto::EllipticCurve;

pub type Result<T, E = WalletError> = std::result::Result<T, E>;

/// 错误类别（面向调用方）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// 地址、金额、公钥等输入不合法
    MalformedInput,
    /// 交易构建阶段失败，未触达网络
    Build,
    /// 节点或网络失败
    Network,
    /// 签名器失败或被取消
    Signer,
    /// 钱包状态不满足操作前提
    State,
}

/// 网络层错误
///
/// 区分可重试（超时、不可达、5xx）与终态（节点明确拒绝）两类。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("request to {host} timed out")]
    Timeout { host: String },

    #[error("host {host} unreachable: {message}")]
    Unreachable { host: String, message: String },

    #[error("host {host} returned HTTP {status}")]
    HttpStatus { host: String, status: u16 },

    #[error("malformed response from {host}: {message}")]
    MalformedResponse { host: String, message: String },

    #[error("rpc error {code} from {host}: {message}")]
    Rpc {
        host: String,
        code: i64,
        message: String,
    },

    #[error("transaction rejected by {host}: {message}")]
    Rejected { host: String, message: String },

    #[error("all {attempts} hosts failed, last error: {last}")]
    AllHostsFailed {
        attempts: usize,
        last: Box<NetworkError>,
    },

    #[error("no hosts configured for {network}")]
    NoHosts { network: String },
}

impl NetworkError {
    /// 是否为瞬时错误（换一个节点或稍后重试可能成功）
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Unreachable { .. } | Self::MalformedResponse { .. } => {
                true
            }
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            Self::Rpc { .. } | Self::Rejected { .. } | Self::NoHosts { .. } => false,
            Self::AllHostsFailed { last, .. } => last.is_retryable(),
        }
    }

    /// 出错的节点地址
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Timeout { host }
            | Self::Unreachable { host, .. }
            | Self::HttpStatus { host, .. }
            | Self::MalformedResponse { host, .. }
            | Self::Rpc { host, .. }
            | Self::Rejected { host, .. } => Some(host),
            Self::AllHostsFailed { last, .. } => last.host(),
            Self::NoHosts { .. } => None,
        }
    }

    pub fn malformed(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            host: host.into(),
            message: message.into(),
        }
    }
}

/// 钱包抽象层统一错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalletError {
    // ━━━ 输入错误 ━━━
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("curve mismatch: expected one of {expected:?}, got {actual}")]
    CurveMismatch {
        expected: Vec<EllipticCurve>,
        actual: EllipticCurve,
    },

    #[error("{operation} is not supported for curve {curve}")]
    UnsupportedCurveOperation {
        curve: EllipticCurve,
        operation: &'static str,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("amount mismatch: {0}")]
    AmountMismatch(String),

    #[error("address type {address_type} is not supported on {blockchain}")]
    UnsupportedAddressType {
        blockchain: String,
        address_type: String,
    },

    // ━━━ 构建错误 ━━━
    #[error("fee for {blockchain} is missing {expected} parameters")]
    MissingFeeParameters {
        blockchain: String,
        expected: &'static str,
    },

    #[error("blockchain {0} is not supported")]
    UnsupportedBlockchain(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("amount {0} is below the dust threshold")]
    Dust(String),

    #[error("unable to select unspent outputs: {0}")]
    CoinSelection(String),

    #[error("expected {expected} signatures, got {actual}")]
    SignatureCountMismatch { expected: usize, actual: usize },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    // ━━━ 网络错误 ━━━
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("account is not activated, reserve of {reserve} required")]
    NoAccount { reserve: Decimal },

    // ━━━ 签名错误 ━━━
    #[error("signing was cancelled")]
    SignerCancelled,

    #[error("signer failed: {0}")]
    Signer(String),

    // ━━━ 状态错误 ━━━
    #[error("wallet state is outdated, call update() before sending")]
    StateOutdated,

    #[error("wallet {0} not found")]
    WalletNotFound(String),
}

impl WalletError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAddress(_)
            | Self::InvalidPublicKey(_)
            | Self::CurveMismatch { .. }
            | Self::UnsupportedCurveOperation { .. }
            | Self::InvalidAmount(_)
            | Self::InvalidEncoding(_)
            | Self::AmountMismatch(_)
            | Self::UnsupportedAddressType { .. } => ErrorCategory::MalformedInput,
            Self::MissingFeeParameters { .. }
            | Self::UnsupportedBlockchain(_)
            | Self::InvalidTransaction(_)
            | Self::InsufficientFunds { .. }
            | Self::Dust(_)
            | Self::CoinSelection(_)
            | Self::SignatureCountMismatch { .. }
            | Self::InvalidSignature(_) => ErrorCategory::Build,
            Self::Network(_) | Self::NoAccount { .. } => ErrorCategory::Network,
            Self::SignerCancelled | Self::Signer(_) => ErrorCategory::Signer,
            Self::StateOutdated | Self::WalletNotFound(_) => ErrorCategory::State,
        }
    }

    /// 稳定的错误码（snake_case）
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "invalid_address",
            Self::InvalidPublicKey(_) => "invalid_public_key",
            Self::CurveMismatch { .. } => "curve_mismatch",
            Self::UnsupportedCurveOperation { .. } => "unsupported_curve_operation",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InvalidEncoding(_) => "invalid_encoding",
            Self::AmountMismatch(_) => "amount_mismatch",
            Self::UnsupportedAddressType { .. } => "unsupported_address_type",
            Self::MissingFeeParameters { .. } => "missing_fee_parameters",
            Self::UnsupportedBlockchain(_) => "chain_not_supported",
            Self::InvalidTransaction(_) => "invalid_transaction",
            Self::InsufficientFunds { .. } => "insufficient_balance",
            Self::Dust(_) => "dust_amount",
            Self::CoinSelection(_) => "coin_selection_failed",
            Self::SignatureCountMismatch { .. } => "signature_count_mismatch",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::Network(NetworkError::Timeout { .. }) => "timeout",
            Self::Network(NetworkError::Rejected { .. }) => "transaction_rejected",
            Self::Network(NetworkError::Rpc { .. }) => "rpc_error",
            Self::Network(_) => "network",
            Self::NoAccount { .. } => "account_not_activated",
            Self::SignerCancelled => "signer_cancelled",
            Self::Signer(_) => "signer_failed",
            Self::StateOutdated => "state_outdated",
            Self::WalletNotFound(_) => "wallet_not_found",
        }
    }

    /// 调用方是否可以原样重试
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::StateOutdated => true,
            _ => false,
        }
    }

    pub fn invalid_transaction(msg: impl Into<String>) -> Self {
        Self::InvalidTransaction(msg.into())
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }
}
