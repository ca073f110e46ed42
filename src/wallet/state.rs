//! 钱包状态机
//!
//! 刷新与发送相互独立：
//! - 刷新：Idle → Updating → Idle
//! - 发送：Building → AwaitingSignature → Sending → Confirmed | Failed

use std::fmt;

use serde::{Deserialize, Serialize};

/// 刷新状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateState {
    #[default]
    Idle,
    Updating,
}

/// 发送状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SendState {
    /// 尚未发送过
    #[default]
    Idle,

    /// 正在构建待签名载荷
    Building,

    /// 等待外部签名器
    AwaitingSignature,

    /// 已签名，正在广播
    Sending,

    /// 节点已接受交易
    Confirmed,

    /// 构建、签名或广播失败
    Failed,
}

impl SendState {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "空闲",
            Self::Building => "构建交易",
            Self::AwaitingSignature => "等待签名",
            Self::Sending => "广播中",
            Self::Confirmed => "已广播",
            Self::Failed => "发送失败",
        }
    }

    /// 本次发送是否已结束
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// 是否有发送正在进行
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Building | Self::AwaitingSignature | Self::Sending)
    }

    /// 验证状态转换合法性
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use SendState::*;

        match (self, target) {
            // 新一轮发送
            (Idle, Building) | (Confirmed, Building) | (Failed, Building) => true,

            // Building → AwaitingSignature | Failed
            (Building, AwaitingSignature) | (Building, Failed) => true,

            // AwaitingSignature → Sending | Failed
            (AwaitingSignature, Sending) | (AwaitingSignature, Failed) => true,

            // Sending → Confirmed | Failed
            (Sending, Confirmed) | (Sending, Failed) => true,

            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Building => "building",
            Self::AwaitingSignature => "awaiting_signature",
            Self::Sending => "sending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl UpdateState {
    pub fn can_transition_to(&self, target: &Self) -> bool {
        // 并发刷新时 Updating → Updating 合法（后发者胜出）
        matches!(
            (self, target),
            (Self::Idle, Self::Updating) | (Self::Updating, Self::Idle) | (Self::Updating, Self::Updating)
        )
    }
}

impl fmt::Display for SendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
