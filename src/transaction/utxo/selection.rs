//! 分支定界（Branch and Bound）选币
//!
//! 输入按金额降序排列，用显式栈做深度优先搜索：每个状态尝试"两输出（目标+找零）"
//! 和"单输出（恰好用尽）"两种方案，取体积最小者，体积相同取找零更少者。
//! 输入超过 1000 个时退化为从大到小的简单贪心。

use bitcoin::VarInt;

use crate::address::bitcoin::{classify_script, NetworkParams, ScriptType};
use crate::error::{Result, WalletError};
use crate::transaction::utxo::UnspentOutput;

const MAX_INPUTS: usize = 1000;
const MAX_TRIES: usize = 100_000;

/// 交易公共部分：version(4) + locktime(4)
const TX_OVERHEAD: usize = 8;
/// outpoint(36) + sequence(4)
const INPUT_BASE: usize = 40;
/// DER 签名最大 72 字节（low-s）+ sighash 类型 1 字节
const MAX_SIG_PUSH: usize = 73;
/// segwit marker + flag
const SEGWIT_MARKER: usize = 2;

/// 手续费模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeMode {
    /// 按费率计算（估算手续费时使用）
    Calculate { sat_per_byte: u64 },
    /// 用户已选定的固定手续费（构建交易时使用）
    Exactly(u64),
}

impl FeeMode {
    fn is_calculation(&self) -> bool {
        matches!(self, Self::Calculate { .. })
    }

    fn fee_for(&self, size: usize) -> u64 {
        match self {
            Self::Calculate { sat_per_byte } => sat_per_byte.saturating_mul(size as u64),
            Self::Exactly(fee) => *fee,
        }
    }
}

/// 选币结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreImage {
    pub inputs: Vec<UnspentOutput>,
    pub destination: u64,
    /// 计算模式下用尽全部输入时可能为负
    pub change: i64,
    pub fee: u64,
    /// 虚拟字节数
    pub size: usize,
}

impl PreImage {
    fn better_than(&self, other: &PreImage) -> bool {
        self.size < other.size || (self.size == other.size && self.change < other.change)
    }
}

/// 交易体积计算器
#[derive(Debug, Clone, Copy)]
pub struct SizeCalculator {
    /// 花费 P2PKH 输入时 scriptSig 中公钥的长度（33 或 65）
    pub public_key_len: usize,
    pub network: NetworkParams,
}

impl SizeCalculator {
    pub fn new(network: NetworkParams, public_key_len: usize) -> Self {
        Self {
            public_key_len,
            network,
        }
    }

    fn output_size(script: ScriptType) -> usize {
        let script_len = match script {
            ScriptType::P2pkh => 25,
            ScriptType::P2sh => 23,
            ScriptType::P2wpkh => 22,
            ScriptType::P2wsh => 34,
        };
        8 + VarInt(script_len as u64).size() + script_len
    }

    /// 虚拟字节数 = ceil(weight / 4)
    pub fn transaction_size(&self, inputs: &[UnspentOutput], outputs: &[ScriptType]) -> Result<usize> {
        let mut base = TX_OVERHEAD
            + VarInt(inputs.len() as u64).size()
            + VarInt(outputs.len() as u64).size()
            + outputs.iter().map(|s| Self::output_size(*s)).sum::<usize>();
        let mut witness = 0usize;

        for input in inputs {
            match classify_script(&input.script) {
                Some(ScriptType::P2pkh) => {
                    let script_sig = MAX_SIG_PUSH + 1 + self.public_key_len;
                    base += INPUT_BASE + VarInt(script_sig as u64).size() + script_sig;
                }
                Some(ScriptType::P2wpkh) => {
                    base += INPUT_BASE + 1;
                    // 见证项数 + 签名 + 压缩公钥
                    witness += 1 + MAX_SIG_PUSH + 1 + 33;
                }
                other => {
                    return Err(WalletError::invalid_transaction(format!(
                        "unsupported input script {:?}",
                        other
                    )))
                }
            }
        }

        if witness > 0 {
            witness += SEGWIT_MARKER;
        }
        let weight = base * 4 + witness;
        Ok(weight.div_ceil(4))
    }

    pub fn dust(&self, script: ScriptType) -> u64 {
        self.network.dust(script)
    }
}

/// 选币上下文
pub struct SelectionContext {
    pub change_script: ScriptType,
    pub destination_script: ScriptType,
    pub amount: u64,
    pub fee: FeeMode,
}

#[derive(Debug, Clone)]
struct State {
    selected: Vec<usize>,
    index: usize,
    remaining: u64,
    current_value: u64,
}

impl State {
    fn exclude_current(&self, inputs: &[UnspentOutput]) -> State {
        State {
            selected: self.selected.clone(),
            index: self.index + 1,
            remaining: self.remaining - inputs[self.index].amount,
            current_value: self.current_value,
        }
    }

    fn include_current(&self, inputs: &[UnspentOutput]) -> State {
        let mut selected = self.selected.clone();
        selected.push(self.index);
        State {
            selected,
            index: self.index + 1,
            remaining: self.remaining,
            current_value: self.current_value + inputs[self.index].amount,
        }
    }
}

/// 分支定界选币器
pub struct BranchAndBound {
    calculator: SizeCalculator,
}

impl BranchAndBound {
    pub fn new(calculator: SizeCalculator) -> Self {
        Self { calculator }
    }

    pub fn select(&self, outputs: &[UnspentOutput], context: &SelectionContext) -> Result<PreImage> {
        if context.amount == 0 {
            return Err(WalletError::InvalidAmount("amount must be positive".into()));
        }
        if !context.fee.is_calculation()
            && context.amount < self.calculator.dust(context.destination_script)
        {
            return Err(WalletError::Dust(context.amount.to_string()));
        }
        if outputs.is_empty() {
            return Err(WalletError::CoinSelection("no unspent outputs".into()));
        }

        let total = outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.amount))
            .ok_or_else(|| WalletError::InvalidAmount("unspent total overflows".into()))?;
        if context.amount > total {
            return Err(WalletError::InsufficientFunds {
                required: context.amount.to_string(),
                available: total.to_string(),
            });
        }

        let mut sorted = outputs.to_vec();
        sorted.sort_by(|a, b| b.amount.cmp(&a.amount));

        let best = if sorted.len() > MAX_INPUTS {
            self.simple_select(&sorted, context)?
        } else {
            self.search(&sorted, context, total)?
        };

        match best {
            Some(pre_image) if !pre_image.inputs.is_empty() => Ok(pre_image),
            _ => Err(WalletError::CoinSelection(
                "unable to find suitable unspent outputs".into(),
            )),
        }
    }

    fn search(
        &self,
        inputs: &[UnspentOutput],
        context: &SelectionContext,
        total: u64,
    ) -> Result<Option<PreImage>> {
        let mut best: Option<PreImage> = None;
        let mut tries = 0usize;
        let mut stack = vec![State {
            selected: Vec::new(),
            index: 0,
            remaining: total,
            current_value: 0,
        }];

        while let Some(state) = stack.pop() {
            tries += 1;
            if tries >= MAX_TRIES {
                tracing::debug!(tries, "coin selection stopped by max tries");
                break;
            }

            let selected: Vec<UnspentOutput> =
                state.selected.iter().map(|&i| inputs[i].clone()).collect();
            if let Some(variant) =
                self.best_variant(context, &selected, state.current_value, inputs.len())?
            {
                if best.as_ref().map_or(true, |b| variant.better_than(b)) {
                    best = Some(variant);
                }
                continue;
            }

            if state.index >= inputs.len() {
                continue;
            }
            if state.current_value + state.remaining < context.amount {
                continue;
            }

            // 先压入"排除"分支，使"包含"分支先被处理
            stack.push(state.exclude_current(inputs));
            stack.push(state.include_current(inputs));
        }

        Ok(best)
    }

    /// 从大到小累加，直到某个方案可行
    fn simple_select(
        &self,
        inputs: &[UnspentOutput],
        context: &SelectionContext,
    ) -> Result<Option<PreImage>> {
        let mut sum = 0u64;
        for (i, input) in inputs.iter().enumerate() {
            sum += input.amount;
            if sum < context.amount {
                continue;
            }
            if let Some(variant) = self.best_variant(context, &inputs[..=i], sum, inputs.len())? {
                return Ok(Some(variant));
            }
        }
        Ok(None)
    }

    fn best_variant(
        &self,
        context: &SelectionContext,
        selected: &[UnspentOutput],
        current_value: u64,
        total_count: usize,
    ) -> Result<Option<PreImage>> {
        let candidates = [
            self.two_output_variant(context, selected, current_value, total_count)?,
            self.single_output_variant(context, selected, current_value, total_count)?,
        ];
        Ok(candidates
            .into_iter()
            .flatten()
            .reduce(|a, b| if b.better_than(&a) { b } else { a }))
    }

    /// 目标 + 找零
    fn two_output_variant(
        &self,
        context: &SelectionContext,
        selected: &[UnspentOutput],
        current_value: u64,
        total_count: usize,
    ) -> Result<Option<PreImage>> {
        if current_value < context.amount {
            return Ok(None);
        }
        let change = current_value - context.amount;
        let size = self
            .calculator
            .transaction_size(selected, &[context.change_script, context.destination_script])?;
        let fee = context.fee.fee_for(size);
        if change < fee {
            return Ok(None);
        }
        let change = change - fee;
        if change == 0 {
            // 找零为零时不产生找零输出，按单输出计体积
            let size = self
                .calculator
                .transaction_size(selected, &[context.destination_script])?;
            return Ok(Some(PreImage {
                inputs: selected.to_vec(),
                destination: context.amount,
                change: 0,
                fee: current_value - context.amount,
                size,
            }));
        }

        let all_selected = context.fee.is_calculation() && selected.len() == total_count;
        if !all_selected && change < self.calculator.dust(context.change_script) {
            return Ok(None);
        }

        Ok(Some(PreImage {
            inputs: selected.to_vec(),
            destination: context.amount,
            change: change as i64,
            fee,
            size,
        }))
    }

    /// 只有目标输出，输入恰好覆盖金额与手续费
    fn single_output_variant(
        &self,
        context: &SelectionContext,
        selected: &[UnspentOutput],
        current_value: u64,
        total_count: usize,
    ) -> Result<Option<PreImage>> {
        if current_value < context.amount {
            return Ok(None);
        }
        let change = (current_value - context.amount) as i64;
        let size = self
            .calculator
            .transaction_size(selected, &[context.destination_script])?;
        let fee = context.fee.fee_for(size);

        // 计算模式且已用尽全部输入：允许手续费吃掉全部余额（找零可为负）
        if context.fee.is_calculation() && selected.len() == total_count {
            let change = change - fee as i64;
            if change > 0 {
                return Ok(None);
            }
            return Ok(Some(PreImage {
                inputs: selected.to_vec(),
                destination: context.amount,
                change,
                fee,
                size,
            }));
        }

        if change != fee as i64 {
            return Ok(None);
        }
        Ok(Some(PreImage {
            inputs: selected.to_vec(),
            destination: context.amount,
            change: 0,
            fee,
            size,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::bitcoin::p2pkh_script;

    fn utxo(n: u8, amount: u64) -> UnspentOutput {
        UnspentOutput {
            tx_hash: [n; 32],
            index: 0,
            amount,
            script: p2pkh_script(&[0x11; 20]),
        }
    }

    fn selector() -> BranchAndBound {
        BranchAndBound::new(SizeCalculator::new(NetworkParams::DASH, 33))
    }

    fn context(amount: u64, fee: FeeMode) -> SelectionContext {
        SelectionContext {
            change_script: ScriptType::P2pkh,
            destination_script: ScriptType::P2pkh,
            amount,
            fee,
        }
    }

    #[test]
    fn test_legacy_size() {
        let calc = SizeCalculator::new(NetworkParams::DASH, 33);
        // 10 + 148 + 2 * 34
        let size = calc
            .transaction_size(&[utxo(1, 1)], &[ScriptType::P2pkh, ScriptType::P2pkh])
            .unwrap();
        assert_eq!(size, 226);
    }

    #[test]
    fn test_prefers_single_input() {
        let outputs = vec![utxo(1, 10_000), utxo(2, 200_000), utxo(3, 50_000)];
        let pre_image = selector()
            .select(&outputs, &context(40_000, FeeMode::Exactly(1_000)))
            .unwrap();
        assert_eq!(pre_image.inputs.len(), 1);
        assert_eq!(pre_image.fee, 1_000);
        let input_total: u64 = pre_image.inputs.iter().map(|i| i.amount).sum();
        assert_eq!(
            input_total as i64,
            pre_image.destination as i64 + pre_image.fee as i64 + pre_image.change
        );
    }

    #[test]
    fn test_exact_match_has_no_change() {
        let outputs = vec![utxo(1, 100_000), utxo(2, 11_000)];
        let pre_image = selector()
            .select(&outputs, &context(10_000, FeeMode::Exactly(1_000)))
            .unwrap();
        assert_eq!(pre_image.change, 0);
        assert_eq!(pre_image.inputs[0].amount, 11_000);
    }

    #[test]
    fn test_calculated_fee_uses_size() {
        let outputs = vec![utxo(1, 1_000_000)];
        let pre_image = selector()
            .select(&outputs, &context(10_000, FeeMode::Calculate { sat_per_byte: 10 }))
            .unwrap();
        assert_eq!(pre_image.fee, pre_image.size as u64 * 10);
    }

    #[test]
    fn test_zero_change_counts_one_output() {
        // 余额恰好等于两输出手续费
        let calc = SizeCalculator::new(NetworkParams::DASH, 33);
        let outputs = vec![utxo(1, 12_260)];
        let pre_image = selector()
            .select(&outputs, &context(10_000, FeeMode::Calculate { sat_per_byte: 10 }))
            .unwrap();
        assert_eq!(pre_image.change, 0);
        assert_eq!(pre_image.fee, 2_260);
        assert_eq!(pre_image.size, 192);
        assert_eq!(
            pre_image.size,
            calc.transaction_size(&outputs, &[ScriptType::P2pkh]).unwrap()
        );
    }

    #[test]
    fn test_errors() {
        let outputs = vec![utxo(1, 1_000)];
        assert!(matches!(
            selector().select(&outputs, &context(0, FeeMode::Exactly(1))),
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            selector().select(&outputs, &context(100, FeeMode::Exactly(1))),
            Err(WalletError::Dust(_))
        ));
        assert!(matches!(
            selector().select(&[], &context(1_000, FeeMode::Exactly(1))),
            Err(WalletError::CoinSelection(_))
        ));
        assert!(matches!(
            selector().select(&outputs, &context(5_000, FeeMode::Exactly(1))),
            Err(WalletError::InsufficientFunds { .. })
        ));
        // 金额够但不够手续费
        assert!(matches!(
            selector().select(&outputs, &context(1_000, FeeMode::Exactly(500))),
            Err(WalletError::CoinSelection(_))
        ));
    }

    #[test]
    fn test_many_inputs_fall_back_to_greedy() {
        let outputs: Vec<_> = (0..1_001u32).map(|i| utxo((i % 250) as u8, 1_000)).collect();
        let pre_image = selector()
            .select(&outputs, &context(5_000, FeeMode::Exactly(1_000)))
            .unwrap();
        assert_eq!(pre_image.inputs.len(), 6);
    }
}
