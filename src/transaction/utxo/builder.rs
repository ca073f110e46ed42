//! UTXO 交易构建
//!
//! 交易结构、签名摘要与序列化均交给 `bitcoin` crate：P2PKH 输入走传统 SIGHASH_ALL 摘要，
//! P2WPKH 输入走 BIP-143 摘要。设置了 lock_time 时 sequence 为 0xFFFFFFFE，否则为 0xFFFFFFFF。

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize;
use bitcoin::hashes::Hash as _;
use bitcoin::script::PushBytesBuf;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Script, ScriptBuf, Sequence, TxIn, TxOut, Witness};

use crate::address::bitcoin::{classify_script, BitcoinAddressService, NetworkParams, ScriptType};
use crate::crypto::{hash::hash160, EllipticCurve, PublicKey, Signature};
use crate::domain::{
    AmountType, Blockchain, FeeParameters, SignedTransaction, Transaction, TransactionParams,
};
use crate::error::{Result, WalletError};
use crate::transaction::utxo::selection::{
    BranchAndBound, FeeMode, PreImage, SelectionContext, SizeCalculator,
};
use crate::transaction::utxo::UnspentOutput;
use crate::transaction::{
    ensure_blockchain, ensure_signature_count, missing_fee, to_u64, TransactionBuilder,
};

const SIGHASH_ALL: EcdsaSighashType = EcdsaSighashType::All;

fn sighash_error(e: impl std::fmt::Display) -> WalletError {
    WalletError::invalid_transaction(format!("sighash: {}", e))
}

/// 选币完成、尚未签名的交易，连同每个输入花费的前序输出
#[derive(Debug, Clone)]
struct UnsignedTransaction {
    tx: bitcoin::Transaction,
    spent: Vec<UnspentOutput>,
}

impl UnsignedTransaction {
    fn new(spent: Vec<UnspentOutput>, outputs: Vec<TxOut>, lock_time: u32) -> Self {
        let sequence = if lock_time != 0 {
            Sequence::ENABLE_LOCKTIME_NO_RBF
        } else {
            Sequence::MAX
        };
        let input = spent
            .iter()
            .map(|unspent| TxIn {
                previous_output: unspent.outpoint(),
                script_sig: ScriptBuf::new(),
                sequence,
                witness: Witness::new(),
            })
            .collect();
        Self {
            tx: bitcoin::Transaction {
                version: Version::ONE,
                lock_time: LockTime::from_consensus(lock_time),
                input,
                output: outputs,
            },
            spent,
        }
    }

    fn is_witness_input(input: &UnspentOutput) -> bool {
        Script::from_bytes(&input.script).is_p2wpkh()
    }

    fn sighash(&self, index: usize) -> Result<[u8; 32]> {
        let spent = self
            .spent
            .get(index)
            .ok_or_else(|| WalletError::invalid_transaction(format!("no input {}", index)))?;
        let script_pubkey = Script::from_bytes(&spent.script);
        let mut cache = SighashCache::new(&self.tx);
        if Self::is_witness_input(spent) {
            cache
                .p2wpkh_signature_hash(
                    index,
                    script_pubkey,
                    bitcoin::Amount::from_sat(spent.amount),
                    SIGHASH_ALL,
                )
                .map(|hash| hash.to_byte_array())
                .map_err(sighash_error)
        } else {
            cache
                .legacy_signature_hash(index, script_pubkey, SIGHASH_ALL.to_u32())
                .map(|hash| hash.to_byte_array())
                .map_err(sighash_error)
        }
    }

    /// 填入解锁数据并按共识格式编码（存在见证时带 segwit 标记）
    fn finalize(mut self, unlocks: Vec<InputUnlock>) -> Vec<u8> {
        for (input, unlock) in self.tx.input.iter_mut().zip(unlocks) {
            input.script_sig = unlock.script_sig;
            input.witness = unlock.witness;
        }
        serialize(&self.tx)
    }
}

struct InputUnlock {
    script_sig: ScriptBuf,
    witness: Witness,
}

impl InputUnlock {
    fn legacy(sig: Vec<u8>, key: Vec<u8>) -> Result<Self> {
        let push = |data: Vec<u8>| {
            PushBytesBuf::try_from(data)
                .map_err(|e| WalletError::invalid_transaction(e.to_string()))
        };
        let script_sig = ScriptBuf::builder()
            .push_slice(push(sig)?)
            .push_slice(push(key)?)
            .into_script();
        Ok(Self {
            script_sig,
            witness: Witness::new(),
        })
    }

    fn witness(sig: Vec<u8>, key: Vec<u8>) -> Self {
        Self {
            script_sig: ScriptBuf::new(),
            witness: Witness::from_slice(&[sig, key]),
        }
    }
}

/// UTXO 链交易构建器，持有一份未花费输出快照
pub struct UtxoTransactionBuilder {
    blockchain: Blockchain,
    address_service: BitcoinAddressService,
    public_key: PublicKey,
    unspents: Vec<UnspentOutput>,
}

impl UtxoTransactionBuilder {
    pub fn new(blockchain: Blockchain, public_key: PublicKey) -> Result<Self> {
        public_key.require_curve(&[EllipticCurve::Secp256k1])?;
        let params = NetworkParams::for_blockchain(blockchain)
            .ok_or_else(|| WalletError::UnsupportedBlockchain(blockchain.display_name()))?;
        Ok(Self {
            blockchain,
            address_service: BitcoinAddressService::new(params),
            public_key,
            unspents: Vec::new(),
        })
    }

    pub fn with_unspents(mut self, unspents: Vec<UnspentOutput>) -> Self {
        self.unspents = unspents;
        self
    }

    pub fn set_unspents(&mut self, unspents: Vec<UnspentOutput>) {
        self.unspents = unspents;
    }

    pub fn unspents(&self) -> &[UnspentOutput] {
        &self.unspents
    }

    fn selector(&self) -> BranchAndBound {
        let calculator = SizeCalculator::new(
            *self.address_service.params(),
            self.public_key.blockchain_key().len(),
        );
        BranchAndBound::new(calculator)
    }

    /// 按费率计算转账 `amount` satoshi 到 `destination` 的手续费
    pub fn calculate_fee(&self, amount: u64, destination: &str, sat_per_byte: u64) -> Result<u64> {
        let (destination_script, _) = self.address_service.locking_script(destination)?;
        let change_script = self.own_script_type()?;
        let context = SelectionContext {
            change_script,
            destination_script,
            amount,
            fee: FeeMode::Calculate { sat_per_byte },
        };
        Ok(self.selector().select(&self.unspents, &context)?.fee)
    }

    /// 找零默认回到自己的地址，地址类型取第一个可花费输出的类型
    fn own_script_type(&self) -> Result<ScriptType> {
        Ok(self
            .unspents
            .iter()
            .find_map(|u| classify_script(&u.script))
            .unwrap_or(ScriptType::P2pkh))
    }

    fn pre_image(&self, transaction: &Transaction) -> Result<(PreImage, Vec<u8>, Vec<u8>)> {
        ensure_blockchain(transaction, self.blockchain)?;
        if transaction.amount.amount_type != AmountType::Coin {
            return Err(WalletError::invalid_transaction(
                "only coin transfers are supported on UTXO chains",
            ));
        }
        if !matches!(transaction.fee.parameters, FeeParameters::Utxo { .. }) {
            return Err(missing_fee(self.blockchain, "utxo"));
        }

        let amount = to_u64(transaction.amount.to_smallest_unit()?, "amount")?;
        let fee = to_u64(transaction.fee.amount.to_smallest_unit()?, "fee")?;
        let (destination_script, destination_script_bytes) = self
            .address_service
            .locking_script(&transaction.destination_address)?;
        let (change_script, change_script_bytes) = self
            .address_service
            .locking_script(&transaction.change_address)?;

        let context = SelectionContext {
            change_script,
            destination_script,
            amount,
            fee: FeeMode::Exactly(fee),
        };
        let pre_image = self.selector().select(&self.unspents, &context)?;
        tracing::debug!(
            blockchain = %self.blockchain,
            inputs = pre_image.inputs.len(),
            change = pre_image.change,
            size = pre_image.size,
            "coin selection done"
        );
        Ok((pre_image, destination_script_bytes, change_script_bytes))
    }

    fn unsigned(&self, transaction: &Transaction) -> Result<UnsignedTransaction> {
        let (pre_image, destination_script, change_script) = self.pre_image(transaction)?;
        let lock_time = match transaction.params {
            TransactionParams::Utxo { lock_time } => lock_time,
            _ => 0,
        };

        let mut outputs = vec![TxOut {
            value: bitcoin::Amount::from_sat(pre_image.destination),
            script_pubkey: ScriptBuf::from_bytes(destination_script),
        }];
        if pre_image.change > 0 {
            outputs.push(TxOut {
                value: bitcoin::Amount::from_sat(pre_image.change as u64),
                script_pubkey: ScriptBuf::from_bytes(change_script),
            });
        }

        Ok(UnsignedTransaction::new(pre_image.inputs, outputs, lock_time))
    }

    /// 输入脚本对应的公钥编码（原样或压缩）
    fn spending_key(&self, input: &UnspentOutput) -> Result<Vec<u8>> {
        let not_ours = || {
            WalletError::invalid_transaction(format!(
                "output {}:{} is not spendable by this key",
                input.tx_id(),
                input.index
            ))
        };
        match classify_script(&input.script) {
            Some(ScriptType::P2pkh) => {
                let hash = &input.script[3..23];
                let raw = self.public_key.blockchain_key().to_vec();
                if hash160(&raw) == hash {
                    return Ok(raw);
                }
                let compressed = self.public_key.compressed()?;
                if hash160(&compressed) == hash {
                    return Ok(compressed);
                }
                Err(not_ours())
            }
            Some(ScriptType::P2wpkh) => {
                let compressed = self.public_key.compressed()?;
                if hash160(&compressed) == input.script[2..22] {
                    Ok(compressed)
                } else {
                    Err(not_ours())
                }
            }
            _ => Err(not_ours()),
        }
    }
}

impl TransactionBuilder for UtxoTransactionBuilder {
    fn estimate_size(&self, transaction: &Transaction) -> Result<usize> {
        Ok(self.pre_image(transaction)?.0.size)
    }

    fn build_for_sign(&self, transaction: &Transaction) -> Result<Vec<Vec<u8>>> {
        let unsigned = self.unsigned(transaction)?;
        (0..unsigned.spent.len())
            .map(|i| {
                self.spending_key(&unsigned.spent[i])?;
                Ok(unsigned.sighash(i)?.to_vec())
            })
            .collect()
    }

    fn build_for_send(
        &self,
        transaction: &Transaction,
        signatures: &[Signature],
    ) -> Result<SignedTransaction> {
        let unsigned = self.unsigned(transaction)?;
        ensure_signature_count(unsigned.spent.len(), signatures)?;

        let mut unlocks = Vec::with_capacity(unsigned.spent.len());
        for (i, (input, signature)) in unsigned.spent.iter().zip(signatures).enumerate() {
            let key = self.spending_key(input)?;
            signature.verify_prehash(&unsigned.sighash(i)?, &key)?;

            let mut sig = signature.to_der()?;
            sig.push(SIGHASH_ALL.to_u32() as u8);
            unlocks.push(if UnsignedTransaction::is_witness_input(input) {
                InputUnlock::witness(sig, key)
            } else {
                InputUnlock::legacy(sig, key)?
            });
        }

        Ok(SignedTransaction::new(
            unsigned.finalize(unlocks),
            transaction.clone(),
        ))
    }
}
