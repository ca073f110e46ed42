//! XRP Ledger Payment 序列化
//!
//! 字段按 (类型码, 字段码) 升序排列，字段头为一个字节 `type << 4 | field`。
//! 签名数据 = `STX\0` 前缀 + 不含 TxnSignature 的字段；
//! secp256k1 对其 sha512-half 签名（DER），ed25519 直接对完整数据签名。

use crate::address::xrp::XrpAddressService;
use crate::crypto::{hash::sha512_half, EllipticCurve, PublicKey, Signature};
use crate::domain::{AmountType, Blockchain, FeeParameters, SignedTransaction, Transaction, TransactionParams};
use crate::error::{Result, WalletError};
use crate::transaction::{ensure_blockchain, ensure_signature_count, missing_fee, to_u64, TransactionBuilder};

const SIGNING_PREFIX: [u8; 4] = [0x53, 0x54, 0x58, 0x00];
const TX_ID_PREFIX: [u8; 4] = [0x54, 0x58, 0x4E, 0x00];

const TRANSACTION_TYPE_PAYMENT: u16 = 0;
const TF_FULLY_CANONICAL_SIG: u32 = 0x8000_0000;
/// 原生 XRP 金额的"正数"位
const NATIVE_POSITIVE: u64 = 0x4000_0000_0000_0000;
/// 原生金额上限 1e17 drops
const MAX_DROPS: u64 = 100_000_000_000_000_000;

mod field {
    pub const TRANSACTION_TYPE: u8 = 0x12;
    pub const FLAGS: u8 = 0x22;
    pub const SEQUENCE: u8 = 0x24;
    pub const DESTINATION_TAG: u8 = 0x2E;
    pub const AMOUNT: u8 = 0x61;
    pub const FEE: u8 = 0x68;
    pub const SIGNING_PUB_KEY: u8 = 0x73;
    pub const TXN_SIGNATURE: u8 = 0x74;
    pub const ACCOUNT: u8 = 0x81;
    pub const DESTINATION: u8 = 0x83;
}

/// 变长前缀（VL）
fn write_vl(buf: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    let len = data.len();
    match len {
        0..=192 => buf.push(len as u8),
        193..=12_480 => {
            let rest = len - 193;
            buf.push(193 + (rest >> 8) as u8);
            buf.push((rest & 0xff) as u8);
        }
        12_481..=918_744 => {
            let rest = len - 12_481;
            buf.push(241 + (rest >> 16) as u8);
            buf.push(((rest >> 8) & 0xff) as u8);
            buf.push((rest & 0xff) as u8);
        }
        _ => return Err(WalletError::invalid_transaction("field too long")),
    }
    buf.extend_from_slice(data);
    Ok(())
}

fn native_amount(drops: u64) -> Result<[u8; 8]> {
    if drops > MAX_DROPS {
        return Err(WalletError::InvalidAmount(format!("{} drops exceeds supply", drops)));
    }
    Ok((NATIVE_POSITIVE | drops).to_be_bytes())
}

#[derive(Debug, Clone)]
struct Payment {
    account: [u8; 20],
    destination: [u8; 20],
    amount: u64,
    fee: u64,
    sequence: u32,
    destination_tag: Option<u32>,
    signing_public_key: Vec<u8>,
}

impl Payment {
    fn serialize(&self, signature: Option<&[u8]>) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(256);
        buf.push(field::TRANSACTION_TYPE);
        buf.extend_from_slice(&TRANSACTION_TYPE_PAYMENT.to_be_bytes());
        buf.push(field::FLAGS);
        buf.extend_from_slice(&TF_FULLY_CANONICAL_SIG.to_be_bytes());
        buf.push(field::SEQUENCE);
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        if let Some(tag) = self.destination_tag {
            buf.push(field::DESTINATION_TAG);
            buf.extend_from_slice(&tag.to_be_bytes());
        }
        buf.push(field::AMOUNT);
        buf.extend_from_slice(&native_amount(self.amount)?);
        buf.push(field::FEE);
        buf.extend_from_slice(&native_amount(self.fee)?);
        buf.push(field::SIGNING_PUB_KEY);
        write_vl(&mut buf, &self.signing_public_key)?;
        if let Some(signature) = signature {
            buf.push(field::TXN_SIGNATURE);
            write_vl(&mut buf, signature)?;
        }
        buf.push(field::ACCOUNT);
        write_vl(&mut buf, &self.account)?;
        buf.push(field::DESTINATION);
        write_vl(&mut buf, &self.destination)?;
        Ok(buf)
    }

    fn signing_data(&self) -> Result<Vec<u8>> {
        let mut data = SIGNING_PREFIX.to_vec();
        data.extend(self.serialize(None)?);
        Ok(data)
    }
}

/// 已签名交易的哈希（大写十六进制）
pub fn transaction_hash(blob: &[u8]) -> String {
    let mut data = TX_ID_PREFIX.to_vec();
    data.extend_from_slice(blob);
    hex::encode_upper(sha512_half(&data))
}

pub struct XrpTransactionBuilder {
    blockchain: Blockchain,
    public_key: PublicKey,
}

impl XrpTransactionBuilder {
    pub fn new(blockchain: Blockchain, public_key: PublicKey) -> Result<Self> {
        if !matches!(blockchain, Blockchain::Xrp { .. }) {
            return Err(WalletError::UnsupportedBlockchain(blockchain.display_name()));
        }
        XrpAddressService::signing_public_key(&public_key)?;
        Ok(Self {
            blockchain,
            public_key,
        })
    }

    fn payment(&self, transaction: &Transaction) -> Result<Payment> {
        ensure_blockchain(transaction, self.blockchain)?;
        if transaction.amount.amount_type != AmountType::Coin {
            return Err(WalletError::invalid_transaction(
                "issued currencies are not supported",
            ));
        }
        let fee = match transaction.fee.parameters {
            FeeParameters::Xrp { drops } => drops,
            _ => return Err(missing_fee(self.blockchain, "xrp")),
        };
        let (destination_tag, sequence) = match transaction.params {
            TransactionParams::Xrp {
                destination_tag,
                sequence: Some(sequence),
            } => (destination_tag, sequence),
            _ => return Err(WalletError::invalid_transaction("account sequence is required")),
        };

        let account = XrpAddressService::account_id(&self.public_key)?;
        let destination = XrpAddressService::require_account_id(&transaction.destination_address)?;
        if account == destination {
            return Err(WalletError::invalid_transaction("cannot send to the source account"));
        }

        Ok(Payment {
            account,
            destination,
            amount: to_u64(transaction.amount.to_smallest_unit()?, "amount")?,
            fee,
            sequence,
            destination_tag,
            signing_public_key: XrpAddressService::signing_public_key(&self.public_key)?,
        })
    }

    fn is_edwards(&self) -> bool {
        self.public_key.curve().is_edwards()
    }
}

impl TransactionBuilder for XrpTransactionBuilder {
    fn estimate_size(&self, transaction: &Transaction) -> Result<usize> {
        let payment = self.payment(transaction)?;
        // DER 签名最长 72 字节
        Ok(payment.serialize(Some(&[0u8; 72]))?.len())
    }

    fn build_for_sign(&self, transaction: &Transaction) -> Result<Vec<Vec<u8>>> {
        let data = self.payment(transaction)?.signing_data()?;
        if self.is_edwards() {
            Ok(vec![data])
        } else {
            Ok(vec![sha512_half(&data).to_vec()])
        }
    }

    fn build_for_send(
        &self,
        transaction: &Transaction,
        signatures: &[Signature],
    ) -> Result<SignedTransaction> {
        ensure_signature_count(1, signatures)?;
        let payment = self.payment(transaction)?;
        let data = payment.signing_data()?;
        let signature = &signatures[0];

        let encoded = match self.public_key.curve() {
            EllipticCurve::Secp256k1 => {
                signature.verify_prehash(&sha512_half(&data), &payment.signing_public_key)?;
                signature.to_der()?
            }
            EllipticCurve::Ed25519 | EllipticCurve::Ed25519Slip0010 => {
                signature.verify_ed25519(&data, self.public_key.blockchain_key())?;
                signature.as_bytes().to_vec()
            }
        };

        let blob = payment.serialize(Some(&encoded))?;
        Ok(SignedTransaction::new(blob, transaction.clone()))
    }
}
