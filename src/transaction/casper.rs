//! Casper 部署（Deploy）构建
//!
//! 原生转账部署：payment 为空 ModuleBytes 携带 `amount`，session 为 Transfer，
//! 参数为 `amount`、`target`、`id`。
//! body_hash = blake2b(payment || session)，deploy_hash = blake2b(header)。
//! ed25519 直接对 deploy_hash 签名，secp256k1 对 sha256(deploy_hash) 签名。

use chrono::{DateTime, SecondsFormat};
use serde_json::{json, Value};

use crate::address::casper::CasperAddressService;
use crate::crypto::{
    hash::{blake2b_256, sha256},
    EllipticCurve, PublicKey, Signature,
};
use crate::domain::{AmountType, Blockchain, FeeParameters, SignedTransaction, Transaction, TransactionParams};
use crate::error::{Result, WalletError};
use crate::transaction::{ensure_blockchain, ensure_signature_count, missing_fee, to_u64, TransactionBuilder};

/// 部署有效期 30 分钟
pub const DEPLOY_TTL_MS: u64 = 1_800_000;
/// 原生转账的固定手续费 0.1 CSPR
pub const TRANSFER_FEE_MOTES: u64 = 100_000_000;

const GAS_PRICE: u64 = 1;
const MODULE_BYTES_TAG: u8 = 0;
const TRANSFER_TAG: u8 = 5;

/// 部署参数用到的 CLType
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClType {
    U512,
    PublicKey,
    OptionU64,
}

impl ClType {
    fn tag_bytes(&self) -> Vec<u8> {
        match self {
            Self::U512 => vec![8],
            Self::PublicKey => vec![22],
            Self::OptionU64 => vec![13, 5],
        }
    }

    fn json(&self) -> Value {
        match self {
            Self::U512 => json!("U512"),
            Self::PublicKey => json!("PublicKey"),
            Self::OptionU64 => json!({ "Option": "U64" }),
        }
    }
}

#[derive(Debug, Clone)]
struct NamedArg {
    name: &'static str,
    cl_type: ClType,
    bytes: Vec<u8>,
    parsed: Value,
}

impl NamedArg {
    fn u512(name: &'static str, value: u64) -> Self {
        Self {
            name,
            cl_type: ClType::U512,
            bytes: encode_u512(value),
            parsed: json!(value.to_string()),
        }
    }

    fn public_key(name: &'static str, tagged_key: &[u8]) -> Self {
        Self {
            name,
            cl_type: ClType::PublicKey,
            bytes: tagged_key.to_vec(),
            parsed: json!(hex::encode(tagged_key)),
        }
    }

    fn optional_u64(name: &'static str, value: Option<u64>) -> Self {
        let (bytes, parsed) = match value {
            Some(v) => {
                let mut bytes = vec![1];
                bytes.extend_from_slice(&v.to_le_bytes());
                (bytes, json!(v))
            }
            None => (vec![0], Value::Null),
        };
        Self {
            name,
            cl_type: ClType::OptionU64,
            bytes,
            parsed,
        }
    }

    fn write(&self, buf: &mut Vec<u8>) {
        write_string(buf, self.name);
        write_bytes(buf, &self.bytes);
        buf.extend_from_slice(&self.cl_type.tag_bytes());
    }

    fn json(&self) -> Value {
        json!([
            self.name,
            {
                "cl_type": self.cl_type.json(),
                "bytes": hex::encode(&self.bytes),
                "parsed": self.parsed,
            }
        ])
    }
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_bytes(buf, value.as_bytes());
}

fn write_args(buf: &mut Vec<u8>, args: &[NamedArg]) {
    buf.extend_from_slice(&(args.len() as u32).to_le_bytes());
    for arg in args {
        arg.write(buf);
    }
}

/// U512：长度字节 + 去掉高位零的小端字节
pub fn encode_u512(value: u64) -> Vec<u8> {
    let le = value.to_le_bytes();
    let len = le.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    let mut out = Vec::with_capacity(len + 1);
    out.push(len as u8);
    out.extend_from_slice(&le[..len]);
    out
}

/// 序列化完成、等待签名的部署
#[derive(Debug, Clone)]
struct UnsignedDeploy {
    account: Vec<u8>,
    timestamp_ms: u64,
    chain_name: &'static str,
    payment: Vec<NamedArg>,
    session: Vec<NamedArg>,
}

impl UnsignedDeploy {
    fn payment_bytes(&self) -> Vec<u8> {
        let mut buf = vec![MODULE_BYTES_TAG];
        write_bytes(&mut buf, &[]);
        write_args(&mut buf, &self.payment);
        buf
    }

    fn session_bytes(&self) -> Vec<u8> {
        let mut buf = vec![TRANSFER_TAG];
        write_args(&mut buf, &self.session);
        buf
    }

    fn body_hash(&self) -> [u8; 32] {
        let mut body = self.payment_bytes();
        body.extend(self.session_bytes());
        blake2b_256(&body)
    }

    fn header_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.account);
        buf.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        buf.extend_from_slice(&DEPLOY_TTL_MS.to_le_bytes());
        buf.extend_from_slice(&GAS_PRICE.to_le_bytes());
        buf.extend_from_slice(&self.body_hash());
        // dependencies
        buf.extend_from_slice(&0u32.to_le_bytes());
        write_string(&mut buf, self.chain_name);
        buf
    }

    fn deploy_hash(&self) -> [u8; 32] {
        blake2b_256(&self.header_bytes())
    }

    fn timestamp_json(&self) -> Result<String> {
        let millis = i64::try_from(self.timestamp_ms)
            .map_err(|_| WalletError::invalid_transaction("timestamp out of range"))?;
        let time = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| WalletError::invalid_transaction("timestamp out of range"))?;
        Ok(time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// `account_put_deploy` 的 params
    fn to_json(&self, approval_signature: &[u8]) -> Result<Value> {
        let account = hex::encode(&self.account);
        Ok(json!({
            "deploy": {
                "hash": hex::encode(self.deploy_hash()),
                "header": {
                    "account": account,
                    "timestamp": self.timestamp_json()?,
                    "ttl": "30m",
                    "gas_price": GAS_PRICE,
                    "body_hash": hex::encode(self.body_hash()),
                    "dependencies": [],
                    "chain_name": self.chain_name,
                },
                "payment": {
                    "ModuleBytes": {
                        "module_bytes": "",
                        "args": self.payment.iter().map(NamedArg::json).collect::<Vec<_>>(),
                    }
                },
                "session": {
                    "Transfer": {
                        "args": self.session.iter().map(NamedArg::json).collect::<Vec<_>>(),
                    }
                },
                "approvals": [{
                    "signer": account,
                    "signature": hex::encode(approval_signature),
                }],
            }
        }))
    }
}

pub struct CasperTransactionBuilder {
    blockchain: Blockchain,
    public_key: PublicKey,
}

impl CasperTransactionBuilder {
    pub fn new(blockchain: Blockchain, public_key: PublicKey) -> Result<Self> {
        if !matches!(blockchain, Blockchain::Casper { .. }) {
            return Err(WalletError::UnsupportedBlockchain(blockchain.display_name()));
        }
        public_key.require_curve(blockchain.supported_curves())?;
        Ok(Self {
            blockchain,
            public_key,
        })
    }

    fn chain_name(&self) -> &'static str {
        if self.blockchain.is_testnet() {
            "casper-test"
        } else {
            "casper"
        }
    }

    fn deploy(&self, transaction: &Transaction) -> Result<UnsignedDeploy> {
        ensure_blockchain(transaction, self.blockchain)?;
        if transaction.amount.amount_type != AmountType::Coin {
            return Err(WalletError::invalid_transaction(
                "only native transfers are supported on Casper",
            ));
        }
        let payment = match transaction.fee.parameters {
            FeeParameters::Casper { motes } => motes,
            _ => return Err(missing_fee(self.blockchain, "casper")),
        };
        let (timestamp_ms, transfer_id) = match transaction.params {
            TransactionParams::Casper {
                timestamp_ms,
                transfer_id,
            } => (timestamp_ms, transfer_id),
            _ => return Err(WalletError::invalid_transaction("deploy timestamp is required")),
        };

        let amount = to_u64(transaction.amount.to_smallest_unit()?, "amount")?;
        let target = CasperAddressService::require_tagged_key(&transaction.destination_address)?;

        Ok(UnsignedDeploy {
            account: CasperAddressService::tagged_key(&self.public_key)?,
            timestamp_ms,
            chain_name: self.chain_name(),
            payment: vec![NamedArg::u512("amount", payment)],
            session: vec![
                NamedArg::u512("amount", amount),
                NamedArg::public_key("target", &target),
                NamedArg::optional_u64("id", transfer_id),
            ],
        })
    }

    /// 签名者对 deploy_hash 的签名消息
    fn message(&self, deploy_hash: &[u8; 32]) -> Vec<u8> {
        match self.public_key.curve() {
            EllipticCurve::Secp256k1 => sha256(deploy_hash).to_vec(),
            EllipticCurve::Ed25519 | EllipticCurve::Ed25519Slip0010 => deploy_hash.to_vec(),
        }
    }
}

impl TransactionBuilder for CasperTransactionBuilder {
    fn estimate_size(&self, transaction: &Transaction) -> Result<usize> {
        let deploy = self.deploy(transaction)?;
        // header + hash + payment + session + 一个 approval（签名者 + 带标签签名）
        Ok(deploy.header_bytes().len()
            + 32
            + deploy.payment_bytes().len()
            + deploy.session_bytes().len()
            + 4
            + deploy.account.len()
            + 65)
    }

    fn build_for_sign(&self, transaction: &Transaction) -> Result<Vec<Vec<u8>>> {
        let deploy = self.deploy(transaction)?;
        Ok(vec![self.message(&deploy.deploy_hash())])
    }

    fn build_for_send(
        &self,
        transaction: &Transaction,
        signatures: &[Signature],
    ) -> Result<SignedTransaction> {
        ensure_signature_count(1, signatures)?;
        let deploy = self.deploy(transaction)?;
        let message = self.message(&deploy.deploy_hash());
        let signature = &signatures[0];

        let (tag, bytes) = match self.public_key.curve() {
            EllipticCurve::Secp256k1 => {
                signature.verify_prehash(&message, &self.public_key.compressed()?)?;
                (deploy.account[0], signature.normalized()?.to_vec())
            }
            EllipticCurve::Ed25519 | EllipticCurve::Ed25519Slip0010 => {
                signature.verify_ed25519(&message, self.public_key.blockchain_key())?;
                (deploy.account[0], signature.as_bytes().to_vec())
            }
        };
        let mut approval = Vec::with_capacity(bytes.len() + 1);
        approval.push(tag);
        approval.extend(bytes);

        let payload = serde_json::to_vec(&deploy.to_json(&approval)?)
            .map_err(|e| WalletError::invalid_transaction(e.to_string()))?;
        Ok(SignedTransaction::new(payload, transaction.clone()))
    }
}

/// 由 put_deploy 载荷取出部署哈希
pub fn deploy_hash_of(payload: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(payload).ok()?;
    value["deploy"]["hash"].as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressService;
    use crate::address::AddressType;
    use crate::domain::{Amount, Fee};
    use ed25519_dalek::{Signer, SigningKey};
    use rust_decimal::Decimal;

    const TARGET: &str = "0198c07D7e72D89A681d7227a7Af8A6fd5F22fe0105c8741d55A95dF415454b82E";

    fn ed_key(seed: u8) -> (SigningKey, PublicKey) {
        let signing_key = SigningKey::from_bytes(&[seed; 32]);
        let key = PublicKey::new(
            signing_key.verifying_key().as_bytes().to_vec(),
            EllipticCurve::Ed25519,
        )
        .unwrap();
        (signing_key, key)
    }

    fn transfer(blockchain: Blockchain, source: &str) -> Transaction {
        Transaction::new(
            Amount::coin(blockchain, Decimal::from(5)),
            Fee::new(
                Amount::from_smallest_unit(blockchain, AmountType::Coin, TRANSFER_FEE_MOTES as u128)
                    .unwrap(),
                FeeParameters::Casper {
                    motes: TRANSFER_FEE_MOTES,
                },
            ),
            source,
            TARGET,
        )
        .with_params(TransactionParams::Casper {
            timestamp_ms: 1_700_000_000_000,
            transfer_id: Some(42),
        })
    }

    #[test]
    fn test_u512_encoding() {
        assert_eq!(encode_u512(0), vec![0]);
        assert_eq!(encode_u512(100_000_000), vec![4, 0x00, 0xe1, 0xf5, 0x05]);
        assert_eq!(encode_u512(0x100), vec![2, 0x00, 0x01]);
    }

    #[test]
    fn test_session_layout() {
        let blockchain = Blockchain::Casper {
            curve: EllipticCurve::Ed25519,
            testnet: false,
        };
        let (_, key) = ed_key(1);
        let builder = CasperTransactionBuilder::new(blockchain, key).unwrap();
        let deploy = builder.deploy(&transfer(blockchain, "src")).unwrap();

        let session = deploy.session_bytes();
        assert_eq!(session[0], TRANSFER_TAG);
        assert_eq!(u32::from_le_bytes(session[1..5].try_into().unwrap()), 3);
        // "amount"
        assert_eq!(u32::from_le_bytes(session[5..9].try_into().unwrap()), 6);
        assert_eq!(&session[9..15], b"amount");
        // id 为 Option<U64>
        assert_eq!(&session[session.len() - 2..], &[13, 5]);

        let payment = deploy.payment_bytes();
        assert_eq!(&payment[..5], &[MODULE_BYTES_TAG, 0, 0, 0, 0]);

        let header = deploy.header_bytes();
        assert_eq!(&header[..33], deploy.account.as_slice());
        assert!(header.ends_with(b"\x06\x00\x00\x00casper"));
    }

    #[test]
    fn test_sign_and_assemble() {
        let blockchain = Blockchain::Casper {
            curve: EllipticCurve::Ed25519,
            testnet: true,
        };
        let (signing_key, key) = ed_key(2);
        let source = CasperAddressService
            .make_address(&key, AddressType::Default)
            .unwrap();
        let builder = CasperTransactionBuilder::new(blockchain, key).unwrap();
        let tx = transfer(blockchain, &source.value);

        let messages = builder.build_for_sign(&tx).unwrap();
        assert_eq!(messages, builder.build_for_sign(&tx).unwrap());
        assert_eq!(messages[0].len(), 32);

        let signature =
            Signature::new(signing_key.sign(&messages[0]).to_bytes().to_vec()).unwrap();
        let signed = builder.build_for_send(&tx, &[signature]).unwrap();
        let json: Value = serde_json::from_slice(&signed.payload).unwrap();
        let deploy = &json["deploy"];

        assert_eq!(deploy["hash"], hex::encode(&messages[0]));
        assert_eq!(deploy["header"]["chain_name"], "casper-test");
        assert_eq!(deploy["header"]["timestamp"], "2023-11-14T22:13:20.000Z");
        assert_eq!(deploy["session"]["Transfer"]["args"][0][1]["parsed"], "5000000000");
        assert_eq!(deploy["session"]["Transfer"]["args"][2][1]["parsed"], 42);
        let approval = deploy["approvals"][0]["signature"].as_str().unwrap();
        assert!(approval.starts_with("01"));
        assert_eq!(approval.len(), 130);
        assert_eq!(deploy_hash_of(&signed.payload), Some(hex::encode(&messages[0])));
    }

    #[test]
    fn test_transfer_deploy_reference_hashes() {
        // 期望值按 Casper 字节序列化规则另行计算
        let blockchain = Blockchain::Casper {
            curve: EllipticCurve::Ed25519,
            testnet: false,
        };
        let (signing_key, key) = ed_key(2);
        let builder = CasperTransactionBuilder::new(blockchain, key).unwrap();
        let tx = transfer(blockchain, "src");
        let deploy = builder.deploy(&tx).unwrap();

        assert_eq!(
            hex::encode(&deploy.account),
            "018139770ea87d175f56a35466c34c7ecccb8d8a91b4ee37a25df60f5b8fc9b394"
        );
        assert_eq!(
            hex::encode(deploy.body_hash()),
            "d40be44e8cbb75f6d4cf8d66e2383eb177393308c289a3b7231ff0803e516061"
        );
        assert_eq!(
            hex::encode(deploy.deploy_hash()),
            "ea066402dde97be6c0f6e1cb72cdb9642f0c8e09369540d7e173e0aaae288152"
        );

        let message = builder.build_for_sign(&tx).unwrap().remove(0);
        assert_eq!(message, deploy.deploy_hash());
        let signature = Signature::new(signing_key.sign(&message).to_bytes().to_vec()).unwrap();
        let signed = builder.build_for_send(&tx, &[signature]).unwrap();
        let json: Value = serde_json::from_slice(&signed.payload).unwrap();
        assert_eq!(
            json["deploy"]["approvals"][0]["signature"],
            "01c5b41931cc976b35178b3c6926e871f337a95bdfabffc5e7282071d3086b6e041a3461d633a3803e59f488415d70243911cac3ad1202539fdd1c96bd3ef9a40c"
        );
        assert_eq!(
            json["deploy"]["header"]["body_hash"],
            "d40be44e8cbb75f6d4cf8d66e2383eb177393308c289a3b7231ff0803e516061"
        );
    }

    #[test]
    fn test_build_errors() {
        let blockchain = Blockchain::Casper {
            curve: EllipticCurve::Ed25519,
            testnet: false,
        };
        let (_, key) = ed_key(3);
        let (other, _) = ed_key(4);
        let builder = CasperTransactionBuilder::new(blockchain, key).unwrap();

        let mut tx = transfer(blockchain, "src");
        tx.fee.parameters = FeeParameters::None;
        assert!(matches!(
            builder.build_for_sign(&tx),
            Err(WalletError::MissingFeeParameters { .. })
        ));

        let tx = transfer(blockchain, "src");
        let message = builder.build_for_sign(&tx).unwrap().remove(0);
        let forged = Signature::new(other.sign(&message).to_bytes().to_vec()).unwrap();
        assert!(matches!(
            builder.build_for_send(&tx, &[forged]),
            Err(WalletError::InvalidSignature(_))
        ));

        let mut bad_target = transfer(blockchain, "src");
        bad_target.destination_address = "01abc".into();
        assert!(matches!(
            builder.build_for_sign(&bad_target),
            Err(WalletError::InvalidAddress(_))
        ));

        let (_, secp_key) = ed_key(5);
        assert!(CasperTransactionBuilder::new(Blockchain::Dogecoin, secp_key).is_err());
    }
}
