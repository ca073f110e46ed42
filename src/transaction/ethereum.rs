//! EVM 交易构建（Ethereum, BSC, Polygon, Decimal）
//!
//! - 费用参数为 EIP-1559 时构建 type-2 交易：
//!   `0x02 || rlp([chain_id, nonce, max_priority, max_fee, gas_limit, to, value, data, []])`
//! - 费用参数为 legacy 时构建 EIP-155 交易：
//!   `rlp([nonce, gas_price, gas_limit, to, value, data, chain_id, 0, 0])`
//!
//! 代币转账的 `to` 为合约地址，`data` 为 ERC-20 `transfer(address,uint256)`。

use rlp::RlpStream;

use crate::address::decimal::DecimalAddressConverter;
use crate::address::ethereum::{EthereumAddressService, EVM_ADDRESS_LEN};
use crate::crypto::{hash::keccak256, EllipticCurve, PublicKey, Signature};
use crate::domain::{AmountType, Blockchain, FeeParameters, SignedTransaction, Transaction, TransactionParams};
use crate::error::{Result, WalletError};
use crate::transaction::{ensure_blockchain, ensure_signature_count, missing_fee, TransactionBuilder};

/// 普通转账 gas
pub const COIN_TRANSFER_GAS: u64 = 21_000;
/// ERC-20 转账 gas
pub const TOKEN_TRANSFER_GAS: u64 = 65_000;

const EIP1559_TX_TYPE: u8 = 0x02;
const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

fn left_pad_32(bytes: &[u8]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(bytes);
    word
}

/// ERC-20 `transfer(to, amount)` 调用数据
pub fn erc20_transfer_data(to: &[u8; EVM_ADDRESS_LEN], amount: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 64);
    data.extend_from_slice(&TRANSFER_SELECTOR);
    data.extend_from_slice(&left_pad_32(to));
    data.extend_from_slice(&left_pad_32(&amount.to_be_bytes()));
    data
}

/// ERC-20 `balanceOf(owner)` 调用数据
pub fn erc20_balance_of_data(owner: &[u8; EVM_ADDRESS_LEN]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(&left_pad_32(owner));
    data
}

/// 已签名载荷的交易哈希（0x 前缀）
pub fn transaction_hash(payload: &[u8]) -> String {
    format!("0x{}", hex::encode(keccak256(payload)))
}

/// 0x 十六进制地址；Decimal 链同时接受 d0 地址
pub fn parse_evm_address(blockchain: Blockchain, address: &str) -> Result<[u8; EVM_ADDRESS_LEN]> {
    EthereumAddressService::parse(address)
        .or_else(|| match blockchain {
            Blockchain::Decimal { .. } => DecimalAddressConverter::decode(address),
            _ => None,
        })
        .ok_or_else(|| WalletError::invalid_address(address))
}

/// RLP 整数不能有前导零
fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// 链无关的交易字段
#[derive(Debug, Clone)]
struct EvmCall {
    nonce: u64,
    to: Vec<u8>,
    value: u128,
    data: Vec<u8>,
    gas_limit: u64,
    pricing: GasPricing,
}

#[derive(Debug, Clone, Copy)]
enum GasPricing {
    Legacy { gas_price: u128 },
    Eip1559 { max_fee_per_gas: u128, priority_fee: u128 },
}

impl EvmCall {
    fn append_eip1559_fields(&self, stream: &mut RlpStream, chain_id: u64, max_fee: u128, priority: u128) {
        stream.append(&chain_id);
        stream.append(&self.nonce);
        stream.append(&priority);
        stream.append(&max_fee);
        stream.append(&self.gas_limit);
        stream.append(&self.to);
        stream.append(&self.value);
        stream.append(&self.data);
        // access list
        stream.begin_list(0);
    }

    fn append_legacy_fields(&self, stream: &mut RlpStream, gas_price: u128) {
        stream.append(&self.nonce);
        stream.append(&gas_price);
        stream.append(&self.gas_limit);
        stream.append(&self.to);
        stream.append(&self.value);
        stream.append(&self.data);
    }

    fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        match self.pricing {
            GasPricing::Eip1559 {
                max_fee_per_gas,
                priority_fee,
            } => {
                let mut stream = RlpStream::new();
                stream.begin_list(9);
                self.append_eip1559_fields(&mut stream, chain_id, max_fee_per_gas, priority_fee);
                let mut payload = vec![EIP1559_TX_TYPE];
                payload.extend_from_slice(&stream.out());
                payload
            }
            GasPricing::Legacy { gas_price } => {
                let mut stream = RlpStream::new();
                stream.begin_list(9);
                self.append_legacy_fields(&mut stream, gas_price);
                stream.append(&chain_id);
                stream.append(&0u8);
                stream.append(&0u8);
                stream.out().to_vec()
            }
        }
    }

    fn signed_payload(&self, chain_id: u64, recovery_id: u8, r: &[u8], s: &[u8]) -> Vec<u8> {
        let r = trim_leading_zeros(r);
        let s = trim_leading_zeros(s);
        match self.pricing {
            GasPricing::Eip1559 {
                max_fee_per_gas,
                priority_fee,
            } => {
                let mut stream = RlpStream::new();
                stream.begin_list(12);
                self.append_eip1559_fields(&mut stream, chain_id, max_fee_per_gas, priority_fee);
                stream.append(&recovery_id);
                stream.append(&r);
                stream.append(&s);
                let mut payload = vec![EIP1559_TX_TYPE];
                payload.extend_from_slice(&stream.out());
                payload
            }
            GasPricing::Legacy { gas_price } => {
                // EIP-155: v = recovery_id + chain_id * 2 + 35
                let v = recovery_id as u64 + chain_id * 2 + 35;
                let mut stream = RlpStream::new();
                stream.begin_list(9);
                self.append_legacy_fields(&mut stream, gas_price);
                stream.append(&v);
                stream.append(&r);
                stream.append(&s);
                stream.out().to_vec()
            }
        }
    }
}

pub struct EthereumTransactionBuilder {
    blockchain: Blockchain,
    chain_id: u64,
    public_key: PublicKey,
}

impl EthereumTransactionBuilder {
    pub fn new(blockchain: Blockchain, public_key: PublicKey) -> Result<Self> {
        public_key.require_curve(&[EllipticCurve::Secp256k1])?;
        let chain_id = blockchain
            .evm_chain_id()
            .ok_or_else(|| WalletError::UnsupportedBlockchain(blockchain.display_name()))?;
        Ok(Self {
            blockchain,
            chain_id,
            public_key,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn parse_address(&self, address: &str) -> Result<[u8; EVM_ADDRESS_LEN]> {
        parse_evm_address(self.blockchain, address)
    }

    fn call(&self, transaction: &Transaction) -> Result<EvmCall> {
        ensure_blockchain(transaction, self.blockchain)?;

        let (gas_limit, pricing) = match transaction.fee.parameters {
            FeeParameters::EthereumEip1559 {
                gas_limit,
                max_fee_per_gas,
                priority_fee,
            } => (
                gas_limit,
                GasPricing::Eip1559 {
                    max_fee_per_gas,
                    priority_fee,
                },
            ),
            FeeParameters::EthereumLegacy {
                gas_limit,
                gas_price,
            } => (gas_limit, GasPricing::Legacy { gas_price }),
            _ => return Err(missing_fee(self.blockchain, "ethereum")),
        };

        let (nonce, extra_data) = match &transaction.params {
            TransactionParams::Ethereum {
                nonce: Some(nonce),
                data,
            } => (*nonce, data.clone().unwrap_or_default()),
            _ => return Err(WalletError::invalid_transaction("nonce is required")),
        };

        let destination = self.parse_address(&transaction.destination_address)?;
        let amount = transaction.amount.to_smallest_unit()?;

        let (to, value, data) = match &transaction.amount.amount_type {
            AmountType::Coin => (destination.to_vec(), amount, extra_data),
            AmountType::Token(token) => {
                let contract = self.parse_address(&token.contract_address)?;
                (contract.to_vec(), 0, erc20_transfer_data(&destination, amount))
            }
            other => {
                return Err(WalletError::invalid_transaction(format!(
                    "cannot transfer {:?} on {}",
                    other, self.blockchain
                )))
            }
        };

        Ok(EvmCall {
            nonce,
            to,
            value,
            data,
            gas_limit,
            pricing,
        })
    }
}

impl TransactionBuilder for EthereumTransactionBuilder {
    fn estimate_size(&self, transaction: &Transaction) -> Result<usize> {
        let call = self.call(transaction)?;
        Ok(call.signed_payload(self.chain_id, 1, &[0xff; 32], &[0xff; 32]).len())
    }

    fn build_for_sign(&self, transaction: &Transaction) -> Result<Vec<Vec<u8>>> {
        let call = self.call(transaction)?;
        Ok(vec![keccak256(&call.signing_payload(self.chain_id)).to_vec()])
    }

    fn build_for_send(
        &self,
        transaction: &Transaction,
        signatures: &[Signature],
    ) -> Result<SignedTransaction> {
        ensure_signature_count(1, signatures)?;
        let call = self.call(transaction)?;
        let hash = keccak256(&call.signing_payload(self.chain_id));

        let signature = &signatures[0];
        let recovery_id = signature.recovery_id(&hash, &self.public_key)?;
        let rs = signature.normalized()?;
        let payload = call.signed_payload(self.chain_id, recovery_id, &rs[..32], &rs[32..]);
        Ok(SignedTransaction::new(payload, transaction.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amount, Fee, Token};
    use k256::ecdsa::SigningKey;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn signer(seed: u8) -> (SigningKey, PublicKey) {
        let signing_key = SigningKey::from_slice(&[seed; 32]).unwrap();
        let public = signing_key.verifying_key().to_encoded_point(false);
        let key = PublicKey::new(public.as_bytes().to_vec(), EllipticCurve::Secp256k1).unwrap();
        (signing_key, key)
    }

    fn sign(signing_key: &SigningKey, hash: &[u8]) -> Signature {
        let (sig, _) = signing_key.sign_prehash_recoverable(hash).unwrap();
        Signature::new(sig.to_bytes().to_vec()).unwrap()
    }

    fn legacy_transfer(blockchain: Blockchain) -> Transaction {
        Transaction::new(
            Amount::coin(blockchain, Decimal::ONE),
            Fee::new(
                Amount::coin(blockchain, Decimal::from_str("0.00042").unwrap()),
                FeeParameters::EthereumLegacy {
                    gas_limit: 21_000,
                    gas_price: 20_000_000_000,
                },
            ),
            "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F",
            "0x3535353535353535353535353535353535353535",
        )
        .with_params(TransactionParams::Ethereum {
            nonce: Some(9),
            data: None,
        })
    }

    #[test]
    fn test_eip155_example() {
        let blockchain = Blockchain::Ethereum { testnet: false };
        let (signing_key, key) = signer(0x46);
        let builder = EthereumTransactionBuilder::new(blockchain, key).unwrap();
        let tx = legacy_transfer(blockchain);

        let hashes = builder.build_for_sign(&tx).unwrap();
        assert_eq!(
            hex::encode(&hashes[0]),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );

        let signed = builder
            .build_for_send(&tx, &[sign(&signing_key, &hashes[0])])
            .unwrap();
        assert_eq!(
            signed.payload_hex(),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
    }

    #[test]
    fn test_eip1559_envelope() {
        let blockchain = Blockchain::Polygon { testnet: false };
        let (signing_key, key) = signer(0x11);
        let builder = EthereumTransactionBuilder::new(blockchain, key).unwrap();
        let mut tx = legacy_transfer(blockchain);
        tx.fee.parameters = FeeParameters::EthereumEip1559 {
            gas_limit: 21_000,
            max_fee_per_gas: 60_000_000_000,
            priority_fee: 2_000_000_000,
        };

        let hashes = builder.build_for_sign(&tx).unwrap();
        let signed = builder
            .build_for_send(&tx, &[sign(&signing_key, &hashes[0])])
            .unwrap();
        assert_eq!(signed.payload[0], EIP1559_TX_TYPE);

        let rlp = rlp::Rlp::new(&signed.payload[1..]);
        assert_eq!(rlp.item_count().unwrap(), 12);
        assert_eq!(rlp.val_at::<u64>(0).unwrap(), 137);
        assert_eq!(rlp.val_at::<u64>(1).unwrap(), 9);
        assert!(rlp.val_at::<u8>(9).unwrap() <= 1);
        assert!(builder.estimate_size(&tx).unwrap() >= signed.payload.len());
    }

    #[test]
    fn test_token_transfer_targets_contract() {
        let blockchain = Blockchain::Ethereum { testnet: false };
        let (_, key) = signer(0x22);
        let builder = EthereumTransactionBuilder::new(blockchain, key).unwrap();
        let token = Token {
            name: "Tether".into(),
            symbol: "USDT".into(),
            contract_address: "0xdAC17F958D2ee523a2206206994597C13D831ec7".into(),
            decimal_count: 6,
        };
        let mut tx = legacy_transfer(blockchain);
        tx.amount = Amount::token(blockchain, token, Decimal::from_str("2.5").unwrap());

        let call = builder.call(&tx).unwrap();
        assert_eq!(call.value, 0);
        assert_eq!(hex::encode(&call.to), "dac17f958d2ee523a2206206994597c13d831ec7");
        assert_eq!(call.data.len(), 68);
        assert_eq!(&call.data[..4], &TRANSFER_SELECTOR);
        assert_eq!(&call.data[16..36], &[0x35; 20]);
        assert_eq!(
            u128::from_be_bytes(call.data[52..68].try_into().unwrap()),
            2_500_000
        );
    }

    #[test]
    fn test_build_errors() {
        let blockchain = Blockchain::Bsc { testnet: false };
        let (signing_key, key) = signer(0x33);
        let builder = EthereumTransactionBuilder::new(blockchain, key).unwrap();

        let mut tx = legacy_transfer(blockchain);
        tx.fee.parameters = FeeParameters::None;
        assert!(matches!(
            builder.build_for_sign(&tx),
            Err(WalletError::MissingFeeParameters { .. })
        ));

        let tx = legacy_transfer(blockchain).with_params(TransactionParams::None);
        assert!(matches!(
            builder.build_for_sign(&tx),
            Err(WalletError::InvalidTransaction(_))
        ));

        let tx = legacy_transfer(blockchain);
        let (other, _) = signer(0x34);
        let hash = builder.build_for_sign(&tx).unwrap().remove(0);
        assert!(builder.build_for_send(&tx, &[sign(&other, &hash)]).is_err());
        assert!(builder.build_for_send(&tx, &[sign(&signing_key, &hash)]).is_ok());

        let wrong_chain = legacy_transfer(Blockchain::Ethereum { testnet: false });
        assert!(matches!(
            builder.build_for_sign(&wrong_chain),
            Err(WalletError::AmountMismatch(_))
        ));
    }

    #[test]
    fn test_balance_of_data() {
        let data = erc20_balance_of_data(&[0xab; 20]);
        assert_eq!(hex::encode(&data[..4]), "70a08231");
        assert_eq!(data.len(), 36);
    }
}
