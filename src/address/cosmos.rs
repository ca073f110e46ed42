//! Cosmos 系列地址：bech32(hrp, hash160(压缩公钥))

use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32, Hrp};

use crate::address::{ensure_default_type, Address, AddressService, AddressType};
use crate::crypto::{hash::hash160, EllipticCurve, PublicKey};
use crate::error::{Result, WalletError};

pub struct CosmosAddressService {
    hrp: &'static str,
}

impl CosmosAddressService {
    pub fn new(hrp: &'static str) -> Self {
        Self { hrp }
    }

    pub fn cosmos_hub() -> Self {
        Self::new("cosmos")
    }
}

impl AddressService for CosmosAddressService {
    fn make_address(&self, public_key: &PublicKey, address_type: AddressType) -> Result<Address> {
        ensure_default_type("Cosmos", address_type)?;
        public_key.require_curve(&[EllipticCurve::Secp256k1])?;
        let hash = hash160(&public_key.compressed()?);
        let hrp = Hrp::parse(self.hrp).map_err(|e| WalletError::InvalidEncoding(e.to_string()))?;
        let value = bech32::encode::<Bech32>(hrp, &hash)
            .map_err(|e| WalletError::InvalidEncoding(e.to_string()))?;
        Ok(Address::new(value, AddressType::Default, public_key.clone()))
    }

    fn validate(&self, address: &str) -> bool {
        // 只接受 bech32 校验和，bech32m 不是合法的账户地址
        match CheckedHrpstring::new::<Bech32>(address) {
            // 20 字节账户或 32 字节模块账户
            Ok(checked) => {
                checked.hrp().to_lowercase() == self.hrp
                    && matches!(checked.byte_iter().count(), 20 | 32)
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_address() {
        let key = PublicKey::from_hex(
            "0241DCD64B5F4A039FC339A16300A833A883B218909F2EBCAF3906651C76842C45",
            EllipticCurve::Secp256k1,
        )
        .unwrap();
        let service = CosmosAddressService::cosmos_hub();
        let address = service.make_address(&key, AddressType::Default).unwrap();
        assert_eq!(address.value, "cosmos1c2zwqqucrqvvtyxfn78ajm8w2sgyjf5emztyek");
        assert!(service.validate(&address.value));
        assert!(!CosmosAddressService::new("osmo").validate(&address.value));
    }

    #[test]
    fn test_rejects_bech32m_checksum() {
        let service = CosmosAddressService::cosmos_hub();
        let hrp = Hrp::parse("cosmos").unwrap();
        let plain = bech32::encode::<Bech32>(hrp, &[0x42; 20]).unwrap();
        let modified = bech32::encode::<bech32::Bech32m>(hrp, &[0x42; 20]).unwrap();
        assert!(service.validate(&plain));
        assert!(!service.validate(&modified));
    }
}
