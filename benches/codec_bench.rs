//! 编解码与地址派生基准测试
//!
//! 测试场景:
//! 1. Base58 编码/解码（对照 bs58）
//! 2. Base58Check 校验和编解码
//! 3. 各链地址派生与校验

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ironcore_chains::address::{AddressServiceFactory, AddressType};
use ironcore_chains::crypto::{base_n, Alphabet, EllipticCurve, PublicKey};
use ironcore_chains::domain::Blockchain;

const COMPRESSED_KEY: &str = "0241DCD64B5F4A039FC339A16300A833A883B218909F2EBCAF3906651C76842C45";

fn bench_base58(c: &mut Criterion) {
    let mut group = c.benchmark_group("base58");

    for size in [21usize, 32, 64] {
        let payload: Vec<u8> = (0..size as u8).collect();
        let encoded = base_n::encode(&payload, &Alphabet::BITCOIN);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &payload, |b, payload| {
            b.iter(|| base_n::encode(black_box(payload), &Alphabet::BITCOIN))
        });
        group.bench_with_input(BenchmarkId::new("bs58_encode", size), &payload, |b, payload| {
            b.iter(|| bs58::encode(black_box(payload)).into_string())
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
            b.iter(|| base_n::decode(black_box(encoded), &Alphabet::BITCOIN))
        });
    }

    group.finish();
}

fn bench_base58_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("base58_check");
    let payload: Vec<u8> = std::iter::once(0x1e).chain([0x42u8; 20]).collect();
    let encoded = base_n::encode_check(&payload, &Alphabet::BITCOIN);

    group.bench_function("encode_check", |b| {
        b.iter(|| base_n::encode_check(black_box(&payload), &Alphabet::BITCOIN))
    });
    group.bench_function("decode_check", |b| {
        b.iter(|| base_n::decode_check(black_box(&encoded), &Alphabet::BITCOIN))
    });
    group.finish();
}

fn bench_address_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("address");
    let key = PublicKey::from_hex(COMPRESSED_KEY, EllipticCurve::Secp256k1).unwrap();

    let chains = [
        Blockchain::Bitcoin { testnet: false },
        Blockchain::Dogecoin,
        Blockchain::Ethereum { testnet: false },
        Blockchain::Decimal { testnet: false },
        Blockchain::Xrp {
            curve: EllipticCurve::Secp256k1,
        },
        Blockchain::Kaspa { testnet: false },
    ];

    for blockchain in chains {
        let service = AddressServiceFactory::make(blockchain).unwrap();
        let address = service
            .make_address(&key, AddressType::Default)
            .unwrap()
            .value;

        group.bench_function(BenchmarkId::new("make", blockchain.network_id()), |b| {
            b.iter(|| service.make_address(black_box(&key), AddressType::Default))
        });
        group.bench_function(BenchmarkId::new("validate", blockchain.network_id()), |b| {
            b.iter(|| service.validate(black_box(&address)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_base58,
    bench_base58_check,
    bench_address_derivation
);
criterion_main!(benches);
