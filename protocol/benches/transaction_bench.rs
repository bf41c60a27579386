// Transaction pipeline benchmarks.
//
// Covers canonical encoding, finalize (encode + SHA-256), signing every
// input, full verification, and UTXO selection over growing pools.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use strat_protocol::codec::encode_value;
use strat_protocol::crypto::Keypair;
use strat_protocol::transaction::{verify_transaction, TransactionBuilder, Utxo};
use strat_protocol::utxo::select_utxos;

fn draft(inputs: u32) -> TransactionBuilder {
    let mut builder = TransactionBuilder::new().set_timestamp(1_760_000_000_000);
    for i in 0..inputs {
        builder = builder.add_input(format!("{:064x}", i), i, 1_000);
    }
    builder
        .add_output("B", i64::from(inputs) * 900)
        .and_then(|b| b.set_fee(10))
        .unwrap()
}

fn bench_encode_payload(c: &mut Criterion) {
    let payload = json!({
        "method": "transfer",
        "params": {"to": "Y", "amount": 40, "memo": "invoice 2026-10"},
        "tags": ["a", "b", "c"],
    });

    c.bench_function("codec/encode_payload", |b| {
        b.iter(|| encode_value(&payload).unwrap());
    });
}

fn bench_finalize(c: &mut Criterion) {
    let builder = draft(4);
    c.bench_function("transaction/finalize_4_inputs", |b| {
        b.iter(|| builder.finalize().unwrap());
    });
}

fn bench_sign_and_verify(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let public_key = keypair.public_key();
    let mut group = c.benchmark_group("transaction/sign_verify");

    for inputs in [1u32, 4, 16] {
        group.throughput(Throughput::Elements(u64::from(inputs)));

        group.bench_with_input(BenchmarkId::new("sign", inputs), &inputs, |b, &n| {
            let builder = draft(n);
            b.iter(|| builder.clone().sign(&keypair, None).unwrap());
        });

        let tx = draft(inputs).sign(&keypair, None).unwrap().finalize().unwrap();
        group.bench_with_input(BenchmarkId::new("verify", inputs), &tx, |b, tx| {
            b.iter(|| verify_transaction(tx, |_| Some(public_key)).unwrap());
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("utxo/select");

    for size in [10usize, 100, 1_000] {
        let pool: Vec<Utxo> = (0..size)
            .map(|i| Utxo::new(format!("tx{}", i), 0, "A", 10))
            .collect();
        let target = (size as u64) * 10 - 5;

        group.bench_with_input(BenchmarkId::from_parameter(size), &pool, |b, pool| {
            b.iter(|| select_utxos(pool, target, 1).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_payload,
    bench_finalize,
    bench_sign_and_verify,
    bench_select
);
criterion_main!(benches);
