// Contract runtime benchmarks.
//
// Script interpretation per step, token transfers through a checkpoint,
// and the full executor path (id check, checkpoint, invoke, commit).

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};

use strat_contracts::{
    ContractCode, ContractRuntime, Op, Script, TokenSpec, TransactionExecutor,
};
use strat_protocol::crypto::Keypair;
use strat_protocol::storage::StateStore;
use strat_protocol::transaction::{create_contract_call, create_contract_deploy, Utxo};

/// Counts `n` down to zero.
fn countdown() -> Script {
    Script::new(vec![
        Op::Param("/params/n".into()),
        Op::Dup,
        Op::Push(json!(0)),
        Op::Gt,
        Op::Not,
        Op::JumpIf(9),
        Op::Push(json!(1)),
        Op::Sub,
        Op::Jump(1),
        Op::Return,
    ])
}

fn bench_script_loop(c: &mut Criterion) {
    let store = StateStore::new();
    let runtime = ContractRuntime::default();
    let code = ContractCode::Script(countdown());
    let mut group = c.benchmark_group("runtime/script_loop");

    for n in [10i64, 100, 1_000] {
        group.throughput(Throughput::Elements(n as u64));
        let params = json!({"method": "run", "params": {"n": n}});
        group.bench_with_input(BenchmarkId::from_parameter(n), &params, |b, params| {
            b.iter(|| {
                let mut cp = store.checkpoint("bench").unwrap();
                let inv = runtime.invoke("bench", "X", params, &code, &mut cp).unwrap();
                store.rollback(cp);
                inv
            });
        });
    }

    group.finish();
}

fn bench_token_transfer(c: &mut Criterion) {
    let store = StateStore::new();
    let runtime = ContractRuntime::default();
    let code = ContractCode::Token(TokenSpec::new("Bench", "BNC").with_initial_supply(u64::MAX / 2));

    let mut cp = store.checkpoint("tok").unwrap();
    runtime.construct("tok", "O", &code, &mut cp).unwrap();
    store.commit(cp).unwrap();

    let params = json!({"method": "transfer", "params": {"to": "Y", "amount": 1}});
    c.bench_function("runtime/token_transfer_commit", |b| {
        b.iter(|| {
            let mut cp = store.checkpoint("tok").unwrap();
            runtime.invoke("tok", "O", &params, &code, &mut cp).unwrap();
            store.commit(cp).unwrap()
        });
    });
}

fn bench_executor_apply(c: &mut Criterion) {
    let exec = TransactionExecutor::new(Arc::new(StateStore::new()), ContractRuntime::default());
    let keypair = Keypair::generate();
    let pool = vec![Utxo::new("genesis", 0, "O", 1_000_000)];

    let code = ContractCode::Token(TokenSpec::new("Bench", "BNC").with_initial_supply(1 << 40));
    let deploy = create_contract_deploy("O", code.to_value().unwrap(), &pool, &keypair, None).unwrap();
    let address = exec.apply(&deploy).unwrap().contract_address.unwrap();

    let call = create_contract_call(
        "O",
        &address,
        "transfer",
        json!({"to": "Y", "amount": 1}),
        &pool,
        &keypair,
        None,
    )
    .unwrap();
    let view = create_contract_call("O", &address, "totalSupply", Value::Null, &pool, &keypair, None)
        .unwrap();

    c.bench_function("executor/apply_transfer", |b| {
        b.iter(|| exec.apply(&call).unwrap());
    });
    c.bench_function("executor/apply_view", |b| {
        b.iter(|| exec.apply(&view).unwrap());
    });
}

criterion_group!(
    benches,
    bench_script_loop,
    bench_token_transfer,
    bench_executor_apply
);
criterion_main!(benches);
