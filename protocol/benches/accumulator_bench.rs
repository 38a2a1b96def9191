// Accumulator benchmarks.
//
// Covers block construction at a few batch sizes, spend-proof
// reconstruction from a client's cache, and one full simulated block.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use trail_protocol::client::Client;
use trail_protocol::config::SimulationConfig;
use trail_protocol::crypto::hash::null_block_hash;
use trail_protocol::producer::BlockProducer;
use trail_protocol::simulation::{NoHook, Simulation};
use trail_protocol::storage::ledger::Ledger;
use trail_protocol::transaction::types::{PendingTxo, Transaction};
use trail_protocol::transaction::verification::FeePolicy;
use trail_protocol::transaction::TransferBuilder;

const FEE: u64 = 1;

/// A ledger at genesis with `n` clients holding one object each.
fn seeded(n: u32) -> (Ledger, Vec<Client>, BlockProducer) {
    let producer = BlockProducer::new(0, n, FeePolicy::new(FEE, n as usize));
    let seeds: Vec<PendingTxo> = (0..n)
        .map(|owner| PendingTxo::new(null_block_hash(), owner, 1_000))
        .collect();
    let mut ledger = Ledger::new();
    let genesis = ledger
        .commit(producer.build_genesis(&seeds).expect("genesis"))
        .expect("commit");
    let mut clients: Vec<Client> = (0..n).map(|id| Client::new(id, 50)).collect();
    for client in &mut clients {
        client.update(&ledger, &genesis).expect("update");
    }
    (ledger, clients, producer)
}

fn bench_genesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("producer/genesis");
    for size in [16u32, 128, 1024] {
        let seeds: Vec<PendingTxo> = (0..size)
            .map(|owner| PendingTxo::new(null_block_hash(), owner, 10))
            .collect();
        let producer = BlockProducer::new(0, 0, FeePolicy::new(FEE, 1));
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &seeds, |b, seeds| {
            b.iter(|| producer.build_genesis(seeds).expect("genesis"));
        });
    }
    group.finish();
}

fn bench_build_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("producer/build_block");
    for pairs in [1u32, 8, 25] {
        let (ledger, clients, producer) = seeded(pairs * 2);
        let head = clients[0].head().expect("head");
        let builder = TransferBuilder::new(&ledger, FEE);
        let txs: Vec<Transaction> = clients
            .chunks(2)
            .map(|pair| builder.build(&pair[0], &pair[1]).expect("transfer"))
            .collect();

        group.throughput(Throughput::Elements(pairs as u64 * 2));
        group.bench_with_input(BenchmarkId::from_parameter(pairs * 2), &txs, |b, txs| {
            b.iter(|| {
                producer
                    .build_block(ledger.chain(), head, txs)
                    .expect("block")
            });
        });
    }
    group.finish();
}

fn bench_prove(c: &mut Criterion) {
    let (ledger, clients, _) = seeded(64);
    let client = &clients[17];
    let txo = *client
        .unspent()
        .and_then(|set| set.values().next())
        .expect("object");

    c.bench_function("client/prove", |b| {
        b.iter(|| client.prove(&ledger, &txo).expect("proof"));
    });
}

fn bench_simulated_block(c: &mut Criterion) {
    let config = SimulationConfig {
        nodes: 4,
        clients: 32,
        end_height: u64::MAX,
        archive_window: 10,
        total_balance: 32_000,
        fee_per_txo: FEE,
        inputs_per_block: 16,
    };
    let mut sim = Simulation::new(config, 1).expect("config");
    sim.genesis(&mut NoHook).expect("genesis");

    c.bench_function("simulation/step", |b| {
        b.iter(|| sim.step(&mut NoHook).expect("step"));
    });
}

criterion_group!(
    benches,
    bench_genesis,
    bench_build_block,
    bench_prove,
    bench_simulated_block
);
criterion_main!(benches);
