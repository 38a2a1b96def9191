//! End-to-end tests for the accumulator, the ledger, and stateless clients.
//!
//! Each test builds its own ledger and clients. Blocks are produced, committed
//! and fed to clients by hand, so forks can be arranged explicitly.

use std::collections::HashSet;

use trail_protocol::client::proof::reconstruct;
use trail_protocol::client::state::{prune, relevant_addresses, BranchHistory, ForkState};
use trail_protocol::client::{Client, ClientError, ObjectSet, UpdateOutcome};
use trail_protocol::config::SimulationConfig;
use trail_protocol::crypto::hash::{null_block_hash, Hash};
use trail_protocol::producer::BlockProducer;
use trail_protocol::simulation::{NoHook, Simulation};
use trail_protocol::storage::chain::ChainError;
use trail_protocol::storage::ledger::{CommittedBlock, Ledger};
use trail_protocol::transaction::types::{AccountId, PendingTxo, Transaction, Txo};
use trail_protocol::transaction::verification::{check_transaction, FeePolicy};
use trail_protocol::transaction::{TransactionError, TransferBuilder};
use trail_protocol::tree::address::proof_path;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const FEE: u64 = 1;

fn producer(account: AccountId) -> BlockProducer {
    BlockProducer::new(account as usize, account, FeePolicy::new(FEE, 10))
}

fn clients(n: u32) -> Vec<Client> {
    clients_with_window(n, 50)
}

fn clients_with_window(n: u32, archive_window: u64) -> Vec<Client> {
    (0..n)
        .map(|account| Client::new(account, archive_window))
        .collect()
}

/// Genesis with one object of `amount` per account in `0..n`.
fn genesis(ledger: &mut Ledger, n: u32, amount: u64) -> CommittedBlock {
    let seeds: Vec<PendingTxo> = (0..n)
        .map(|owner| PendingTxo::new(null_block_hash(), owner, amount))
        .collect();
    let produced = producer(99).build_genesis(&seeds).unwrap();
    ledger.commit(produced).unwrap()
}

fn extend(
    ledger: &mut Ledger,
    by: &BlockProducer,
    parent: Hash,
    txs: &[Transaction],
) -> CommittedBlock {
    let produced = by.build_block(ledger.chain(), parent, txs).unwrap();
    ledger.commit(produced).unwrap()
}

fn transfer(ledger: &Ledger, clients: &[Client], a: usize, b: usize) -> Transaction {
    TransferBuilder::new(ledger, FEE)
        .build(&clients[a], &clients[b])
        .unwrap()
}

fn update_all(clients: &mut [Client], ledger: &Ledger, block: &CommittedBlock) -> Vec<UpdateOutcome> {
    clients
        .iter_mut()
        .map(|client| client.update(ledger, block).unwrap())
        .collect()
}

fn amounts(client: &Client) -> Vec<u64> {
    client
        .unspent()
        .map(|set| set.values().map(|txo| txo.amount).collect())
        .unwrap_or_default()
}

/// History that records every address on `txo`'s path at `block`.
fn path_history(txo: &Txo, block: Hash) -> BranchHistory {
    proof_path(txo.leaf_index)
        .map(|address| (address, [block].into_iter().collect()))
        .collect()
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[test]
fn test_four_client_transfer_scenario() {
    let config = SimulationConfig {
        nodes: 1,
        clients: 4,
        end_height: 1,
        archive_window: 50,
        total_balance: 100,
        fee_per_txo: FEE,
        inputs_per_block: 2,
    };
    config.validate().unwrap();

    let mut ledger = Ledger::new();
    let mut clients = clients(4);
    let g = genesis(&mut ledger, 4, config.initial_balance());
    update_all(&mut clients, &ledger, &g);
    for client in &clients {
        assert_eq!(amounts(client), vec![25]);
    }

    let tx = transfer(&ledger, &clients, 0, 1);
    assert_eq!(tx.inputs.len(), 2);
    assert_eq!(
        tx.outputs.iter().map(|o| o.amount).collect::<Vec<_>>(),
        vec![24, 24]
    );

    let node = BlockProducer::new(0, 99, FeePolicy::new(FEE, config.inputs_per_block));
    let b1 = extend(&mut ledger, &node, g.hash, &[tx]);
    let outcomes = update_all(&mut clients, &ledger, &b1);

    assert_eq!(b1.height, 1);
    assert!(outcomes.iter().all(|o| *o == UpdateOutcome::Extended));
    assert_eq!(amounts(&clients[0]), vec![24]);
    assert_eq!(amounts(&clients[1]), vec![24]);
    assert_eq!(amounts(&clients[2]), vec![25]);
    assert_eq!(amounts(&clients[3]), vec![25]);

    let reward: Vec<&Txo> = b1.new_objects.iter().filter(|t| t.owner == 99).collect();
    assert_eq!(reward.len(), 1);
    assert_eq!(reward[0].amount, 2);
    assert_eq!(b1.spent_objects.len(), 2);
}

// ---------------------------------------------------------------------------
// Proof Properties
// ---------------------------------------------------------------------------

#[test]
fn test_unspent_object_proves_in_later_blocks() {
    let mut ledger = Ledger::new();
    let mut clients = clients(4);
    let g = genesis(&mut ledger, 4, 25);
    update_all(&mut clients, &ledger, &g);

    let mut parent = g.hash;
    for round in 0..3 {
        let tx = transfer(&ledger, &clients, 0, 1);
        let block = extend(&mut ledger, &producer(99), parent, &[tx]);
        update_all(&mut clients, &ledger, &block);
        parent = block.hash;

        let root = ledger.block(&block.hash).unwrap().tree_root;
        for txo in clients[3].unspent().unwrap().values() {
            let proof = clients[3].prove(&ledger, txo).unwrap();
            assert_eq!(proof.root(false), root, "round {round}");
        }
    }
}

#[test]
fn test_spend_flips_leaf_encoding() {
    let mut ledger = Ledger::new();
    let mut clients = clients(2);
    let g = genesis(&mut ledger, 2, 25);
    update_all(&mut clients, &ledger, &g);

    let target = *clients[0].unspent().unwrap().values().next().unwrap();
    let before = clients[0].prove(&ledger, &target).unwrap();
    let g_root = ledger.block(&g.hash).unwrap().tree_root;
    assert_eq!(before.root(false), g_root);

    let tx = transfer(&ledger, &clients, 0, 1);
    let b1 = extend(&mut ledger, &producer(99), g.hash, &[tx]);
    let b1_root = ledger.block(&b1.hash).unwrap().tree_root;

    let history = path_history(&target, b1.hash);
    let after = reconstruct(&ledger, &b1.hash, &target, &[&history]).unwrap();
    assert_eq!(after.root(true), b1_root);
    assert_ne!(after.root(false), b1_root);
    assert_eq!(ledger.block(&b1.hash).unwrap().parent_hash, g.hash);
}

#[test]
fn test_frontier_strictly_increases() {
    let config = SimulationConfig {
        nodes: 2,
        clients: 8,
        end_height: 6,
        archive_window: 3,
        total_balance: 8_000,
        fee_per_txo: FEE,
        inputs_per_block: 4,
    };
    let mut sim = Simulation::new(config, 5).unwrap();
    sim.run(&mut NoHook).unwrap();

    let (tip, _) = sim.tip().unwrap();
    let chain: Vec<_> = sim
        .ledger()
        .chain()
        .ancestors(tip)
        .map(|step| step.unwrap().1.clone())
        .collect();
    assert_eq!(chain.len(), 7);
    for pair in chain.windows(2) {
        let (child, parent) = (&pair[0], &pair[1]);
        assert!(child
            .rightmost_leaf_index
            .greater_than(&parent.rightmost_leaf_index));
    }
}

#[test]
fn test_accepted_transactions_conserve_value() {
    let mut ledger = Ledger::new();
    let mut clients = clients(4);
    let g = genesis(&mut ledger, 4, 25);
    update_all(&mut clients, &ledger, &g);

    let policy = FeePolicy::new(FEE, 10);
    let parent = ledger.block(&g.hash).unwrap().clone();
    for (a, b) in [(0, 1), (2, 3)] {
        let tx = transfer(&ledger, &clients, a, b);
        let fee_paid = check_transaction(&tx, &g.hash, &parent, &policy).unwrap();
        let inputs = tx.input_total().unwrap();
        let outputs = tx.output_total().unwrap();
        assert_eq!(outputs + tx.inputs.len() as u64 * FEE, inputs);
        assert_eq!(fee_paid, tx.inputs.len() as u64 * FEE);
    }
}

// ---------------------------------------------------------------------------
// Reorganizations
// ---------------------------------------------------------------------------

#[test]
fn test_reorg_matches_direct_path() {
    let mut ledger = Ledger::new();
    let left_node = producer(99);
    let right_node = producer(98);

    let g = genesis(&mut ledger, 4, 25);
    let mut left = clients(4);
    let mut right = clients(4);
    update_all(&mut left, &ledger, &g);
    update_all(&mut right, &ledger, &g);

    // Left branch: G -> B1 -> C1.
    let tx = transfer(&ledger, &left, 0, 1);
    let b1 = extend(&mut ledger, &left_node, g.hash, &[tx]);
    update_all(&mut left, &ledger, &b1);
    let tx = transfer(&ledger, &left, 2, 3);
    let c1 = extend(&mut ledger, &left_node, b1.hash, &[tx]);
    update_all(&mut left, &ledger, &c1);

    // Right branch: G -> B2 -> C2 -> D2.
    let tx = transfer(&ledger, &right, 2, 3);
    let b2 = extend(&mut ledger, &right_node, g.hash, &[tx]);
    update_all(&mut right, &ledger, &b2);
    let tx = transfer(&ledger, &right, 0, 2);
    let c2 = extend(&mut ledger, &right_node, b2.hash, &[tx]);
    update_all(&mut right, &ledger, &c2);
    let tx = transfer(&ledger, &right, 1, 3);
    let d2 = extend(&mut ledger, &right_node, c2.hash, &[tx]);
    update_all(&mut right, &ledger, &d2);

    // Same height as the left head: nothing happens.
    assert!(update_all(&mut left, &ledger, &c2)
        .iter()
        .all(|o| *o == UpdateOutcome::Ignored));

    let outcomes = update_all(&mut left, &ledger, &d2);
    assert!(outcomes
        .iter()
        .all(|o| *o == UpdateOutcome::Reorg { depth: 2 }));

    let d2_root = ledger.block(&d2.hash).unwrap().tree_root;
    for (moved, direct) in left.iter().zip(&right) {
        assert_eq!(moved.head(), Some(d2.hash));
        assert_eq!(moved.unspent(), direct.unspent());
        assert_eq!(moved.balance(), direct.balance());
        for txo in moved.unspent().unwrap().values() {
            let proof = moved.prove(&ledger, txo).unwrap();
            assert_eq!(proof.root(false), d2_root);
        }
    }
}

#[test]
fn test_reorg_deeper_than_archive_window() {
    let mut ledger = Ledger::new();
    let left_node = producer(99);
    let right_node = producer(98);

    let g = genesis(&mut ledger, 4, 25);
    let mut left = clients_with_window(4, 1);
    let mut right = clients_with_window(4, 1);
    update_all(&mut left, &ledger, &g);
    update_all(&mut right, &ledger, &g);

    // Left branch: G -> B1 -> C1 -> D1. Only B1 touches clients 0 and 1.
    let tx = transfer(&ledger, &left, 0, 1);
    let b1 = extend(&mut ledger, &left_node, g.hash, &[tx]);
    update_all(&mut left, &ledger, &b1);
    let mut parent = b1.hash;
    let mut left_tip = b1;
    for _ in 0..2 {
        let tx = transfer(&ledger, &left, 2, 3);
        left_tip = extend(&mut ledger, &left_node, parent, &[tx]);
        update_all(&mut left, &ledger, &left_tip);
        parent = left_tip.hash;
    }
    assert_eq!(left_tip.height, 3);
    // The spend in B1 is now two blocks past the window, and still held.
    assert_eq!(left[0].used_size(), 1);
    assert_eq!(left[1].used_size(), 1);

    // Right branch: G -> B2 -> C2 -> D2 -> E2, never touching 0 or 1.
    let mut parent = g.hash;
    let mut right_tip = None;
    for _ in 0..4 {
        let tx = transfer(&ledger, &right, 2, 3);
        let block = extend(&mut ledger, &right_node, parent, &[tx]);
        update_all(&mut right, &ledger, &block);
        parent = block.hash;
        right_tip = Some(block);
    }
    let e2 = right_tip.unwrap();
    assert_eq!(e2.height, 4);

    let outcomes = update_all(&mut left, &ledger, &e2);
    assert!(outcomes
        .iter()
        .all(|o| *o == UpdateOutcome::Reorg { depth: 3 }));

    assert_eq!(left[0].balance(), 25);
    assert_eq!(left[1].balance(), 25);
    let e2_root = ledger.block(&e2.hash).unwrap().tree_root;
    for (moved, direct) in left.iter().zip(&right) {
        assert_eq!(moved.head(), Some(e2.hash));
        assert_eq!(moved.unspent(), direct.unspent());
        assert_eq!(moved.balance(), direct.balance());
        for txo in moved.unspent().unwrap().values() {
            let proof = moved.prove(&ledger, txo).unwrap();
            assert_eq!(proof.root(false), e2_root);
        }
    }
}

#[test]
fn test_fast_forward_replays_skipped_blocks() {
    let mut ledger = Ledger::new();
    let node = producer(99);
    let g = genesis(&mut ledger, 4, 25);

    let mut active = clients(4);
    let mut sleeper = clients(4);
    update_all(&mut active, &ledger, &g);
    update_all(&mut sleeper, &ledger, &g);

    let mut parent = g.hash;
    let mut last = None;
    for (a, b) in [(0, 1), (1, 2), (2, 3)] {
        let tx = transfer(&ledger, &active, a, b);
        let block = extend(&mut ledger, &node, parent, &[tx]);
        update_all(&mut active, &ledger, &block);
        parent = block.hash;
        last = Some(block);
    }

    let last = last.unwrap();
    let outcomes = update_all(&mut sleeper, &ledger, &last);
    assert!(outcomes.iter().all(|o| *o == UpdateOutcome::FastForward));
    for (caught_up, direct) in sleeper.iter().zip(&active) {
        assert_eq!(caught_up.unspent(), direct.unspent());
        for txo in caught_up.unspent().unwrap().values() {
            assert!(caught_up.prove(&ledger, txo).is_ok());
        }
    }
}

#[test]
fn test_transfer_preconditions() {
    let mut ledger = Ledger::new();
    let g = genesis(&mut ledger, 4, 25);
    let mut group = clients(4);
    group[0].update(&ledger, &g).unwrap();

    let builder = TransferBuilder::new(&ledger, FEE);
    assert_eq!(
        builder.build(&group[0], &group[1]).unwrap_err(),
        TransactionError::NoHead
    );

    for client in &mut group[1..] {
        client.update(&ledger, &g).unwrap();
    }
    let tx = transfer(&ledger, &group, 2, 3);
    let b1 = extend(&mut ledger, &producer(99), g.hash, &[tx]);
    group[2].update(&ledger, &b1).unwrap();

    let err = TransferBuilder::new(&ledger, FEE)
        .build(&group[0], &group[2])
        .unwrap_err();
    assert_eq!(
        err,
        TransactionError::HeadMismatch {
            first: g.hash,
            second: b1.hash
        }
    );
    assert!(err.is_recoverable());

    let poor = TransferBuilder::new(&ledger, 100).build(&group[0], &group[1]);
    assert_eq!(
        poor.unwrap_err(),
        TransactionError::InsufficientFunds {
            total: 50,
            fee: 200
        }
    );
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

#[test]
fn test_memory_and_archive_keep_every_relevant_change() {
    let config = SimulationConfig {
        nodes: 2,
        clients: 6,
        end_height: 12,
        archive_window: 2,
        total_balance: 6_000,
        fee_per_txo: FEE,
        inputs_per_block: 4,
    };
    let mut sim = Simulation::new(config, 9).unwrap();
    sim.genesis(&mut NoHook).unwrap();

    let mut witnessed: Vec<(usize, trail_protocol::tree::BranchId, Hash)> = Vec::new();
    let mut archived_any = false;
    while !sim.is_finished() {
        sim.step(&mut NoHook).unwrap();
        let (tip, _) = sim.tip().unwrap();
        for (i, client) in sim.clients().iter().enumerate() {
            let relevant = relevant_addresses(client.unspent().unwrap());
            for address in relevant {
                if sim.ledger().branches().has_entry(&address, &tip) {
                    witnessed.push((i, address, tip));
                }
            }
            archived_any |= client.archive_size() > 0;
        }

        for (i, address, block) in &witnessed {
            let cache = sim.clients()[*i].cache();
            let known: HashSet<&Hash> = cache
                .memory
                .get(address)
                .into_iter()
                .chain(cache.archive.get(address))
                .flatten()
                .collect();
            assert!(known.contains(block));
        }
    }
    assert!(archived_any);
}

// ---------------------------------------------------------------------------
// Fault Paths and Pruning
// ---------------------------------------------------------------------------

#[test]
fn test_refeeding_a_block_is_ignored() {
    let mut ledger = Ledger::new();
    let node = producer(99);
    let g = genesis(&mut ledger, 4, 25);
    let mut clients = clients(4);
    update_all(&mut clients, &ledger, &g);
    let tx = transfer(&ledger, &clients, 0, 1);
    let b1 = extend(&mut ledger, &node, g.hash, &[tx]);
    update_all(&mut clients, &ledger, &b1);

    let before = clients[0].clone();
    for block in [&b1, &g] {
        assert_eq!(
            clients[0].update(&ledger, block).unwrap(),
            UpdateOutcome::Ignored
        );
    }
    let after = &clients[0];
    assert_eq!(after.head(), before.head());
    assert_eq!(after.unspent(), before.unspent());
    assert_eq!(after.objects(), before.objects());
    assert_eq!(after.unused_size(), before.unused_size());
    assert_eq!(after.used_size(), before.used_size());
    assert_eq!(after.memory_size(), before.memory_size());
    assert_eq!(after.archive_size(), before.archive_size());
}

#[test]
fn test_chain_skipping_below_head_height_is_fatal() {
    let mut ledger = Ledger::new();
    let node = producer(99);
    let g = genesis(&mut ledger, 4, 25);
    let mut clients = clients(4);
    update_all(&mut clients, &ledger, &g);
    let tx = transfer(&ledger, &clients, 0, 1);
    let b1 = extend(&mut ledger, &node, g.hash, &[tx]);
    update_all(&mut clients, &ledger, &b1);

    // A block on G that claims height 5: its chain never passes height 1.
    let tx = transfer(&ledger, &clients, 2, 3);
    let mut produced = node.build_block(ledger.chain(), g.hash, &[tx]).unwrap();
    produced.block.height = 5;
    let skipping = ledger.commit(produced).unwrap();

    let before = clients[2].clone();
    let err = clients[2].update(&ledger, &skipping).unwrap_err();
    assert!(matches!(
        err,
        ClientError::LowerHeightChain {
            account: 2,
            head_height: 1,
            found_height: 0,
        }
    ));
    assert_eq!(clients[2].head(), Some(b1.hash));
    assert_eq!(clients[2].unspent(), before.unspent());
    assert_eq!(clients[2].unused_size(), before.unused_size());
    assert_eq!(clients[2].memory_size(), before.memory_size());
}

#[test]
fn test_prune_keeps_spends_on_the_head_chain() {
    let mut ledger = Ledger::new();
    let node = producer(99);
    let g = genesis(&mut ledger, 4, 25);
    let mut clients = clients(4);
    update_all(&mut clients, &ledger, &g);
    let at_genesis = clients[0].unspent().cloned().unwrap();

    let tx = transfer(&ledger, &clients, 2, 3);
    let b2 = extend(&mut ledger, &node, g.hash, &[tx]);
    let tx = transfer(&ledger, &clients, 0, 1);
    let b1 = extend(&mut ledger, &node, g.hash, &[tx]);
    update_all(&mut clients, &ledger, &b1);
    let tx = transfer(&ledger, &clients, 2, 3);
    let c1 = extend(&mut ledger, &node, b1.hash, &[tx]);
    update_all(&mut clients, &ledger, &c1);
    let tx = transfer(&ledger, &clients, 2, 3);
    let d1 = extend(&mut ledger, &node, c1.hash, &[tx]);

    let mut forks = ForkState::default();
    for block in [g.hash, b1.hash, b2.hash, c1.hash, d1.hash] {
        forks.unused.insert(block, ObjectSet::new());
    }
    forks.used.insert(b1.hash, at_genesis.clone());
    forks.used.insert(b2.hash, at_genesis);

    prune(&mut forks, &ledger, &d1.hash, 1).unwrap();

    // Height 3 with a window of 1: unspent sets below height 2 go.
    let unused: HashSet<Hash> = forks.unused.keys().copied().collect();
    assert_eq!(unused, [c1.hash, d1.hash].into_iter().collect());
    // B1 is far past the window but on D1's chain; B2 is on another branch.
    assert!(forks.used.contains_key(&b1.hash));
    assert!(!forks.used.contains_key(&b2.hash));
}

#[test]
fn test_prune_on_unknown_head_fails_cleanly() {
    let mut ledger = Ledger::new();
    let g = genesis(&mut ledger, 2, 25);

    let mut forks = ForkState::default();
    forks.unused.insert(g.hash, ObjectSet::new());
    forks.used.insert(g.hash, ObjectSet::new());

    assert!(prune(&mut forks, &ledger, &[0xEE; 32], 1).is_err());
    assert_eq!(forks.unused.len(), 1);
    assert_eq!(forks.used.len(), 1);
}

#[test]
fn test_failed_update_leaves_client_unchanged() {
    // Two ledgers with the same blocks, except that `full` also holds the
    // abandoned fork block X1.
    let mut full = Ledger::new();
    let mut partial = Ledger::new();
    let node = producer(99);
    let seeds: Vec<PendingTxo> = (0..4)
        .map(|owner| PendingTxo::new(null_block_hash(), owner, 25))
        .collect();
    let produced = node.build_genesis(&seeds).unwrap();
    let g = full.commit(produced.clone()).unwrap();
    partial.commit(produced).unwrap();

    let mut clients = clients(4);
    update_all(&mut clients, &full, &g);

    let tx = transfer(&full, &clients, 0, 1);
    let x1 = extend(&mut full, &node, g.hash, &[tx]);
    clients[0].update(&full, &x1).unwrap();

    let mut parent = g.hash;
    let mut shared = Vec::new();
    for _ in 0..3 {
        let tx = transfer(&full, &clients, 2, 3);
        let produced = node.build_block(full.chain(), parent, &[tx]).unwrap();
        let block = full.commit(produced.clone()).unwrap();
        shared.push(partial.commit(produced).unwrap());
        for client in &mut clients[2..] {
            client.update(&full, &block).unwrap();
        }
        parent = block.hash;
    }
    let (y2, y3) = (&shared[1], &shared[2]);

    assert_eq!(
        clients[0].update(&full, y2).unwrap(),
        UpdateOutcome::Reorg { depth: 1 }
    );
    // X1's unspent set is still inside the window.
    assert!(clients[0].forks().unused.contains_key(&x1.hash));

    let before = clients[0].clone();
    let err = clients[0].update(&partial, y3).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Chain(ChainError::UnknownBlock(hash)) if hash == x1.hash
    ));
    let after = &clients[0];
    assert_eq!(after.head(), Some(y2.hash));
    assert_eq!(after.unspent(), before.unspent());
    assert_eq!(after.objects(), before.objects());
    assert_eq!(after.unused_size(), before.unused_size());
    assert_eq!(after.used_size(), before.used_size());
    assert_eq!(after.memory_size(), before.memory_size());
    assert_eq!(after.archive_size(), before.archive_size());

    // The same block goes through against the ledger that has X1.
    assert_eq!(
        clients[0].update(&full, y3).unwrap(),
        UpdateOutcome::Extended
    );
    assert_eq!(clients[0].balance(), 25);
}
