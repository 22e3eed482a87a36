//! End-to-end scenarios against a mock Electrum server, covering the
//! concrete cases from the design notes: empty wallet, single and multiple
//! discovered UTXOs with a flaky server, dust rejection, and batch/sequential
//! equivalence.

mod mock_server;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bitcoin::bip32::Xpriv;
use bitcoin::hashes::Hash;
use bitcoin::{Network, Txid};
use recovery_common::{HdPrivateKey, ScriptFactory, ScriptVersion};
use recovery_core::address::AddressGenerator;
use recovery_core::indexer::{Pool, ServerProvider};
use recovery_core::scan::Scanner;
use recovery_core::sweep::Sweeper;
use recovery_signer::hd::Bip32HdPrivateKey;
use recovery_signer::script::MultisigScriptFactory;
use recovery_signer::signer::MultisigSigner;
use serde_json::{json, Value};

use mock_server::{electrumx_identity, MockServer};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const CALL_TIMEOUT: Duration = Duration::from_secs(5);
const BATCH_CALL_TIMEOUT: Duration = Duration::from_secs(10);

fn user_root() -> Bip32HdPrivateKey {
    Bip32HdPrivateKey::new(Xpriv::new_master(Network::Bitcoin, &[7u8; 32]).unwrap())
}

fn cosigner_root() -> Bip32HdPrivateKey {
    Bip32HdPrivateKey::new(Xpriv::new_master(Network::Bitcoin, &[9u8; 32]).unwrap())
}

fn pool_for(server_addr: &str, pool_size: usize) -> Arc<Pool> {
    let provider = ServerProvider::new(vec![server_addr.to_string()]);
    Arc::new(Pool::new(
        pool_size,
        provider,
        false,
        CONNECT_TIMEOUT,
        CALL_TIMEOUT,
        BATCH_CALL_TIMEOUT,
    ))
}

fn servers_for(server_addr: &str) -> Arc<ServerProvider> {
    Arc::new(ServerProvider::new(vec![server_addr.to_string()]))
}

fn sample_txid(byte: u8) -> Txid {
    Txid::from_raw_hash(bitcoin::hashes::sha256d::Hash::from_byte_array([byte; 32]))
}

/// Scenario 1: empty wallet. The full address space (no contacts) is
/// 20,008 addresses; the mock server returns `[]` for every scripthash, and
/// the scanner's final report accounts for every address, including the
/// last, partially-filled batch.
#[test]
fn empty_wallet_scans_full_address_space_and_finds_nothing() {
    let server = MockServer::start(|method, _params| match method {
        "server.version" => Ok(electrumx_identity()),
        "blockchain.scripthash.listunspent" => Ok(json!([])),
        other => Err(format!("unexpected method {other}")),
    });

    let user = user_root();
    let cosigner = cosigner_root();
    let factory = MultisigScriptFactory::default();
    let addresses = AddressGenerator::new(&user, &cosigner, &factory, false).unwrap();

    let pool = pool_for(&server.addr, 4);
    let servers = servers_for(&server.addr);
    let scanner = Scanner::new(pool, servers, 100, Duration::from_secs(30));

    let mut last_report = None;
    let utxos = scanner
        .scan(addresses, |report| last_report = Some(report.clone()))
        .unwrap();

    assert!(utxos.is_empty());
    let report = last_report.expect("at least one progress report");
    assert_eq!(report.addresses_scanned, 20_008);
    assert_eq!(report.utxos_found, 0);
}

/// Scenario 2: a single change-branch UTXO is discovered and swept at a
/// user-chosen fee rate.
#[test]
fn single_change_utxo_is_found_and_swept() {
    let user = user_root();
    let cosigner = cosigner_root();
    let factory = MultisigScriptFactory::default();

    let change_user = user.derive_to("m/1'/1'/0").unwrap().derived_at(7, false).unwrap();
    let change_cosigner = cosigner.derive_to("m/1'/1'/0").unwrap().derived_at(7, false).unwrap();
    let target_address = factory
        .build(ScriptVersion::V4, "m/1'/1'/0/7", &change_user.public_key(), &change_cosigner.public_key())
        .unwrap();
    let target_hash = target_address.index_hash().to_hex();
    let target_txid = sample_txid(0x42);

    let server = MockServer::start(move |method, params| match method {
        "server.version" => Ok(electrumx_identity()),
        "blockchain.scripthash.listunspent" => {
            let hash = params.first().and_then(Value::as_str).unwrap_or_default();
            if hash == target_hash {
                Ok(json!([{ "tx_hash": target_txid.to_string(), "tx_pos": 0u32, "value": 50_000i64, "height": 700_000 }]))
            } else {
                Ok(json!([]))
            }
        }
        "blockchain.transaction.broadcast" => Ok(json!(target_txid.to_string())),
        other => Err(format!("unexpected method {other}")),
    });

    let addresses = AddressGenerator::new(&user, &cosigner, &factory, false).unwrap();
    let pool = pool_for(&server.addr, 4);
    let servers = servers_for(&server.addr);
    let scanner = Scanner::new(pool.clone(), servers.clone(), 100, Duration::from_secs(30));

    let utxos = scanner.scan(addresses, |_| {}).unwrap();
    assert_eq!(utxos.len(), 1);
    let utxo = &utxos[0];
    assert_eq!(utxo.amount_sats, 50_000);
    assert_eq!(utxo.address.encoded, target_address.encoded);

    let signer = MultisigSigner::new();
    let sweeper = Sweeper::new(pool, servers, &signer);
    let destination = bitcoin::ScriptBuf::new_p2wpkh(&bitcoin::WPubkeyHash::from_byte_array([1u8; 20]));

    // The Signer contract re-derives each input's child key from
    // `address.derivation_path`, so it must be handed the wallet *root*
    // keys, not the already-derived change-branch children used above only
    // to pin down which scripthash the mock server should answer for.
    let user_key: &dyn HdPrivateKey = &user;
    let cosigner_key: &dyn HdPrivateKey = &cosigner;

    let size = sweeper.probe_size(&utxos, &destination, user_key, cosigner_key).unwrap();
    let total: i64 = utxos.iter().map(|u| u.amount_sats).sum();
    let rate = 2u64;
    let value = Sweeper::compute_output_value(total, rate, size).unwrap();
    assert_eq!(total - value, (rate * size) as i64);
    assert!(value >= recovery_core::sweep::DUST_THRESHOLD_SATS);

    let txid = sweeper.sweep(&utxos, &destination, value, user_key, cosigner_key).unwrap();
    assert_eq!(txid, target_txid);
}

/// Scenario 3: two UTXOs on distinct addresses; the first server fails
/// after its first batch, the pool rotates to a second server, and the
/// scan still completes with both UTXOs found.
#[test]
fn scan_survives_one_flaky_server_via_rotation() {
    let txid_a = sample_txid(0xaa);
    let txid_b = sample_txid(0xbb);

    let user = user_root();
    let cosigner = cosigner_root();
    let factory = MultisigScriptFactory::default();

    let addr_a = {
        let u = user.derive_to("m/1'/1'/0").unwrap().derived_at(3, false).unwrap();
        let c = cosigner.derive_to("m/1'/1'/0").unwrap().derived_at(3, false).unwrap();
        factory.build(ScriptVersion::V4, "m/1'/1'/0/3", &u.public_key(), &c.public_key()).unwrap()
    };
    let addr_b = {
        let u = user.derive_to("m/1'/1'/1").unwrap().derived_at(10, false).unwrap();
        let c = cosigner.derive_to("m/1'/1'/1").unwrap().derived_at(10, false).unwrap();
        factory.build(ScriptVersion::V4, "m/1'/1'/1/10", &u.public_key(), &c.public_key()).unwrap()
    };
    let hash_a = addr_a.index_hash().to_hex();
    let hash_b = addr_b.index_hash().to_hex();

    // A "flaky" server: answers server.version, then fails every
    // scripthash lookup, simulating a server that drops mid-scan. The
    // client sees this as a broken connection and the pool discards it,
    // rotating to the healthy server for the retry.
    let calls = Arc::new(AtomicUsize::new(0));
    let flaky_calls = calls.clone();
    let flaky = MockServer::start(move |method, _params| {
        if method == "server.version" {
            return Ok(electrumx_identity());
        }
        flaky_calls.fetch_add(1, Ordering::SeqCst);
        Err("simulated failure".to_string())
    });

    let healthy_hash_a = hash_a.clone();
    let healthy_hash_b = hash_b.clone();
    let healthy = MockServer::start(move |method, params| match method {
        "server.version" => Ok(electrumx_identity()),
        "blockchain.scripthash.listunspent" => {
            let hash = params.first().and_then(Value::as_str).unwrap_or_default();
            if hash == healthy_hash_a {
                Ok(json!([{ "tx_hash": txid_a.to_string(), "tx_pos": 0u32, "value": 10_000i64, "height": 0 }]))
            } else if hash == healthy_hash_b {
                Ok(json!([{ "tx_hash": txid_b.to_string(), "tx_pos": 1u32, "value": 20_000i64, "height": 0 }]))
            } else {
                Ok(json!([]))
            }
        }
        other => Err(format!("unexpected method {other}")),
    });

    // Pool of 1 and batch size 1: every batch after the first must rotate
    // off the broken connection onto the healthy one to succeed.
    let provider = ServerProvider::new(vec![flaky.addr.clone(), healthy.addr.clone()]);
    let pool = Arc::new(Pool::new(1, provider, false, CONNECT_TIMEOUT, CALL_TIMEOUT, BATCH_CALL_TIMEOUT));
    let servers = Arc::new(ServerProvider::new(vec![flaky.addr.clone(), healthy.addr.clone()]));
    let scanner = Scanner::new(pool, servers, 1, Duration::from_secs(5));

    let addresses = vec![addr_a, addr_b].into_iter();
    let utxos = scanner.scan(addresses, |_| {}).unwrap();

    let total: i64 = utxos.iter().map(|u| u.amount_sats).sum();
    assert_eq!(utxos.len(), 2);
    assert_eq!(total, 30_000);
}

/// Scenario 4: a 600-sat UTXO rejects a fee rate that would push the
/// remaining output below the dust threshold.
#[test]
fn dust_rejection_is_enforced() {
    let total = 600i64;
    let rate = 10u64;
    let size = 120u64;
    let err = Sweeper::compute_output_value(total, rate, size).unwrap_err();
    assert!(err.to_string().contains("dust"));
}

/// Scenario 5: a batch-capable and a non-batch-capable server, given the
/// same underlying data, produce identical UTXO sets.
#[test]
fn batch_and_sequential_servers_agree() {
    let user = user_root();
    let cosigner = cosigner_root();
    let factory = MultisigScriptFactory::default();

    let addrs: Vec<_> = (0..5u32)
        .map(|i| {
            let u = user.derive_to("m/1'/1'/0").unwrap().derived_at(i, false).unwrap();
            let c = cosigner.derive_to("m/1'/1'/0").unwrap().derived_at(i, false).unwrap();
            factory
                .build(ScriptVersion::V4, &format!("m/1'/1'/0/{i}"), &u.public_key(), &c.public_key())
                .unwrap()
        })
        .collect();

    let responses: HashMap<String, Value> = addrs
        .iter()
        .enumerate()
        .map(|(i, a)| {
            (
                a.index_hash().to_hex(),
                if i == 2 {
                    json!([{ "tx_hash": sample_txid(i as u8).to_string(), "tx_pos": 0u32, "value": 1000i64 * (i as i64 + 1), "height": 0 }])
                } else {
                    json!([])
                },
            )
        })
        .collect();

    let batching = responses.clone();
    let batch_server = MockServer::start(move |method, params| match method {
        "server.version" => Ok(electrumx_identity()),
        "blockchain.scripthash.listunspent" => {
            let hash = params.first().and_then(Value::as_str).unwrap_or_default();
            Ok(batching.get(hash).cloned().unwrap_or(json!([])))
        }
        other => Err(format!("unexpected method {other}")),
    });

    let sequential = responses;
    let seq_server = MockServer::start(move |method, params| match method {
        "server.version" => Ok(json!(["SomeOtherServer 1.0", "1.4"])),
        "blockchain.scripthash.listunspent" => {
            let hash = params.first().and_then(Value::as_str).unwrap_or_default();
            Ok(sequential.get(hash).cloned().unwrap_or(json!([])))
        }
        other => Err(format!("unexpected method {other}")),
    });

    let pool_batch = pool_for(&batch_server.addr, 2);
    let servers_batch = servers_for(&batch_server.addr);
    let scanner_batch = Scanner::new(pool_batch, servers_batch, 5, Duration::from_secs(10));
    let utxos_batch = scanner_batch.scan(addrs.clone().into_iter(), |_| {}).unwrap();

    let pool_seq = pool_for(&seq_server.addr, 2);
    let servers_seq = servers_for(&seq_server.addr);
    let scanner_seq = Scanner::new(pool_seq, servers_seq, 5, Duration::from_secs(10));
    let utxos_seq = scanner_seq.scan(addrs.into_iter(), |_| {}).unwrap();

    let key = |u: &recovery_common::Utxo| (u.outpoint_key(), u.amount_sats);
    let mut batch_keys: Vec<_> = utxos_batch.iter().map(key).collect();
    let mut seq_keys: Vec<_> = utxos_seq.iter().map(key).collect();
    batch_keys.sort();
    seq_keys.sort();
    assert_eq!(batch_keys, seq_keys);
}
