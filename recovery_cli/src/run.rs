//! Wires the backup reader, key vault, address generator, scanner and
//! sweeper into the end-to-end recovery flow `main` drives.

use std::sync::Arc;

use bitcoin::Network;
use recovery_common::{BackupReader, KeyVault, ScriptFactory};
use recovery_core::address::AddressGenerator;
use recovery_core::indexer::provider::PUBLIC_SERVERS;
use recovery_core::indexer::{Pool, ServerProvider};
use recovery_core::scan::Scanner;
use recovery_core::sweep::Sweeper;
use recovery_core::Config;
use recovery_signer::{MultisigScriptFactory, MultisigSigner, MuunKeyVault};

use crate::args::Cli;
use crate::backup_reader::FileBackupReader;
use crate::prompts;

/// Process exit codes, per spec.
pub const EXIT_OK: i32 = 0;
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_CANNOT_CONNECT: i32 = 2;

pub fn run(cli: Cli) -> Result<i32, recovery_core::Error> {
    prompts::print_banner();

    let backup = match &cli.backup_path {
        Some(path) => FileBackupReader::new(path).read()?,
        None => recovery_common::BackupContents {
            encrypted_user_key: prompts::prompt_encrypted_key("first encrypted private key"),
            encrypted_cosigner_key: prompts::prompt_encrypted_key("second encrypted private key"),
            birthday: 0,
        },
    };

    let recovery_code = prompts::prompt_recovery_code();

    let vault = MuunKeyVault::new(Network::Bitcoin);
    let user_root = vault.decrypt(&recovery_code, &backup.encrypted_user_key)?;
    let cosigner_root = vault.decrypt(&recovery_code, &backup.encrypted_cosigner_key)?;

    let server_list: Vec<String> = match &cli.electrum_server {
        Some(pinned) => vec![pinned.clone()],
        None => PUBLIC_SERVERS.iter().map(|s| s.to_string()).collect(),
    };
    let servers = Arc::new(ServerProvider::new(server_list.clone()));

    let mut config = Config::default();
    if cli.electrum_server.is_some() {
        config.pool_size = 1;
        // A pinned server disables the fleet and allows non-TLS fallback.
        config.tls_required = false;
    }

    let pool = Arc::new(Pool::new(
        config.pool_size,
        ServerProvider::new(server_list),
        config.tls_required,
        config.connect_timeout,
        config.call_timeout,
        config.batch_call_timeout,
    ));

    if let Some(pinned) = &cli.electrum_server {
        if pool.acquire().is_err() {
            eprintln!("could not connect to {pinned}");
            return Ok(EXIT_CANNOT_CONNECT);
        }
    }

    let script_factory = MultisigScriptFactory::new(Network::Bitcoin);
    let addresses = AddressGenerator::new(
        user_root.as_ref(),
        cosigner_root.as_ref(),
        &script_factory as &dyn ScriptFactory,
        cli.generate_contacts,
    )?;

    let scanner = Scanner::new(pool.clone(), servers.clone(), config.batch_size, config.task_timeout);

    println!();
    println!("Scanning the blockchain for your wallet's unspent outputs.");
    println!("This may take a while.");

    let utxos = scanner.scan(addresses, |report| {
        print!(
            "\rscanned {} addresses, found {} unspent outputs",
            report.addresses_scanned, report.utxos_found
        );
    })?;
    println!();

    if utxos.is_empty() {
        println!("No unspent outputs found.");
        return Ok(EXIT_OK);
    }

    println!("Found {} unspent output(s).", utxos.len());

    if cli.only_scan {
        return Ok(EXIT_OK);
    }

    let (destination_str, destination_script) = prompts::prompt_destination_address(Network::Bitcoin);

    let signer = MultisigSigner::new();
    let sweeper = Sweeper::new(pool, servers, &signer);

    let total_sats: i64 = utxos.iter().map(|u| u.amount_sats).sum();
    let size = sweeper.probe_size(&utxos, &destination_script, user_root.as_ref(), cosigner_root.as_ref())?;
    let rate = prompts::prompt_fee_rate(total_sats, size);
    let value = Sweeper::compute_output_value(total_sats, rate, size)?;
    let fee = total_sats - value;

    if !prompts::confirm_sweep(value, fee, &destination_str) {
        println!("Recovery tool stopped.");
        return Ok(EXIT_OK);
    }

    let txid = sweeper.sweep(&utxos, &destination_script, value, user_root.as_ref(), cosigner_root.as_ref())?;
    prompts::print_farewell(&txid);

    Ok(EXIT_OK)
}
