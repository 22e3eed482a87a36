//! Interactive terminal prompts, one re-prompt loop per input, grounded on
//! `examples/original_source/main.go`'s `read*` family.

use std::io::{self, Write};
use std::str::FromStr;

use bitcoin::{Address, Network, ScriptBuf};
use recovery_signer::vault::normalize_recovery_code;

/// Minimum pasted length for an encrypted key, loose enough to tolerate a
/// multi-line paste from a PDF viewer without pinning an exact byte count.
const MIN_ENCRYPTED_KEY_LEN: usize = 100;

pub fn print_banner() {
    println!("Welcome to the Recovery Tool");
    println!();
    println!("You can use this tool to transfer all funds from your cold wallet to an");
    println!("address of your choosing.");
    println!();
    println!("To do this you will need:");
    println!("1. Your Recovery Code, which you wrote down during your security setup");
    println!("2. Your two encrypted private keys, which you exported from your wallet");
    println!("3. A destination bitcoin address where all your funds will be sent");
    println!();
}

pub fn print_farewell(txid: &bitcoin::Txid) {
    println!();
    println!("Transaction sent! You can check its status on any block explorer:");
    println!("{txid}");
    println!();
    println!("We appreciate all kinds of feedback.");
}

fn read_line(prompt: &str) -> String {
    print!("{prompt}> ");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line).ok();
    line.trim().to_string()
}

pub fn prompt_recovery_code() -> String {
    loop {
        println!();
        println!("Enter your Recovery Code");
        println!("(it looks like this: 'ABCD-1234-POW2-R561-P120-JK26-12RW-45TT')");
        let input = read_line("");
        match normalize_recovery_code(&input) {
            Ok(code) => return code,
            Err(_) => {
                println!("Invalid recovery code: it must be 39 characters with 7 '-' separators.");
                println!("Please, try again");
            }
        }
    }
}

pub fn prompt_encrypted_key(label: &str) -> String {
    loop {
        println!();
        println!("Enter your {label}");
        println!("(it looks like this: '9xzpc7y6sNtRvh8Fh...')");
        let input = read_line("");
        if input.len() >= MIN_ENCRYPTED_KEY_LEN {
            return input;
        }
        println!("Your {label} looks too short; did the paste get cut off?");
        println!("Please, try again");
    }
}

pub fn prompt_destination_address(network: Network) -> (String, ScriptBuf) {
    loop {
        println!();
        println!("Enter your destination bitcoin address");
        let input = read_line("");
        let parsed = Address::from_str(&input).ok().and_then(|a| a.require_network(network).ok());
        match parsed {
            Some(address) => return (address.to_string(), address.script_pubkey()),
            None => {
                println!("This is not a valid bitcoin address for this network.");
                println!("Please, try again");
            }
        }
    }
}

pub fn prompt_fee_rate(total_sats: i64, weight_bytes: u64) -> u64 {
    loop {
        println!();
        println!(
            "Enter the fee in satoshis per byte. Tx weight: {weight_bytes} bytes. \
             You can check current mempool fees at any block explorer."
        );
        println!("(Example: 5)");
        let input = read_line("");
        match input.parse::<u64>() {
            Ok(rate) if rate >= 1 => {
                let fee = rate.saturating_mul(weight_bytes) as i64;
                if total_sats - fee < recovery_core::sweep::DUST_THRESHOLD_SATS {
                    println!("The fee is too high: the amount left must be above dust.");
                    println!("Please, try again");
                    continue;
                }
                return rate;
            }
            _ => {
                println!("The fee must be a positive whole number.");
                println!("Please, try again");
            }
        }
    }
}

/// Confirms the sweep (amount, fee, destination) before broadcasting,
/// mirroring `main.go`'s `readConfirmation`. Returns `false` on "n"/"N".
pub fn confirm_sweep(value_sats: i64, fee_sats: i64, destination: &str) -> bool {
    loop {
        println!();
        println!("About to send {value_sats} satoshis with fee {fee_sats} satoshis to {destination}");
        println!("Confirm? (y/n)");
        let input = read_line("");
        match input.as_str() {
            "y" | "Y" => return true,
            "n" | "N" => return false,
            _ => {
                println!("You can only enter 'y' to accept or 'n' to cancel");
            }
        }
    }
}
