use clap::Parser;

/// Recovers funds from a Muun two-signature wallet by rediscovering its
/// UTXOs across the wallet's full address space and sweeping them to a
/// destination address.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a backup PDF holding the two encrypted keys and the wallet
    /// birthday. When omitted, the keys are typed in at the prompts below.
    pub backup_path: Option<std::path::PathBuf>,

    /// Also derive the contacts branch (100 contacts x 200 addresses each).
    #[arg(long)]
    pub generate_contacts: bool,

    /// Pin a single `host:port` indexing server instead of the public
    /// fleet; allows a plaintext fallback if TLS fails.
    #[arg(long, value_name = "host:port")]
    pub electrum_server: Option<String>,

    /// Stop after the scan: report what was found and exit without asking
    /// for a destination address or fee.
    #[arg(long)]
    pub only_scan: bool,
}
