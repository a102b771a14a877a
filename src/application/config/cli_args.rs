use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

use crate::state::wallet::key_encoding::SecretEncoding;
use crate::state::wallet::seed_phrase::EntropySize;

/// The `walletforge` command-line program generates, stores and manages
/// batches of recoverable ed25519 wallets.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// The data directory that holds the wallet store
    ///
    /// The default varies by operating system, e.g.
    ///
    /// Linux:   /home/alice/.local/share/walletforge
    ///
    /// Windows: C:\Users\Alice\AppData\Roaming\walletforge\data
    ///
    /// macOS:   /Users/Alice/Library/Application Support/org.walletforge.walletforge
    #[clap(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Use a throwaway in-memory store instead of the data directory.
    ///
    /// Everything generated is lost when the program exits.
    #[clap(long, global = true, conflicts_with = "data_dir")]
    pub in_memory: bool,

    /// Entropy of newly generated seed phrases, in bits.
    ///
    /// 128, 160, 192, 224 and 256 give 12, 15, 18, 21 and 24 words.
    #[clap(long, default_value = "128", value_parser = parse_entropy_bits, global = true)]
    pub entropy_bits: EntropySize,

    /// Encoding used when printing private keys.
    #[clap(long, value_enum, default_value_t = SecretEncoding::Base64, global = true)]
    pub encoding: SecretEncoding,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Generate a batch of wallets and store it.
    Generate {
        /// Number of wallets, between 1 and 100.
        #[clap(long, short = 'n', default_value = "1")]
        count: usize,

        /// Label stored with every wallet of the batch.
        #[clap(long)]
        prefix: Option<String>,

        /// Print the batch without storing it.
        #[clap(long)]
        no_save: bool,

        /// Also print private keys and seed phrases.
        #[clap(long)]
        show_secrets: bool,

        /// Emit JSON instead of text.
        #[clap(long)]
        json: bool,
    },

    /// List stored wallets, newest first.
    List {
        /// Include private keys and seed phrases.
        #[clap(long)]
        show_secrets: bool,

        #[clap(long)]
        json: bool,
    },

    /// Show one stored wallet, including its secrets.
    Get {
        id: String,

        #[clap(long)]
        json: bool,
    },

    /// Delete one stored wallet by id.
    Delete { id: String },

    /// Show wallet counters and the estimated store size.
    Stats {
        #[clap(long)]
        json: bool,
    },

    /// Rebuild a wallet from its seed phrase.
    Recover {
        /// The seed phrase words, separated by spaces.
        #[clap(required = true, num_args = 1..)]
        words: Vec<String>,

        /// Store the recovered wallet as a one-wallet batch.
        #[clap(long)]
        save: bool,

        #[clap(long)]
        prefix: Option<String>,
    },

    /// Show the most recent generation batches.
    Batches {
        #[clap(long, default_value = "10")]
        limit: usize,
    },

    /// Check counters and index against the stored records.
    Audit {
        /// Drop dangling index entries and reset the total counter.
        #[clap(long)]
        repair: bool,
    },

    /// Check that a stored wallet derives from its seed phrase.
    Verify { id: String },
}

fn parse_entropy_bits(s: &str) -> Result<EntropySize, String> {
    s.parse::<EntropySize>().map_err(|e| e.to_string())
}
