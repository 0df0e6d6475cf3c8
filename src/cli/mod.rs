// Keystorage — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, generate, add, list, show, select, register, block-number.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::execute;

/// Keystorage — encrypted custody of operator private keys.
#[derive(Parser)]
#[command(name = "keystorage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the keystore file.
    #[arg(long, global = true, env = "KEYSTORAGE_PATH")]
    pub keystore: Option<PathBuf>,

    /// Access token unlocking the keystore.
    /// Prefer the environment variable to keep it out of shell history.
    #[arg(long, global = true, env = "KEYSTORAGE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the keystore if needed and generate a new access token.
    /// Existing keys are re-encrypted when the current token is supplied.
    Init,

    /// Generate a new private key and store it.
    Generate {
        /// Account label; defaults to "autogenerated".
        #[arg(long)]
        account: Option<String>,
    },

    /// Store an existing private key.
    Add {
        /// The private key as hex, with or without a 0x prefix.
        /// Read from stdin when omitted.
        #[arg(long)]
        key: Option<String>,

        /// Account label; defaults to "autogenerated".
        #[arg(long)]
        account: Option<String>,
    },

    /// List stored keys (metadata only, no secrets).
    List,

    /// Print the decrypted key stored under an account.
    Show {
        #[arg(long)]
        account: String,
    },

    /// Print the key that would be selected for an account, falling back to
    /// the first key.
    Select {
        #[arg(long)]
        account: Option<String>,
    },

    /// Mark a stored key as registered.
    Register {
        /// The private key as hex, with or without a 0x prefix.
        #[arg(long)]
        key: String,
    },

    /// Read or update the block number of the selected key.
    BlockNumber {
        /// Account whose key is selected; defaults to the first key.
        #[arg(long)]
        account: Option<String>,

        /// New block number to record.
        #[arg(long)]
        set: Option<i64>,
    },
}
