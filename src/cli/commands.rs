// Keystorage — CLI Command Handlers
//
// Each function handles one CLI subcommand. Commands that only read record
// metadata open the keystore locked; everything that encrypts or decrypts
// first verifies the access token.

use std::io::BufRead;

use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::{KeystorageError, Result};
use crate::store::{FileKeyStore, KeyStore, UpdateOutcome};

use super::Commands;

/// Execute the parsed CLI command.
pub fn execute(config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Init => cmd_init(config),
        Commands::Generate { account } => cmd_generate(config, account),
        Commands::Add { key, account } => cmd_add(config, key, account),
        Commands::List => cmd_list(config),
        Commands::Show { account } => cmd_show(config, account),
        Commands::Select { account } => cmd_select(config, account),
        Commands::Register { key } => cmd_register(config, key),
        Commands::BlockNumber { account, set } => cmd_block_number(config, account, set),
    }
}

// ─── Init ────────────────────────────────────────────────────────────────────

fn cmd_init(config: &Config) -> Result<()> {
    let mut store = FileKeyStore::open(&config.keystore_path)?;

    if store.has_token() {
        match config.token() {
            Some(token) => store.check_token(token)?,
            None if store.has_keys() => {
                return Err(KeystorageError::Config(
                    "the keystore already holds keys; supply the current token to rotate it"
                        .to_string(),
                ));
            }
            None => {}
        }
    }

    let rotated = store.has_keys();
    let token = store.generate_token()?;

    println!("✓ Keystorage initialized");
    println!("  Keystore: {}", store.path().display());
    if rotated {
        println!("  Re-encrypted {} key(s) under the new token", store.records().len());
    }
    println!();
    println!("  Token:    {}", token.as_str());
    println!();
    println!("This token is shown once. Keep it safe; it cannot be recovered.");

    Ok(())
}

// ─── Generate / Add ──────────────────────────────────────────────────────────

fn cmd_generate(config: &Config, account: Option<String>) -> Result<()> {
    let mut store = open_unlocked(config)?;
    let key = store.generate_new_key(account.as_deref())?;

    println!("✓ Key generated");
    println!("  Private key: {}", key.as_str());

    Ok(())
}

fn cmd_add(config: &Config, key: Option<String>, account: Option<String>) -> Result<()> {
    let key = match key {
        Some(key) => Zeroizing::new(key),
        None => read_key_from_stdin()?,
    };
    if key.trim().is_empty() {
        return Err(KeystorageError::Config("no private key given".to_string()));
    }

    let mut store = open_unlocked(config)?;
    store.add_existing_key(account.as_deref(), &key)?;

    println!("✓ Key stored");
    println!(
        "  Account: {}",
        crate::store::Account::resolve(account.as_deref())
    );

    Ok(())
}

// ─── List ────────────────────────────────────────────────────────────────────

fn cmd_list(config: &Config) -> Result<()> {
    let store = FileKeyStore::open(&config.keystore_path)?;
    let records = store.records();

    if records.is_empty() {
        println!("No keys stored yet.");
        println!("Add one with: keystorage add --account <name> --key <hex>");
        return Ok(());
    }

    println!("Stored keys ({}):\n", records.len());
    for record in &records {
        println!(
            "  {:>3} │ {:20} │ {:10} │ {}",
            record.index,
            record.account,
            if record.registered { "registered" } else { "-" },
            record.block_number,
        );
    }

    Ok(())
}

// ─── Show / Select ───────────────────────────────────────────────────────────

fn cmd_show(config: &Config, account: String) -> Result<()> {
    let mut store = open_unlocked(config)?;
    let entry = store.by_account(&account)?;

    println!("Key details:\n");
    println!("  Account:      {}", entry.account);
    println!("  Private key:  {}", entry.private.as_str());
    println!("  Registered:   {}", entry.registered);
    println!("  Block number: {}", entry.block_number);

    Ok(())
}

fn cmd_select(config: &Config, account: Option<String>) -> Result<()> {
    let mut store = open_unlocked(config)?;
    store.select_private_key(account.as_deref())?;

    if let Some(key) = store.selected_private_key() {
        println!("{}", key);
    }

    Ok(())
}

// ─── Register / Block Number ─────────────────────────────────────────────────

fn cmd_register(config: &Config, key: String) -> Result<()> {
    let key = Zeroizing::new(key);
    let mut store = open_unlocked(config)?;

    match store.set_registered(&key)? {
        UpdateOutcome::Updated => println!("✓ Key marked registered"),
        UpdateOutcome::NoMatch => println!("No stored key matches; nothing changed"),
    }

    Ok(())
}

fn cmd_block_number(config: &Config, account: Option<String>, set: Option<i64>) -> Result<()> {
    let mut store = open_unlocked(config)?;
    store.select_private_key(account.as_deref())?;

    if let Some(block_number) = set {
        match store.set_block_number(block_number)? {
            UpdateOutcome::Updated => println!("✓ Block number set to {}", block_number),
            UpdateOutcome::NoMatch => println!("Selected key not found; nothing changed"),
        }
        return Ok(());
    }

    match store.get_block_number()? {
        Some(block_number) => println!("{}", block_number),
        None => println!("Selected key not found"),
    }

    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Open the keystore and verify the configured access token.
fn open_unlocked(config: &Config) -> Result<FileKeyStore> {
    let token = config.require_token()?;
    let mut store = FileKeyStore::open(&config.keystore_path)?;

    if !store.has_token() {
        return Err(KeystorageError::Config(format!(
            "Keystore at {} has no access token. Run `keystorage init` first.",
            config.keystore_path.display()
        )));
    }

    store.check_token(token)?;
    Ok(store)
}

/// Read a single line holding a private key from stdin.
fn read_key_from_stdin() -> Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(Zeroizing::new(line.trim().to_string()))
}
