//! Tally command-line front-end
//!
//! Exit codes: 0 success, 1 usage error, 2 domain error (missing account,
//! integrity failure, bad password, ...).

mod store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use store::Store;
use tally_core::{
    crypto, AccountType, Auditor, Config, Error, KeyPair, SecretBytes, Transaction,
};

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Double-entry ledger with a hash-chained journal")]
struct Cli {
    /// Data directory (default ./data, or TALLY_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage accounts
    #[command(subcommand)]
    Account(AccountCmd),

    /// Record transactions
    #[command(subcommand)]
    Tx(TxCmd),

    /// Print an account balance
    Balance {
        /// Account name
        name: String,
    },

    /// Audit the ledger against the journal
    #[command(subcommand)]
    Audit(AuditCmd),

    /// Inspect and export the journal
    #[command(subcommand)]
    Journal(JournalCmd),

    /// Generate an Ed25519 key pair
    Keygen {
        /// Write the hex seed here (and the public key to <file>.pub);
        /// prints to stdout when absent
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Produce a detached signature over a file
    Sign {
        /// File to sign
        #[arg(long = "in")]
        input: PathBuf,
        /// Hex seed file from `keygen`
        #[arg(long)]
        key: PathBuf,
        /// Write the hex signature here; prints to stdout when absent
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Verify a detached signature
    Verify {
        /// Signed file
        #[arg(long = "in")]
        input: PathBuf,
        /// Hex signature file
        #[arg(long)]
        sig: PathBuf,
        /// Hex public key file
        #[arg(long)]
        key: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum AccountCmd {
    /// Create an account; fails if it exists
    Create {
        name: String,
        /// asset | liability | equity | revenue | expense
        r#type: String,
        currency: String,
    },
    /// List all accounts
    List,
}

#[derive(Subcommand, Debug)]
enum TxCmd {
    /// Apply a transaction and append it to the journal
    Add {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Amount in the asset's smallest unit
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        memo: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AuditCmd {
    /// Summary of audit booleans and counts
    Verify,
    /// Full JSON audit report
    Report,
}

#[derive(Subcommand, Debug)]
enum JournalCmd {
    /// Enumerate journal entries
    List,
    /// Write the plaintext journal to a file
    Export { file: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap renders its own message; all parse failures are usage
            // errors
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> tally_core::Result<()> {
    let config = Config::from_env();
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data_dir.clone());
    let store = Store::open(&data_dir)?;

    match cli.command {
        Command::Account(cmd) => run_account(&store, cmd),
        Command::Tx(cmd) => run_tx(&store, cmd),
        Command::Balance { name } => {
            let (ledger, _) = store.load()?;
            println!("{}", ledger.balance(&name)?);
            Ok(())
        }
        Command::Audit(cmd) => run_audit(&store, &config, cmd),
        Command::Journal(cmd) => run_journal(&store, cmd),
        Command::Keygen { out } => run_keygen(out),
        Command::Sign { input, key, out } => run_sign(&input, &key, out),
        Command::Verify { input, sig, key } => run_verify(&input, &sig, &key),
    }
}

fn run_account(store: &Store, cmd: AccountCmd) -> tally_core::Result<()> {
    match cmd {
        AccountCmd::Create {
            name,
            r#type,
            currency,
        } => {
            let account_type = AccountType::parse(&r#type).ok_or_else(|| {
                Error::Config(format!(
                    "unknown account type '{}', expected asset|liability|equity|revenue|expense",
                    r#type
                ))
            })?;
            store.add_account(&name, account_type, &currency)?;
            println!("created {} ({}, {})", name, account_type, currency);
            Ok(())
        }
        AccountCmd::List => {
            let (ledger, _) = store.load()?;
            for row in ledger.trial_balance() {
                println!(
                    "{:<24} {:<10} {:>16} {}",
                    row.name, row.account_type, row.balance, row.currency
                );
            }
            Ok(())
        }
    }
}

fn run_tx(store: &Store, cmd: TxCmd) -> tally_core::Result<()> {
    match cmd {
        TxCmd::Add {
            from,
            to,
            amount,
            currency,
            memo,
        } => {
            let (mut ledger, mut journal) = store.load()?;
            let tx = Transaction::new(amount, currency, from, to, memo);
            ledger.process_transaction(&tx)?;
            let entry = journal.append(&tx)?;
            println!("appended {} at sequence {}", tx.id, entry.sequence);
            Ok(())
        }
    }
}

fn run_audit(store: &Store, config: &Config, cmd: AuditCmd) -> tally_core::Result<()> {
    let (ledger, journal) = store.load()?;
    let auditor = Auditor::new(audit_key(config)?);
    let report = auditor.audit(&ledger, &journal);

    match cmd {
        AuditCmd::Verify => {
            println!("transactions:          {}", report.total_transactions);
            println!("integrity_valid:       {}", report.integrity_valid);
            println!("double_entry_valid:    {}", report.double_entry_valid);
            println!("hmac_valid:            {}", report.hmac_valid);
            println!("balance_discrepancies: {}", report.balance_discrepancies.len());
            println!("duplicate_ids:         {}", report.duplicate_ids.len());
            println!("orphan_ids:            {}", report.orphan_ids.len());
        }
        AuditCmd::Report => {
            let json = serde_json::to_string_pretty(&report).map_err(Error::from)?;
            println!("{}", json);
        }
    }

    report.ensure_valid()
}

fn run_journal(store: &Store, cmd: JournalCmd) -> tally_core::Result<()> {
    let (_, journal) = store.load()?;
    match cmd {
        JournalCmd::List => {
            for entry in journal.entries() {
                let tx = &entry.transaction;
                println!(
                    "{:>6}  {}  {} -> {}  {} {}  {}",
                    entry.sequence,
                    tx.id,
                    tx.from_account,
                    tx.to_account,
                    tx.amount,
                    tx.currency,
                    &entry.hash[..16],
                );
            }
            Ok(())
        }
        JournalCmd::Export { file } => {
            journal.save_plain(&file)?;
            println!("exported {} entries to {}", journal.len(), file.display());
            Ok(())
        }
    }
}

fn run_keygen(out: Option<PathBuf>) -> tally_core::Result<()> {
    let keypair = KeyPair::generate();
    let seed_hex = hex::encode(keypair.secret_seed());
    let public_hex = hex::encode(keypair.public_key());

    match out {
        Some(path) => {
            std::fs::write(&path, &seed_hex)?;
            let pub_path = path.with_extension("pub");
            std::fs::write(&pub_path, &public_hex)?;
            println!("secret key: {}", path.display());
            println!("public key: {}", pub_path.display());
        }
        None => {
            println!("secret: {}", seed_hex);
            println!("public: {}", public_hex);
        }
    }
    Ok(())
}

fn run_sign(input: &PathBuf, key: &PathBuf, out: Option<PathBuf>) -> tally_core::Result<()> {
    let message = std::fs::read(input)?;
    let seed_hex = std::fs::read_to_string(key)?;
    let keypair = KeyPair::from_hex(&seed_hex)?;

    let signature = hex::encode(keypair.sign(&message));
    match out {
        Some(path) => {
            std::fs::write(&path, &signature)?;
            println!("signature: {}", path.display());
        }
        None => println!("{}", signature),
    }
    Ok(())
}

fn run_verify(input: &PathBuf, sig: &PathBuf, key: &PathBuf) -> tally_core::Result<()> {
    let message = std::fs::read(input)?;

    let sig_bytes = hex::decode(std::fs::read_to_string(sig)?.trim())
        .map_err(|e| Error::InvalidKeyFormat(format!("bad signature hex: {}", e)))?;
    let signature: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| Error::InvalidKeyFormat("signature must be 64 bytes".to_string()))?;

    let key_bytes = hex::decode(std::fs::read_to_string(key)?.trim())
        .map_err(|e| Error::InvalidKeyFormat(format!("bad public key hex: {}", e)))?;
    let public_key: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| Error::InvalidKeyFormat("public key must be 32 bytes".to_string()))?;

    if crypto::verify_signature(&message, &signature, &public_key) {
        println!("signature OK");
        Ok(())
    } else {
        Err(Error::SignatureInvalid(input.display().to_string()))
    }
}

fn audit_key(config: &Config) -> tally_core::Result<SecretBytes> {
    match &config.audit_key_hex {
        Some(hex_key) => {
            let bytes = hex::decode(hex_key.trim())
                .map_err(|e| Error::InvalidKeyFormat(format!("TALLY_AUDIT_KEY: {}", e)))?;
            Ok(SecretBytes::new(bytes))
        }
        None => Ok(SecretBytes::new(b"tally-default-audit-key".to_vec())),
    }
}
