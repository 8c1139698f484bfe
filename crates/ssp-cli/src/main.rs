//! ssp: Secure Suite command-line interface
//!
//! A thin shell over the engine facade:
//!   encrypt <file>          - encrypt a file to a .ssp envelope
//!   decrypt <file>          - decrypt a .ssp envelope
//!   hash <file>             - digest a file (sha256/sha512/md5)
//!   genpass                 - generate a policy-constrained password
//!   recovery new            - issue a 24-word recovery phrase
//!   export-secret           - render a secret as a QR code
//!   import-secret <payload> - decode a scanned QR payload
//!   config show             - display the effective configuration

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;

use ssp_core::progress::{Phase, ProgressFn};
use ssp_core::SuiteConfig;
use ssp_crypto::hash::HashAlgorithm;
use ssp_crypto::password::PasswordPolicy;
use ssp_engine::{spawn, CryptoEngine, TaskHandle};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "ssp",
    version,
    about = "Secure Suite crypto engine",
    long_about = "ssp: encrypt, decrypt, hash, and generate secrets with the Secure Suite engine"
)]
struct Cli {
    /// Path to ssp.toml configuration file
    #[arg(long, short = 'c', env = "SSP_CONFIG", default_value = "ssp.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file into a self-describing envelope
    Encrypt {
        /// Input file
        input: PathBuf,
        /// Output path (default: input + ".ssp")
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Decrypt an envelope back to plaintext
    Decrypt {
        /// Encrypted .ssp file
        input: PathBuf,
        /// Output path (default: the name recorded in the envelope,
        /// or input without ".ssp")
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Compute a file digest
    Hash {
        /// File to digest
        input: PathBuf,
        /// Algorithm: sha256, sha512, or md5 (legacy)
        #[arg(long, short = 'a', default_value = "sha256")]
        algorithm: String,
    },

    /// Generate a random password
    Genpass {
        #[arg(long, short = 'l', default_value_t = 16)]
        length: usize,
        /// Minimum uppercase letters
        #[arg(long, default_value_t = 1)]
        min_upper: usize,
        /// Minimum digits
        #[arg(long, default_value_t = 1)]
        min_digit: usize,
        /// Minimum symbols
        #[arg(long, default_value_t = 1)]
        min_symbol: usize,
        /// Characters to exclude (e.g. "l1O0")
        #[arg(long, default_value = "")]
        exclude: String,
        /// How many passwords to print
        #[arg(long, short = 'n', default_value_t = 1)]
        count: u32,
    },

    /// Recovery phrase management
    Recovery {
        #[command(subcommand)]
        action: RecoveryAction,
    },

    /// Render a secret as a scannable QR code on the terminal
    #[command(name = "export-secret")]
    ExportSecret {
        /// The secret text; prompted for if omitted
        secret: Option<String>,
    },

    /// Decode a scanned QR payload back to the secret
    #[command(name = "import-secret")]
    ImportSecret {
        /// The payload text a scanner produced (SSP1:...)
        payload: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum RecoveryAction {
    /// Issue a new 24-word recovery phrase (display once, never stored)
    New,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

// ── Entry point ────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    };
    init_logging(&config.logging.level, &config.logging.format);

    if let Err(e) = run(cli.command, config) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands, config: SuiteConfig) -> Result<()> {
    let engine = CryptoEngine::new(config, Arc::new(ssp_crypto::OsEntropy));

    match command {
        Commands::Encrypt { input, output } => {
            let output = output.unwrap_or_else(|| {
                let mut p = input.clone().into_os_string();
                p.push(".ssp");
                PathBuf::from(p)
            });
            let passphrase = prompt_passphrase_twice()?;

            // The derivation and the file stream run on a worker
            // thread; this thread only feeds the bar from the event
            // channel.
            let bar = progress_bar("encrypting");
            let task = spawn(move |progress, cancel| {
                engine.encrypt_file(&input, &output, &passphrase, progress, cancel)
            });
            let report = drain_task(&bar, task)?;
            bar.finish_and_clear();

            println!(
                "encrypted {} -> {} ({} bytes, {} chunks)",
                report.src.display(),
                report.dst.display(),
                report.plaintext_bytes,
                report.chunks
            );
        }

        Commands::Decrypt { input, output } => {
            let passphrase = prompt_passphrase()?;
            let output = match output {
                Some(p) => p,
                None => default_decrypt_path(&input),
            };

            let bar = progress_bar("decrypting");
            let task = spawn(move |progress, cancel| {
                engine.decrypt_file(&input, &output, &passphrase, progress, cancel)
            });
            let report = drain_task(&bar, task)?;
            bar.finish_and_clear();

            println!(
                "decrypted {} -> {} ({} bytes)",
                report.src.display(),
                report.dst.display(),
                report.plaintext_bytes
            );
        }

        Commands::Hash { input, algorithm } => {
            let algorithm: HashAlgorithm = algorithm.parse()?;
            let bar = progress_bar("hashing");
            let progress = bar_progress(&bar);
            let result = engine.hash_file(algorithm, &input, Some(&progress), None)?;
            bar.finish_and_clear();

            println!("{}  {}", result.to_hex(), input.display());
            if result.insecure {
                eprintln!("warning: {algorithm} is cryptographically broken; use it only to match legacy inventories");
            }
        }

        Commands::Genpass {
            length,
            min_upper,
            min_digit,
            min_symbol,
            exclude,
            count,
        } => {
            let policy = PasswordPolicy {
                length,
                min_lower: 0,
                min_upper,
                min_digit,
                min_symbol,
                exclude,
                ..Default::default()
            };
            let mut entropy_bits = 0.0;
            for _ in 0..count {
                let secret = engine.generate_password(&policy)?;
                entropy_bits = secret.entropy_bits;
                println!("{}", &*secret.value);
            }
            eprintln!("~{entropy_bits:.0} bits of entropy per password");
        }

        Commands::Recovery { action } => match action {
            RecoveryAction::New => {
                let (phrase, _key) = engine.generate_recovery_phrase()?;
                println!("Write these 24 words down and store them offline.");
                println!("They are displayed once and never saved:\n");
                for (i, word) in phrase.split_whitespace().enumerate() {
                    println!("  {:>2}. {word}", i + 1);
                }
            }
        },

        Commands::ExportSecret { secret } => {
            let secret = match secret {
                Some(s) => s,
                None => rpassword::prompt_password("Secret to export: ")
                    .context("reading secret")?,
            };
            let code = engine.export_secret(secret.as_bytes())?;
            println!("{}", code.to_unicode());
            println!("payload: {}", code.payload());
        }

        Commands::ImportSecret { payload } => {
            let secret = engine.import_secret(&payload)?;
            let text = String::from_utf8_lossy(&secret);
            println!("{text}");
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let rendered =
                    toml::to_string_pretty(engine.config()).context("rendering config")?;
                print!("{rendered}");
            }
        },
    }

    Ok(())
}

// ── Helpers ────────────────────────────────────────────────────────────────────

fn load_config(path: &PathBuf) -> Result<SuiteConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("parsing config: {}", path.display()))
    } else {
        tracing::debug!("config file not found: {} (using defaults)", path.display());
        Ok(SuiteConfig::default())
    }
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

fn prompt_passphrase() -> Result<SecretString> {
    let pw = rpassword::prompt_password("Passphrase: ").context("reading passphrase")?;
    Ok(SecretString::from(pw))
}

fn prompt_passphrase_twice() -> Result<SecretString> {
    let first = rpassword::prompt_password("Passphrase: ").context("reading passphrase")?;
    let second =
        rpassword::prompt_password("Confirm passphrase: ").context("reading passphrase")?;
    anyhow::ensure!(first == second, "passphrases do not match");
    Ok(SecretString::from(first))
}

fn default_decrypt_path(input: &std::path::Path) -> PathBuf {
    match input.extension() {
        Some(ext) if ext == "ssp" => input.with_extension(""),
        _ => {
            let mut p = input.to_path_buf().into_os_string();
            p.push(".out");
            PathBuf::from(p)
        }
    }
}

fn progress_bar(label: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes}")
            .expect("static template")
            .progress_chars("=> "),
    );
    bar.set_message(label);
    bar
}

/// Feed the bar from a worker's event channel, then join for the
/// operation's result.
fn drain_task<T>(bar: &ProgressBar, task: TaskHandle<T>) -> ssp_core::SspResult<T> {
    while let Some(event) = task.recv_event() {
        if let Some(total) = event.bytes_total {
            bar.set_length(total);
        }
        bar.set_position(event.bytes_done);
        if event.phase == Phase::Done {
            bar.finish();
        }
    }
    task.join()
}

fn bar_progress(bar: &ProgressBar) -> ProgressFn {
    let bar = bar.clone();
    Box::new(move |event| {
        if let Some(total) = event.bytes_total {
            bar.set_length(total);
        }
        bar.set_position(event.bytes_done);
        if event.phase == Phase::Done {
            bar.finish();
        }
    })
}
