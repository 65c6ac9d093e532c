use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use base64ct::{Base64, Encoding};
use clap::{Parser, Subcommand};
use fatoora_seal::config::{Config, QrPhase};
use fatoora_seal::crypto::{CertificateInfo, PrivateKey};
use fatoora_seal::invoice::chain::hash_document;
use fatoora_seal::invoice::{ChainLink, InvoiceDocument, InvoiceSigner, QrField, QrPayload};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fatoora-seal")]
#[command(about = "Hash, sign and verify ZATCA e-invoices")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the invoice hash of an unsigned or signed invoice.
    Hash {
        #[arg(long)]
        invoice: PathBuf,
    },
    /// Chain, hash, sign and embed the QR code.
    Sign {
        #[arg(long)]
        invoice: PathBuf,
        #[arg(long)]
        cert: PathBuf,
        #[arg(long)]
        key: PathBuf,
        /// Hash of the previous invoice of this signing unit.
        #[arg(long, conflicts_with = "first", required_unless_present = "first")]
        pih: Option<String>,
        /// First invoice of the signing unit; chains to the genesis hash.
        #[arg(long)]
        first: bool,
        #[arg(long, default_value = "enhanced")]
        phase: QrPhase,
        /// Write the signed XML here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Decode a base64 QR payload.
    Qr {
        #[arg(long)]
        payload: String,
    },
    /// Verify a signed invoice against its claimed hash.
    Verify {
        #[arg(long)]
        invoice: PathBuf,
        #[arg(long)]
        hash: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Hash { invoice } => {
            let document = InvoiceDocument::parse(&read_text(&invoice)?)?;
            println!("{}", hash_document(&document)?);
        }
        Commands::Sign {
            invoice,
            cert,
            key,
            pih,
            first,
            phase,
            output,
        } => {
            let certificate = CertificateInfo::parse(&read_bytes(&cert)?)?;
            let key = PrivateKey::parse(&read_bytes(&key)?)?;
            let link = ChainLink::resolve(pih.as_deref(), first)?;
            let signer = InvoiceSigner::new(certificate).with_config(Config::new(phase));
            info!(invoice = %invoice.display(), genesis = link.predecessor().is_genesis(), "signing invoice");
            let signed = signer.sign_xml(&read_text(&invoice)?, &link, &key)?;
            match output {
                Some(path) => {
                    fs::write(&path, signed.xml())
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("invoice_hash: {}", signed.invoice_hash());
                    println!("qr_code: {}", signed.qr_code());
                }
                None => println!("{}", signed.xml()),
            }
        }
        Commands::Qr { payload } => {
            let payload = QrPayload::decode(payload.trim())?;
            for (field, value) in payload.entries() {
                println!("{} {}: {}", field.tag(), field.label(), display_value(field, value));
            }
        }
        Commands::Verify { invoice, hash } => {
            info!(invoice = %invoice.display(), "verifying invoice");
            let valid = fatoora_seal::invoice::verify_signed_invoice(&read_text(&invoice)?, &hash)?;
            if !valid {
                println!("invalid");
                return Ok(ExitCode::FAILURE);
            }
            println!("valid");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn display_value(field: QrField, value: &[u8]) -> String {
    match (field, std::str::from_utf8(value)) {
        (QrField::PublicKey | QrField::CertificateSignature, _) | (_, Err(_)) => {
            Base64::encode_string(value)
        }
        (_, Ok(text)) => text.to_string(),
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}
