//! gatepass command line: scan, verify and payment QR tools.
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gatepass::{
    Amount, CredentialValidator, DecodeEngine, FileInput, GateConfig, GateError, GateResult,
    GateSession, HttpAuthority, SubmitOutcome, acquire, payment_qr,
};

#[derive(Parser)]
#[command(name = "gatepass", version, about = "Visitor gate verification tools")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "GATEPASS_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging for gatepass
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode the QR code in an image
    Scan {
        #[arg(long)]
        image: PathBuf,
        /// List every symbol found with its version, EC level and mask
        #[arg(long)]
        all: bool,
    },
    /// Verify a visitor from an image or a typed code
    #[command(group(ArgGroup::new("source").required(true).args(["image", "token"])))]
    Verify {
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long)]
        token: Option<String>,
    },
    /// Render the monthly payment QR
    PayQr {
        /// Payable amount, e.g. 500 or 500.50
        #[arg(long)]
        amount: String,
        #[arg(long)]
        month: u8,
        #[arg(long)]
        year: u16,
        /// Write a PNG here instead of printing to the terminal
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error [{}]: {}", e.kind(), e);
        eprintln!("Hint: {}", e.suggestion());
        std::process::exit(e.exit_code());
    }
}

fn init_logging(verbose: bool) {
    if !verbose && std::env::var("RUST_LOG").is_err() {
        return;
    }
    let mut filter = EnvFilter::from_default_env();
    if verbose {
        if let Ok(directive) = "gatepass=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> GateResult<()> {
    let config = GateConfig::load_with_env(cli.config.as_deref())?;

    match cli.command {
        Command::Scan { image, all } => scan_cmd(&config, image, all),
        Command::Verify { image, token } => verify_cmd(&config, image, token).await,
        Command::PayQr {
            amount,
            month,
            year,
            out,
        } => pay_qr_cmd(&config, &amount, month, year, out),
    }
}

fn scan_cmd(config: &GateConfig, image: PathBuf, all: bool) -> GateResult<()> {
    let input = FileInput::from_path(&image)?;
    let decoded = acquire(&input)?;

    if all {
        let codes = gatepass::detect(&decoded.pixels, decoded.width as usize, decoded.height as usize);
        println!("Image: {} ({}x{})", image.display(), decoded.width, decoded.height);
        println!("Found {} QR codes", codes.len());
        for (i, qr) in codes.iter().enumerate() {
            println!(
                "  QR {}: version={}, error_correction={:?}, mask={}, content={}",
                i,
                qr.version.number(),
                qr.error_correction,
                qr.mask_pattern.bits(),
                qr.content
            );
        }
        return if codes.is_empty() { Err(GateError::NoCodeFound) } else { Ok(()) };
    }

    let engine = DecodeEngine::standard(None, &config.decode);
    let code = engine.decode(&decoded)?;
    println!("{}", code.text);
    Ok(())
}

async fn verify_cmd(
    config: &GateConfig,
    image: Option<PathBuf>,
    token: Option<String>,
) -> GateResult<()> {
    let engine = Arc::new(DecodeEngine::standard(None, &config.decode));
    let authority = Arc::new(HttpAuthority::new(&config.authority)?);
    let session = GateSession::new(engine, CredentialValidator::new(authority));

    let outcome = match (image, token) {
        (Some(path), _) => session.submit_file(FileInput::from_path(path)?).await,
        (None, Some(token)) => session.submit_manual(&token).await,
        (None, None) => return Err(GateError::Input("No file received".to_string())),
    };

    match outcome {
        SubmitOutcome::Approved(result) => {
            if let Some(message) = session.snapshot().message {
                println!("{}", message);
            }
            println!("Visitor:     {}", result.visitor_name);
            println!("Phone:       {}", result.visitor_phone);
            println!("Entry time:  {}", result.entry_time.to_rfc3339());
            println!("Verified by: {}", result.verified_by);
            Ok(())
        }
        SubmitOutcome::Failed(e) => Err(e),
        SubmitOutcome::Ignored => Ok(()),
    }
}

fn pay_qr_cmd(
    config: &GateConfig,
    amount: &str,
    month: u8,
    year: u16,
    out: Option<PathBuf>,
) -> GateResult<()> {
    let amount: Amount = amount.parse()?;
    let Some(qr) = payment_qr(&config.payment, Some(amount), month, year)? else {
        return Err(GateError::Input("No payable amount assigned".to_string()));
    };

    println!("{}", qr.uri);
    match out {
        Some(path) => {
            let png = qr.to_png(&config.payment)?;
            std::fs::write(&path, png).map_err(|e| {
                GateError::Environment(format!("Could not write {}: {}", path.display(), e))
            })?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", qr.symbol.to_text()),
    }
    println!("Amount: {}", qr.intent.amount_label());
    Ok(())
}
