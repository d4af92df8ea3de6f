//! Cryptoslot command line tool.
//!
//! # Usage
//!
//! ```bash
//! # Digest a message (prints the hex digest)
//! cryptoslot "hello world"
//!
//! # Annotated echo round trip through the device
//! cryptoslot --mode digest-echo "hello world"
//!
//! # Encrypt the first message block under a fresh key
//! cryptoslot --mode cipher-encrypt "secret"
//! ```
//!
//! With no message argument the tool prompts for one on stdin.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use cryptoslot_core::{CAPACITY, DeviceError, TransformMode, software_device};
use cryptoslot_crypto::CipherConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Transform applied by the device slot.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Echo the message back with a " (N letters)" annotation
    DigestEcho,
    /// Replace the message with its raw MD5 digest octets
    DigestBytes,
    /// Encrypt the first message block with AES-256-CBC under a fresh key
    CipherEncrypt,
}

impl From<ModeArg> for TransformMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::DigestEcho => Self::DigestEcho,
            ModeArg::DigestBytes => Self::DigestBytes,
            ModeArg::CipherEncrypt => Self::CipherEncrypt,
        }
    }
}

/// Single-slot cryptographic transform tool
#[derive(Parser, Debug)]
#[command(name = "cryptoslot")]
#[command(about = "Digest and encrypt messages through a single-slot transform device")]
#[command(version)]
struct Args {
    /// Message to transform; prompts on stdin when omitted
    message: Option<String>,

    /// Transform mode
    #[arg(short, long, value_enum, default_value_t = ModeArg::DigestBytes)]
    mode: ModeArg,

    /// Cipher completion timeout in seconds; 0 waits indefinitely
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Diagnostics go to stderr; stdout carries only the result line.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    if let Err(error) = run(&args) {
        if error.is_transient() {
            tracing::warn!("transient failure, the same request may succeed on retry");
        }
        return Err(error.into());
    }
    Ok(())
}

fn run(args: &Args) -> Result<(), DeviceError> {
    let message = match &args.message {
        Some(message) => message.clone(),
        None => prompt_for_message()?,
    };

    let config = CipherConfig {
        completion_timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        ..CipherConfig::default()
    };

    let device = software_device(args.mode.into(), config);
    let handle = device.open();

    let accepted = handle.write(message.as_bytes())?;
    if accepted < message.len() {
        tracing::warn!(accepted, len = message.len(), "message truncated to the slot cap");
    }

    let mut result = [0u8; CAPACITY];
    let drained = handle.read(&mut result)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.mode {
        ModeArg::DigestEcho => {
            writeln!(out, "{}", String::from_utf8_lossy(&result[..drained]))?;
        },
        ModeArg::DigestBytes => {
            writeln!(
                out,
                "Original: '{message}', MD5 digest: '{}'",
                hex::encode(&result[..drained])
            )?;
        },
        ModeArg::CipherEncrypt => {
            writeln!(
                out,
                "Original: '{message}', AES-256-CBC block: '{}'",
                hex::encode(&result[..drained])
            )?;
        },
    }

    Ok(())
}

fn prompt_for_message() -> io::Result<String> {
    {
        let mut stdout = io::stdout().lock();
        write!(stdout, "Insert a string: ")?;
        stdout.flush()?;
    }

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}
