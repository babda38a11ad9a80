use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eip712_signer::eip712::{
    address_from_private_key, get_pre_image, recover_typed_data_address, sign_hash,
    verify_typed_data, Address, Eip712Signature, TypedData,
};
use serde_json::json;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

/// Hash, sign and verify EIP-712 typed structured data.
///
/// Typed data is read as `eth_signTypedData_v4` JSON from FILE, or from
/// stdin when FILE is omitted.
#[derive(Parser, Debug)]
#[command(name = "eip712-signer", author, version, about)]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging on stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the domain separator, struct hash and signing digest
    Hash {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Sign the typed data digest
    Sign {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Hex-encoded 32-byte secp256k1 private key
        #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
    },

    /// Recover the address that produced a signature
    Recover {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// 65-byte signature (r || s || v) as hex
        #[arg(long)]
        signature: Eip712Signature,
    },

    /// Check a signature against an expected signer (exit code 1 when invalid)
    Verify {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// 65-byte signature (r || s || v) as hex
        #[arg(long)]
        signature: Eip712Signature,

        /// Expected signer address
        #[arg(long)]
        address: Address,
    },
}

fn main() -> Result<ExitCode> {
    // Variables already set in the environment win over .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Hash { file } => {
            let typed_data = load_typed_data(file.as_deref())?;
            let pre_image = get_pre_image(&typed_data).context("failed to hash typed data")?;
            let struct_hash = pre_image.struct_hash.map(hex_prefixed);

            if cli.json {
                let output = json!({
                    "primaryType": typed_data.primary_type,
                    "domainSeparator": hex_prefixed(pre_image.domain_separator),
                    "structHash": struct_hash,
                    "digest": hex_prefixed(pre_image.final_hash),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Primary type:     {}", typed_data.primary_type);
                println!("Domain separator: {}", hex_prefixed(pre_image.domain_separator));
                println!(
                    "Struct hash:      {}",
                    struct_hash.as_deref().unwrap_or("(none, domain only)")
                );
                println!("Digest:           {}", hex_prefixed(pre_image.final_hash));
            }
        }

        Command::Sign { file, private_key } => {
            let private_key = Zeroizing::new(private_key);
            let key_bytes = decode_private_key(&private_key)?;

            let typed_data = load_typed_data(file.as_deref())?;
            let pre_image = get_pre_image(&typed_data).context("failed to hash typed data")?;
            let signature =
                sign_hash(&pre_image.final_hash, &key_bytes).context("failed to sign digest")?;
            let signer = address_from_private_key(&key_bytes)?;

            if cli.json {
                let output = json!({
                    "digest": hex_prefixed(pre_image.final_hash),
                    "signature": signature.to_hex(),
                    "r": hex_prefixed(signature.r),
                    "s": hex_prefixed(signature.s),
                    "v": signature.v,
                    "signer": signer,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Digest:    {}", hex_prefixed(pre_image.final_hash));
                println!("Signature: {}", signature.to_hex());
                println!("  r: {}", hex_prefixed(signature.r));
                println!("  s: {}", hex_prefixed(signature.s));
                println!("  v: {}", signature.v);
                println!("Signer:    {}", signer);
            }
        }

        Command::Recover { file, signature } => {
            let typed_data = load_typed_data(file.as_deref())?;
            let recovered = recover_typed_data_address(&typed_data, &signature)
                .context("failed to recover signer")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&json!({ "address": recovered }))?);
            } else {
                println!("{}", recovered);
            }
        }

        Command::Verify {
            file,
            signature,
            address,
        } => {
            let typed_data = load_typed_data(file.as_deref())?;
            let valid = verify_typed_data(&typed_data, &signature, &address)
                .context("failed to verify signature")?;

            if cli.json {
                let output = json!({ "valid": valid, "address": address });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", if valid { "valid" } else { "invalid" });
            }

            if !valid {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Logs go to stderr so stdout stays parseable
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("eip712_signer=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_typed_data(path: Option<&Path>) -> Result<TypedData> {
    let payload = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read typed data from stdin")?;
            buffer
        }
    };

    let typed_data = TypedData::from_json(&payload).context("failed to parse typed data")?;
    tracing::debug!(
        primary_type = %typed_data.primary_type,
        types = typed_data.types.len(),
        "Loaded typed data"
    );
    Ok(typed_data)
}

fn decode_private_key(private_key: &str) -> Result<Zeroizing<Vec<u8>>> {
    let trimmed = private_key.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    // Error text from hex would echo key material
    let bytes = hex::decode(hex_part)
        .map_err(|_| anyhow::anyhow!("private key is not valid hex"))?;
    Ok(Zeroizing::new(bytes))
}

fn hex_prefixed(bytes: [u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}
