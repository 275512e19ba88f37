use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use vgraph::{EncodeOptions, Encoder};
use vgraph_contracts::{ENCODE_REPORT_SCHEMA_VERSION, VERIFY_REPORT_SCHEMA_VERSION};
use vgraph_seal::{DigestAlg, PrivateKey, PublicKey};

#[derive(Parser)]
#[command(name = "vgraph")]
#[command(about = "Encode value graphs into deterministic record streams.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a graph document.
    Encode(EncodeArgs),
    /// Print the hex digest of a file.
    Digest(DigestArgs),
    /// Check an Ed25519 signature over a file.
    Verify(VerifyArgs),
}

#[derive(Args)]
struct EncodeArgs {
    #[arg(long, value_name = "PATH")]
    graph: PathBuf,

    /// Write encoded bytes here instead of stdout.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Encode options JSON.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long)]
    no_strip: bool,

    #[arg(long)]
    max_output_bytes: Option<usize>,

    #[arg(long, value_name = "ALG", requires = "hmac_key_env")]
    hmac: Option<String>,

    /// Environment variable holding the HMAC key.
    #[arg(long, value_name = "NAME", requires = "hmac")]
    hmac_key_env: Option<String>,

    /// Ed25519 private key file (PKCS#8 PEM or base64).
    #[arg(long, value_name = "PATH")]
    sign_key: Option<PathBuf>,

    /// Write the JSON report here. Defaults to stdout when --out is set.
    #[arg(long, value_name = "PATH")]
    report_out: Option<PathBuf>,
}

#[derive(Args)]
struct DigestArgs {
    #[arg(long, default_value = "sha256")]
    alg: String,

    path: PathBuf,
}

#[derive(Args)]
struct VerifyArgs {
    #[arg(long, value_name = "B64")]
    public_key: String,

    #[arg(long, value_name = "B64")]
    signature_b64: String,

    path: PathBuf,
}

fn main() -> ExitCode {
    init_tracing();
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("VGRAPH_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn try_main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match &cli.command {
        Command::Encode(args) => cmd_encode(args),
        Command::Digest(args) => cmd_digest(args),
        Command::Verify(args) => cmd_verify(args),
    }
}

struct Sealing {
    hmac: Option<(DigestAlg, Vec<u8>)>,
    signer: Option<PrivateKey>,
}

impl Sealing {
    fn from_args(args: &EncodeArgs) -> Result<Self> {
        let hmac = match (&args.hmac, &args.hmac_key_env) {
            (Some(alg), Some(var)) => {
                let alg = DigestAlg::from_name(alg).context("--hmac")?;
                let key = std::env::var(var)
                    .with_context(|| format!("read HMAC key from env var {var:?}"))?;
                if key.is_empty() {
                    anyhow::bail!("HMAC key env var {var:?} is empty");
                }
                Some((alg, key.into_bytes()))
            }
            _ => None,
        };
        let signer = match &args.sign_key {
            Some(path) => Some(PrivateKey::load(path).context("--sign-key")?),
            None => None,
        };
        Ok(Self { hmac, signer })
    }
}

fn load_options(args: &EncodeArgs) -> Result<EncodeOptions> {
    let mut opts = match &args.config {
        Some(path) => EncodeOptions::from_json_file(path)?,
        None => EncodeOptions::default(),
    };
    if args.no_strip {
        opts.strip = false;
    }
    if args.max_output_bytes.is_some() {
        opts.max_output_bytes = args.max_output_bytes;
    }
    Ok(opts)
}

fn cmd_encode(args: &EncodeArgs) -> Result<ExitCode> {
    // The MAC and signature only travel in the report.
    if (args.hmac.is_some() || args.sign_key.is_some())
        && args.out.is_none()
        && args.report_out.is_none()
    {
        anyhow::bail!("--hmac and --sign-key need --out or --report-out to carry the report");
    }
    let opts = load_options(args)?;
    let sealing = Sealing::from_args(args)?;

    let graph_bytes = std::fs::read(&args.graph)
        .with_context(|| format!("read graph: {}", args.graph.display()))?;
    let (heap, root) = vgraph::load_graph(&graph_bytes)
        .with_context(|| format!("load graph: {}", args.graph.display()))?;

    let encoded = match Encoder::new(&heap, &opts).and_then(|enc| enc.encode(&root)) {
        Ok(encoded) => encoded,
        Err(err) => {
            let report = serde_json::json!({
                "schema_version": ENCODE_REPORT_SCHEMA_VERSION,
                "ok": false,
                "error": {
                    "kind": err.kind(),
                    "message": err.to_string(),
                },
            });
            emit_report(args, &report)?;
            eprintln!("encode failed: {err}");
            return Ok(ExitCode::from(2));
        }
    };
    let bytes = &encoded.bytes;

    let mut report = serde_json::json!({
        "schema_version": ENCODE_REPORT_SCHEMA_VERSION,
        "ok": true,
        "bytes_len": bytes.len(),
        "sha256": vgraph_seal::sha256_hex(bytes),
        "stats": encoded.stats,
    });
    if let Some((alg, key)) = &sealing.hmac {
        let mac = alg.hmac(key, bytes)?;
        report["hmac_alg"] = alg.as_str().into();
        report["hmac_b64"] = vgraph_seal::base64_encode(&mac).into();
    }
    if let Some(signer) = &sealing.signer {
        report["signature_b64"] = vgraph_seal::base64_encode(&signer.sign(bytes)).into();
        report["public_key_b64"] = signer.public_key().to_base64().into();
    }

    match &args.out {
        Some(path) => write_file(path, bytes)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).context("write stdout")?;
            stdout.flush().context("flush stdout")?;
        }
    }
    tracing::info!(bytes = bytes.len(), graph = %args.graph.display(), "encoded");
    emit_report(args, &report)?;
    Ok(ExitCode::SUCCESS)
}

fn emit_report(args: &EncodeArgs, report: &serde_json::Value) -> Result<()> {
    let mut text = serde_json::to_string_pretty(report)?;
    text.push('\n');
    match (&args.report_out, &args.out) {
        (Some(path), _) => write_file(path, text.as_bytes()),
        (None, Some(_)) => {
            print!("{text}");
            Ok(())
        }
        (None, None) => Ok(()),
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
    }
    std::fs::write(path, bytes).with_context(|| format!("write: {}", path.display()))
}

fn cmd_digest(args: &DigestArgs) -> Result<ExitCode> {
    let alg = DigestAlg::from_name(&args.alg)?;
    let bytes =
        std::fs::read(&args.path).with_context(|| format!("read {}", args.path.display()))?;
    println!("{}", alg.hex_digest(&bytes));
    Ok(ExitCode::SUCCESS)
}

fn cmd_verify(args: &VerifyArgs) -> Result<ExitCode> {
    let key = PublicKey::from_base64(&args.public_key).context("--public-key")?;
    let signature = vgraph_seal::base64_decode(&args.signature_b64).context("--signature-b64")?;
    let bytes =
        std::fs::read(&args.path).with_context(|| format!("read {}", args.path.display()))?;

    let valid = key.verify(&signature, &bytes);
    let report = serde_json::json!({
        "schema_version": VERIFY_REPORT_SCHEMA_VERSION,
        "ok": true,
        "valid": valid,
        "sha256": vgraph_seal::sha256_hex(&bytes),
        "public_key_b64": key.to_base64(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
