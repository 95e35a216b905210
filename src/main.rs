//! # Email Verifier CLI
//!
//! Command-line interface for the `email_verifier_core` library. Reads
//! addresses from arguments, a file or stdin, verifies them and writes the
//! lookups as JSON or XML.

use email_verifier_core::{initialize_verifier, output, ConfigBuilder, Lookup};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Xml,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Checks whether email addresses can receive mail.",
    long_about = "Email Verifier probes the mail exchanges of each address's domain over SMTP, without sending a message, and reports deliverability, catch-all, disposable and avatar signals."
)]
struct AppArgs {
    /// Addresses to verify.
    addresses: Vec<String>,

    /// File with one address per line; blank lines and '#' comments are skipped.
    #[arg(short, long, env = "EMAIL_VERIFIER_INPUT")]
    input: Option<String>,

    /// Read addresses from standard input, one per line.
    #[arg(long, default_value = "false")]
    stdin: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json, env = "EMAIL_VERIFIER_FORMAT")]
    format: OutputFormat,

    /// Write results to this file instead of standard output.
    #[arg(short, long, env = "EMAIL_VERIFIER_OUTPUT")]
    output: Option<String>,

    /// Path to a configuration file (TOML format). CLI args override file settings.
    #[arg(long, env = "EMAIL_VERIFIER_CONFIG")]
    config_file: Option<String>,

    /// Maximum number of domains verified concurrently.
    #[arg(short = 'w', long, env = "EMAIL_VERIFIER_WORKERS")]
    workers: Option<usize>,

    /// Name announced in the SMTP greeting.
    #[arg(long, env = "EMAIL_VERIFIER_HOSTNAME")]
    hostname: Option<String>,

    /// Envelope sender used for probes.
    #[arg(long, env = "EMAIL_VERIFIER_SOURCE_ADDRESS")]
    source_address: Option<String>,

    /// SMTP connection/command timeout in seconds.
    #[arg(long, env = "EMAIL_VERIFIER_SMTP_TIMEOUT")]
    smtp_timeout: Option<u64>,

    /// HTTP request timeout in seconds.
    #[arg(long, env = "EMAIL_VERIFIER_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// DNS resolution timeout in seconds.
    #[arg(long, env = "EMAIL_VERIFIER_DNS_TIMEOUT")]
    dns_timeout: Option<u64>,

    /// Comma-separated list of DNS servers to use for lookups.
    #[arg(long, value_delimiter = ',', env = "EMAIL_VERIFIER_DNS_SERVERS")]
    dns_servers: Option<Vec<String>>,

    /// URL of a disposable domain list to merge into the built-in one.
    #[arg(long, env = "EMAIL_VERIFIER_DISPOSABLE_LIST_URL")]
    disposable_list_url: Option<String>,

    /// Skip the Gravatar lookup.
    #[arg(long, action = clap::ArgAction::SetTrue, env = "EMAIL_VERIFIER_NO_AVATAR")]
    no_avatar: bool,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppArgs::parse();
    init_tracing(args.verbose)?;

    tracing::info!(
        "Email Verifier CLI v{} starting...",
        env!("CARGO_PKG_VERSION")
    );
    tracing::debug!("Parsed CLI arguments: {:?}", args);

    let config = build_config(&args)?;
    tracing::debug!("Effective configuration loaded: {:?}", config);

    let inputs = collect_inputs(&args)?;
    if inputs.is_empty() {
        tracing::warn!("No addresses given. Pass addresses, --input or --stdin.");
    }

    let verifier = initialize_verifier(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize verifier: {}", e))?;

    let start_time = Instant::now();
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Failed to set progress spinner template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Verifying {} addresses...", inputs.len()));

    let (mut lookups, rejected) = verifier.verify_strings(&inputs).await;

    spinner.finish_and_clear();

    for (input, err) in &rejected {
        tracing::warn!("Skipped '{}': {}", input, err);
    }

    lookups.sort_by(|a, b| (&a.domain, &a.address).cmp(&(&b.domain, &b.address)));
    write_results(&lookups, args.format, args.output.as_deref())?;
    log_summary(&lookups, rejected.len(), start_time.elapsed());

    Ok(())
}

fn init_tracing(verbose: u8) -> Result<()> {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting up tracing subscriber failed")
}

fn build_config(args: &AppArgs) -> Result<email_verifier_core::Config> {
    let mut config_builder = ConfigBuilder::new();

    if let Some(ref path) = args.config_file {
        config_builder = config_builder.config_file(path);
    }
    if let Some(w) = args.workers {
        config_builder = config_builder.max_workers(w);
    }
    if let Some(ref h) = args.hostname {
        config_builder = config_builder.hostname(h);
    }
    if let Some(ref s) = args.source_address {
        config_builder = config_builder.source_address(s);
    }
    if let Some(t) = args.smtp_timeout {
        config_builder = config_builder.smtp_timeout(Duration::from_secs(t));
    }
    if let Some(t) = args.request_timeout {
        config_builder = config_builder.request_timeout(Duration::from_secs(t));
    }
    if let Some(t) = args.dns_timeout {
        config_builder = config_builder.dns_timeout(Duration::from_secs(t));
    }
    if let Some(ref servers) = args.dns_servers {
        if !servers.is_empty() {
            config_builder = config_builder.dns_servers(servers.clone());
        }
    }
    if let Some(ref url) = args.disposable_list_url {
        config_builder = config_builder.disposable_list_url(Some(url));
    }
    if args.no_avatar {
        config_builder = config_builder.enable_avatar_check(false);
    }

    config_builder.build().map_err(|e| {
        tracing::error!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to build configuration: {}", e)
    })
}

fn collect_inputs(args: &AppArgs) -> Result<Vec<String>> {
    let mut inputs = args.addresses.clone();

    if let Some(ref path) = args.input {
        tracing::info!("Loading addresses from '{}'...", path);
        let file = File::open(path)
            .with_context(|| format!("Failed to open input file '{}'", path))?;
        inputs.extend(read_lines(BufReader::new(file))?);
    }
    if args.stdin {
        tracing::debug!("Reading addresses from standard input");
        inputs.extend(read_lines(std::io::stdin().lock())?);
    }

    Ok(inputs)
}

fn read_lines(reader: impl Read) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in BufReader::new(reader).lines() {
        let line = line.context("Failed to read address list")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push(trimmed.to_string());
    }
    Ok(lines)
}

fn write_results(lookups: &[Lookup], format: OutputFormat, path: Option<&str>) -> Result<()> {
    let mut rendered = match format {
        OutputFormat::Json => output::to_json_list(lookups),
        OutputFormat::Xml => output::to_xml_list(lookups),
    }
    .map_err(|e| anyhow::anyhow!("Failed to render results: {}", e))?;
    rendered.push('\n');

    match path {
        Some(path) => {
            if let Some(parent_dir) = Path::new(path).parent() {
                if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                    std::fs::create_dir_all(parent_dir).with_context(|| {
                        format!("Failed to create output directory '{}'", parent_dir.display())
                    })?;
                }
            }
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write results to '{}'", path))?;
            tracing::info!("Results saved to '{}'.", path);
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write results to stdout")?;
        }
    }
    Ok(())
}

fn log_summary(lookups: &[Lookup], rejected: usize, duration: Duration) {
    let count = |f: fn(&Lookup) -> bool| lookups.iter().filter(|l| f(l)).count();

    tracing::info!("--------------------- Summary ---------------------");
    tracing::info!("Addresses verified:   {}", lookups.len());
    tracing::info!("Rejected inputs:      {}", rejected);
    tracing::info!("Deliverable:          {}", count(|l| l.deliverable));
    tracing::info!("Catch-all:            {}", count(|l| l.catch_all));
    tracing::info!("Host absent:          {}", count(|l| !l.host_exists));
    tracing::info!("Full inbox:           {}", count(|l| l.full_inbox));
    tracing::info!("Disposable:           {}", count(|l| l.disposable));
    tracing::info!("With errors:          {}", count(|l| l.error_summary.is_some()));
    tracing::info!("Total time:           {:.2?}", duration);
    tracing::info!("---------------------------------------------------");
}
