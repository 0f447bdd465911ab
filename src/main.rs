//! cloudflare-dyndns - keep Cloudflare A/AAAA records pointed at this host.

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use cloudflare_dyndns::cache::CacheManager;
use cloudflare_dyndns::config::{Config, DEFAULT_API_BASE_URL};
use cloudflare_dyndns::detector::IpDetector;
use cloudflare_dyndns::engine::{UpdateEngine, UpdateOptions};
use cloudflare_dyndns::error::DdnsError;
use cloudflare_dyndns::providers::CloudflareProvider;
use cloudflare_dyndns::types::{IpFamily, PassResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const EXIT_CODES_HELP: &str = "\
Shell exit codes:
  1: Unknown error happened
  2: IP cannot be determined (IP service error)
  3: Cloudflare related error (cannot call API, cannot get records, etc...)";

/// Update Cloudflare DNS A and/or AAAA records based on the current IP
/// address(es) of the machine running the command.
///
/// For the main domain (the "@" record), simply put "example.com".
/// Subdomains can also be specified, eg. "*.example.com" or "sub.example.com".
///
/// The domains can also be given in the CLOUDFLARE_DOMAINS environment
/// variable, separated by whitespace.
#[derive(Parser)]
#[command(name = "cloudflare-dyndns")]
#[command(version, after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Domains to update
    domains: Vec<String>,

    /// Cloudflare API token
    #[arg(long, env = "CLOUDFLARE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// File containing the Cloudflare API token
    #[arg(long, env = "CLOUDFLARE_API_TOKEN_FILE")]
    api_token_file: Option<PathBuf>,

    /// Check that the API token is valid and list the zones it can manage
    #[arg(long)]
    verify_token: bool,

    /// Route traffic of the records through Cloudflare
    #[arg(long)]
    proxied: bool,

    /// Turn on IPv4 detection and set A records [default: on]
    #[arg(short = '4', overrides_with = "no_ipv4")]
    ipv4: bool,

    /// Turn off IPv4 detection
    #[arg(long = "no-4", overrides_with = "ipv4")]
    no_ipv4: bool,

    /// Turn on IPv6 detection and set AAAA records [default: off]
    #[arg(short = '6', overrides_with = "no_ipv6")]
    ipv6: bool,

    /// Turn off IPv6 detection
    #[arg(long = "no-6", overrides_with = "ipv6")]
    no_ipv6: bool,

    /// Delete the A/AAAA records when no IPv4/IPv6 address is found
    #[arg(long)]
    delete_missing: bool,

    /// Cache file [default: <cache dir>/cloudflare-dyndns/ip.cache]
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Ignore the cache and update every domain
    #[arg(long)]
    force: bool,

    /// Verbose messages and full error context
    #[arg(long)]
    debug: bool,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn families(&self) -> anyhow::Result<Vec<IpFamily>> {
        let mut families = Vec::new();
        if self.ipv4 || !self.no_ipv4 {
            families.push(IpFamily::V4);
        }
        if self.ipv6 && !self.no_ipv6 {
            families.push(IpFamily::V6);
        }

        if families.is_empty() {
            bail!("You have to specify at least one IP mode; use -4 or -6.");
        }
        Ok(families)
    }
}

fn get_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }

    // Default locations
    let candidates = [
        dirs::config_dir().map(|p| p.join("cloudflare-dyndns/config.toml")),
        Some(PathBuf::from("/etc/cloudflare-dyndns/config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.exists() {
            return candidate;
        }
    }

    // Return default even if it doesn't exist
    Config::default_path().unwrap_or_else(|_| PathBuf::from("config.toml"))
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "cloudflare_dyndns=debug,warn"
    } else {
        "cloudflare_dyndns=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(result) => result.into(),
        Err(e) => {
            tracing::error!("{:#}", e);
            tracing::debug!("{:?}", e);
            PassResult::UnknownError.into()
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<PassResult> {
    let config_path = get_config_path(cli.config.clone());
    let config = Config::load_from(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let timeout = Duration::from_secs(config.http_timeout_secs);

    let families = cli.families()?;
    let api_token = parse_api_token(cli.api_token, cli.api_token_file.as_deref(), &config)?;
    let provider = if config.api_base_url == DEFAULT_API_BASE_URL {
        CloudflareProvider::new(api_token, timeout)?
    } else {
        tracing::debug!("Using Cloudflare API at {}", config.api_base_url);
        CloudflareProvider::with_base_url(api_token, config.api_base_url.clone(), timeout)?
    };

    if cli.verify_token {
        return Ok(cmd_verify_token(&provider).await);
    }

    let domains = parse_domains(cli.domains, std::env::var("CLOUDFLARE_DOMAINS").ok())?;
    tracing::info!("Domains to update: {}", domains.join(", "));

    let cache_path = cli
        .cache_file
        .or_else(|| config.cache_file.clone())
        .unwrap_or_else(CacheManager::default_path);
    let cache_manager = CacheManager::new(cache_path);
    let old_cache = cache_manager.load_or_reset()?;
    let mut new_cache = old_cache.clone();

    let detector = IpDetector::from_config(&config)?;
    let options = UpdateOptions {
        domains,
        force: cli.force,
        proxied: cli.proxied,
        delete_missing: cli.delete_missing,
        debug: cli.debug,
    };

    let mut engine = UpdateEngine::new(&provider, &detector, options);
    let result = engine
        .run(&families, &old_cache, &mut new_cache)
        .await
        .context("Update failed")?;

    if let Err(e) = cache_manager.persist(&old_cache, &new_cache) {
        tracing::error!("Failed to save cache: {}", e);
    }

    if result.is_ok() {
        tracing::info!("Done.");
    } else {
        tracing::warn!("There were some errors during update.");
    }
    Ok(result)
}

async fn cmd_verify_token(provider: &CloudflareProvider) -> PassResult {
    if let Err(e) = provider.verify_token().await {
        match e {
            DdnsError::TokenInvalid(_) => tracing::error!("Cloudflare API token is invalid!"),
            e => tracing::error!("Failed to verify Cloudflare API token: {}", e),
        }
        return PassResult::ProviderError;
    }

    let zones = match provider.list_zones().await {
        Ok(zones) => zones,
        Err(e) => {
            tracing::error!("Failed to get zones: {}", e);
            return PassResult::ProviderError;
        }
    };

    println!("Cloudflare API token is valid for managing the following zones:");
    for zone in zones {
        println!("  - {}", zone.name);
    }

    PassResult::Ok
}

fn parse_api_token(
    api_token: Option<String>,
    api_token_file: Option<&Path>,
    config: &Config,
) -> anyhow::Result<String> {
    let api_token = api_token.filter(|t| !t.is_empty());

    match (api_token, api_token_file) {
        (Some(_), Some(_)) => {
            bail!("Ambiguous api token, use either --api-token or --api-token-file, not both!")
        }
        (Some(token), None) => Ok(token),
        (None, Some(path)) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read API token file {}", path.display()))?;
            Ok(content.trim().to_string())
        }
        (None, None) => config.resolved_api_token().ok_or_else(|| {
            anyhow!("You have to specify an api token; use --api-token or --api-token-file.")
        }),
    }
}

fn parse_domains(domains: Vec<String>, domains_env: Option<String>) -> anyhow::Result<Vec<String>> {
    let domains_env = domains_env.filter(|d| !d.trim().is_empty());

    match (domains.is_empty(), domains_env) {
        (true, None) => bail!(
            "You need to specify either domains argument or CLOUDFLARE_DOMAINS environment variable!"
        ),
        (false, Some(_)) => bail!(
            "Ambiguous domain list, use either argument list or CLOUDFLARE_DOMAINS environment variable, not both!"
        ),
        (true, Some(env)) => Ok(env.split_whitespace().map(str::to_string).collect()),
        (false, None) => Ok(domains),
    }
}
