use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Which storage backend serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// SQLite metadata + payload files on local disk.
    Local,
    /// Process memory; contents are lost on restart.
    Memory,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "memory" => Ok(Backend::Memory),
            other => bail!("unknown backend `{}` (expected `local` or `memory`)", other),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub verbose: bool,
    pub backend: Backend,
    pub storage_dir: String,
    pub database_url: String,
    /// Buckets created at startup if missing.
    pub buckets: Vec<String>,
    pub readiness_buckets: Vec<String>,
    pub readiness_timeout: Duration,
    pub signed_urls: bool,
    /// HMAC key file used to sign URLs.
    pub credentials: Option<PathBuf>,
    pub signed_url_ttl: Duration,
    pub signing_endpoint: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP proxy in front of an object store")]
pub struct Args {
    /// Host to bind to (overrides OBJECT_PROXY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides OBJECT_PROXY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Show access log (overrides OBJECT_PROXY_VERBOSE)
    #[arg(short, long)]
    pub verbose: bool,

    /// Storage backend (overrides OBJECT_PROXY_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Directory where object payloads are stored (overrides OBJECT_PROXY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides OBJECT_PROXY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Comma-separated buckets to create at startup (overrides OBJECT_PROXY_BUCKETS)
    #[arg(long, value_delimiter = ',')]
    pub buckets: Option<Vec<String>>,

    /// Comma-separated buckets probed by /readiness (overrides OBJECT_PROXY_READINESS_BUCKETS)
    #[arg(long, value_delimiter = ',')]
    pub readiness_buckets: Option<Vec<String>>,

    /// Per-bucket readiness probe timeout in seconds (overrides OBJECT_PROXY_READINESS_TIMEOUT_SECS)
    #[arg(long)]
    pub readiness_timeout_secs: Option<u64>,

    /// Redirect media downloads to signed URLs (overrides OBJECT_PROXY_SIGNED_URLS)
    #[arg(long)]
    pub signed_urls: bool,

    /// Path to the HMAC key file used for signing (overrides OBJECT_PROXY_CREDENTIALS)
    #[arg(short, long)]
    pub credentials: Option<PathBuf>,

    /// Signed URL validity in seconds (overrides OBJECT_PROXY_SIGNED_URL_TTL_SECS)
    #[arg(long)]
    pub signed_url_ttl_secs: Option<u64>,

    /// Base URL signed URLs point at (overrides OBJECT_PROXY_SIGNING_ENDPOINT)
    #[arg(long)]
    pub signing_endpoint: Option<String>,

    /// Apply the database schema and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args, |name| env::var(name).ok())?, migrate))
    }

    /// CLI values win over environment values, which win over defaults.
    fn merge(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let parsed = |name: &str| -> Result<Option<u64>> {
            env(name)
                .map(|value| {
                    value
                        .parse::<u64>()
                        .with_context(|| format!("parsing {} value `{}`", name, value))
                })
                .transpose()
        };
        let flag = |name: &str| -> Result<bool> {
            match env(name).as_deref().map(str::to_ascii_lowercase).as_deref() {
                None | Some("") | Some("0") | Some("false") => Ok(false),
                Some("1") | Some("true") => Ok(true),
                Some(other) => bail!("parsing {} value `{}`", name, other),
            }
        };
        let list = |name: &str| -> Option<Vec<String>> { env(name).map(|value| split_list(&value)) };

        let env_port = match env("OBJECT_PROXY_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing OBJECT_PROXY_PORT value `{}`", value))?,
            None => 8080,
        };
        let env_backend = match env("OBJECT_PROXY_BACKEND") {
            Some(value) => value
                .parse::<Backend>()
                .context("parsing OBJECT_PROXY_BACKEND")?,
            None => Backend::Local,
        };

        let readiness_timeout_secs = match args.readiness_timeout_secs {
            Some(secs) => secs,
            None => parsed("OBJECT_PROXY_READINESS_TIMEOUT_SECS")?.unwrap_or(5),
        };
        let signed_url_ttl_secs = match args.signed_url_ttl_secs {
            Some(secs) => secs,
            None => parsed("OBJECT_PROXY_SIGNED_URL_TTL_SECS")?.unwrap_or(3600),
        };

        Ok(Self {
            host: args
                .host
                .or_else(|| env("OBJECT_PROXY_HOST"))
                .unwrap_or_else(|| "127.0.0.1".into()),
            port: args.port.unwrap_or(env_port),
            verbose: args.verbose || flag("OBJECT_PROXY_VERBOSE")?,
            backend: args.backend.unwrap_or(env_backend),
            storage_dir: args
                .storage_dir
                .or_else(|| env("OBJECT_PROXY_STORAGE_DIR"))
                .unwrap_or_else(|| "./data/objects".into()),
            database_url: args
                .database_url
                .or_else(|| env("OBJECT_PROXY_DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/meta/object_proxy.db".into()),
            buckets: clean_list(
                args.buckets
                    .or_else(|| list("OBJECT_PROXY_BUCKETS"))
                    .unwrap_or_default(),
            ),
            readiness_buckets: clean_list(
                args.readiness_buckets
                    .or_else(|| list("OBJECT_PROXY_READINESS_BUCKETS"))
                    .unwrap_or_default(),
            ),
            readiness_timeout: Duration::from_secs(readiness_timeout_secs),
            signed_urls: args.signed_urls || flag("OBJECT_PROXY_SIGNED_URLS")?,
            credentials: args
                .credentials
                .or_else(|| env("OBJECT_PROXY_CREDENTIALS").map(PathBuf::from)),
            signed_url_ttl: Duration::from_secs(signed_url_ttl_secs),
            signing_endpoint: args
                .signing_endpoint
                .or_else(|| env("OBJECT_PROXY_SIGNING_ENDPOINT"))
                .unwrap_or_else(|| "https://storage.googleapis.com".into()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::to_string).collect()
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
