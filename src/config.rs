use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::{env, fmt, fs, path::PathBuf};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_BUCKET: &str = "flexo-store";

/// Centralized application configuration.
/// Combines CLI arguments, environment variables and an optional TOML file.
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub s3: S3Config,
    pub config_file: Option<PathBuf>,
}

/// Connection settings for the S3-compatible backend (`s3.*`).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct S3Config {
    pub region: String,
    pub bucket: String,
    /// Empty means "use the AWS endpoint for `region`".
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
}

impl S3Config {
    /// Static credentials are only used when both halves are present.
    pub fn has_static_credentials(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &str| if v.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("access_key", &redact(&self.access_key))
            .field("secret_key", &redact(&self.secret_key))
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "HTTP gateway in front of an S3-compatible object store")]
pub struct Args {
    /// TOML config file with `[server]` and `[s3]` tables (overrides STORE_GATEWAY_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Host to bind to (overrides STORE_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides STORE_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Backend region (overrides S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Bucket holding all objects (overrides S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Backend endpoint URL, e.g. http://localhost:9000 (overrides S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// Static access key (overrides S3_ACCESS_KEY)
    #[arg(long)]
    pub s3_access_key: Option<String>,

    /// Static secret key (overrides S3_SECRET_KEY)
    #[arg(long)]
    pub s3_secret_key: Option<String>,
}

/// Shape of the optional TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server: ServerSection,
    s3: S3Section,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct S3Section {
    region: Option<String>,
    bucket: Option<String>,
    endpoint: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
}

impl FileConfig {
    fn load(path: &PathBuf) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config file {}", path.display()))
    }
}

impl AppConfig {
    /// Parse CLI args and the process environment into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge the sources: CLI beats environment beats file beats defaults.
    pub fn resolve(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_file = args
            .config
            .or_else(|| env("STORE_GATEWAY_CONFIG").map(PathBuf::from));
        let file = match &config_file {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let pick = |cli: Option<String>, var: &str, from_file: Option<String>, default: &str| {
            cli.or_else(|| env(var))
                .or(from_file)
                .unwrap_or_else(|| default.to_string())
        };

        let env_port = match env("STORE_GATEWAY_PORT") {
            Some(value) => Some(
                value
                    .parse::<u16>()
                    .with_context(|| format!("parsing STORE_GATEWAY_PORT value `{}`", value))?,
            ),
            None => None,
        };

        let s3 = S3Config {
            region: pick(args.s3_region, "S3_REGION", file.s3.region, DEFAULT_REGION),
            bucket: pick(args.s3_bucket, "S3_BUCKET", file.s3.bucket, DEFAULT_BUCKET),
            endpoint: pick(args.s3_endpoint, "S3_ENDPOINT", file.s3.endpoint, ""),
            access_key: pick(args.s3_access_key, "S3_ACCESS_KEY", file.s3.access_key, ""),
            secret_key: pick(args.s3_secret_key, "S3_SECRET_KEY", file.s3.secret_key, ""),
        };

        Ok(Self {
            host: pick(args.host, "STORE_GATEWAY_HOST", file.server.host, DEFAULT_HOST),
            port: args
                .port
                .or(env_port)
                .or(file.server.port)
                .unwrap_or(DEFAULT_PORT),
            s3,
            config_file,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
