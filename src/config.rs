use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::{env, fmt};

const DEFAULT_DB_NAME: &str = "appdb";
const DEFAULT_DB_PORT: u16 = 5432;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub bucket: String,
    pub s3_endpoint_url: Option<String>,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "File upload service backed by S3 and PostgreSQL")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_SERVICE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_SERVICE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Bucket receiving uploaded files (overrides S3_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Custom S3 endpoint, e.g. MinIO (overrides S3_ENDPOINT_URL)
    #[arg(long)]
    pub s3_endpoint_url: Option<String>,

    /// Database host (overrides DB_HOST)
    #[arg(long)]
    pub db_host: Option<String>,

    /// Database port (overrides DB_PORT)
    #[arg(long)]
    pub db_port: Option<u16>,

    /// Database user (overrides DB_USER)
    #[arg(long)]
    pub db_user: Option<String>,

    /// Database password (overrides DB_PASS)
    #[arg(long)]
    pub db_password: Option<String>,

    /// Database name (overrides DB_NAME)
    #[arg(long)]
    pub db_name: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge parsed CLI args over values produced by `lookup`.
    ///
    /// CLI flags win; `lookup` is consulted only for flags that were not given.
    pub fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |arg: Option<String>, name: &str| -> Result<String> {
            arg.or_else(|| lookup(name))
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("missing required setting {}", name))
        };
        let port = |arg: Option<u16>, name: &str, default: u16| -> Result<u16> {
            if let Some(port) = arg {
                return Ok(port);
            }
            match lookup(name) {
                Some(value) => value
                    .parse::<u16>()
                    .with_context(|| format!("parsing {} value `{}`", name, value)),
                None => Ok(default),
            }
        };

        Ok(Self {
            host: args
                .host
                .or_else(|| lookup("UPLOAD_SERVICE_HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: port(args.port, "UPLOAD_SERVICE_PORT", 3000)?,
            bucket: required(args.bucket, "S3_BUCKET")?,
            s3_endpoint_url: args
                .s3_endpoint_url
                .or_else(|| lookup("S3_ENDPOINT_URL"))
                .filter(|v| !v.is_empty()),
            db_host: required(args.db_host, "DB_HOST")?,
            db_port: port(args.db_port, "DB_PORT", DEFAULT_DB_PORT)?,
            db_user: required(args.db_user, "DB_USER")?,
            db_password: required(args.db_password, "DB_PASS")?,
            db_name: args
                .db_name
                .or_else(|| lookup("DB_NAME"))
                .unwrap_or_else(|| DEFAULT_DB_NAME.into()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Public retrieval URL of `key` in the configured bucket.
    ///
    /// The key is inserted verbatim, without percent-encoding.
    pub fn public_url(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.bucket, key)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("bucket", &self.bucket)
            .field("s3_endpoint_url", &self.s3_endpoint_url)
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("db_name", &self.db_name)
            .finish()
    }
}
