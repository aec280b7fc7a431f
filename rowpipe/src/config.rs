//! Application configuration management (§6).
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides, layered: a base YAML file,
//! then `ROWPIPE_`-prefixed environment variables (double-underscore for
//! nesting), then a couple of conventional bare env vars (`DATABASE_URL`)
//! that take precedence over everything.
//!
//! ## Loading priority (later wins)
//!
//! 1. YAML config file (default: `config.yaml`, override with `-f` or `ROWPIPE_CONFIG`)
//! 2. `ROWPIPE_*` environment variables, `__`-separated for nesting
//!    (e.g. `ROWPIPE_WORKER__BATCH_SIZE=2000`)
//! 3. `DATABASE_URL` — overrides `db.url` if set

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Error;
use crate::telemetry::LogFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "ROWPIPE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub job: JobConfig,
    pub upload: UploadConfig,
    pub pipeline: PipelineConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
    /// Email address for the initial admin user (created on first startup).
    pub admin_email: String,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/rowpipe".to_string(),
            max_connections: 20,
        }
    }
}

/// Object store credentials (§4.2). When `upload.temp_dir` is set, the
/// filesystem-backed `ObjectStore` is used instead and these fields are
/// ignored (see [`PipelineMode`] and [`UploadConfig`]).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            bucket: "rowpipe-uploads".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            region: "us-east-1".to_string(),
        }
    }
}

/// Task broker URL, accepted for forward-compatibility with an external
/// queue; unused by the default in-process worker (§5).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    pub url: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { url: None }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Rows per batch commit.
    pub batch_size: usize,
    /// Bytes per persisted chunk (persisted-chunks mode only).
    pub chunk_bytes: u64,
    /// Backpressure threshold: `create-job` is refused past this many queued jobs.
    pub queue_high_water_mark: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            chunk_bytes: 8 * 1024 * 1024,
            queue_high_water_mark: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    #[serde(with = "humantime_serde")]
    pub soft_timeout_s: Duration,
    #[serde(with = "humantime_serde")]
    pub hard_timeout_s: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            soft_timeout_s: Duration::from_secs(3600),
            hard_timeout_s: Duration::from_secs(3900),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Optional local path for streaming large uploads to disk instead of
    /// memory; when set, the filesystem `ObjectStore` implementation is used
    /// instead of S3.
    pub temp_dir: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { temp_dir: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    InMemory,
    PersistedChunks,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub mode: PipelineMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::InMemory,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify bearer tokens.
    pub jwt_secret: Option<String>,
    #[serde(with = "humantime_serde")]
    pub jwt_expiry: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiry: Duration::from_secs(86400),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "rowpipe=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            db: DbConfig::default(),
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
            worker: WorkerConfig::default(),
            job: JobConfig::default(),
            upload: UploadConfig::default(),
            pipeline: PipelineConfig::default(),
            auth: AuthConfig::default(),
            log: LogConfig::default(),
            admin_email: "admin@example.com".to_string(),
            admin_password: None,
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("ROWPIPE_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "db.url".into()))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.auth.jwt_secret.is_none() {
            return Err(Error::Internal {
                operation: "config validation: auth.jwt_secret is required (set ROWPIPE_AUTH__JWT_SECRET)".to_string(),
            });
        }

        if self.job.soft_timeout_s >= self.job.hard_timeout_s {
            return Err(Error::Internal {
                operation: "config validation: job.hard_timeout_s must be greater than job.soft_timeout_s".to_string(),
            });
        }

        if self.worker.batch_size == 0 {
            return Err(Error::Internal {
                operation: "config validation: worker.batch_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}
