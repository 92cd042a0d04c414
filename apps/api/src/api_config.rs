use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use cisync_core::{AppError, AppResult};
use cisync_domain::DEFAULT_DISCOVERY_SOURCE;
use cisync_infrastructure::{CmdbAuth, HttpCmdbClientConfig};
use tracing_subscriber::EnvFilter;

pub const DEFAULT_SIGNATURE_HEADER: &str = "x-cisync-signature";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdbBackendConfig {
    Memory,
    Http(HttpCmdbClientConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockBackendConfig {
    Memory,
    Redis {
        redis_url: String,
        lease_seconds: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureStoreConfig {
    Memory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub api_host: String,
    pub api_port: u16,
    pub instance_id: String,
    pub signature_secret: String,
    pub signature_header: String,
    pub internal_shared_secret: String,
    pub cmdb_backend: CmdbBackendConfig,
    pub cmdb_call_timeout: Duration,
    pub discovery_source: String,
    pub reconcile_concurrency: usize,
    pub lock_wait_timeout: Duration,
    pub lock_backend: LockBackendConfig,
    pub failure_store: FailureStoreConfig,
}

impl ApiConfig {
    pub fn load() -> AppResult<Self> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        let mut config = Self::from_lookup(|name| env::var(name).ok())?;
        config.migrate_only = migrate_only;
        Ok(config)
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let api_host = env.or_default("API_HOST", "127.0.0.1");
        let api_port = env.parse_or("API_PORT", 3001_u16)?;
        let instance_id = env
            .non_empty("INSTANCE_ID")
            .unwrap_or_else(|| format!("cisync-api-{}", std::process::id()));

        let signature_secret = env.required_non_empty("SIGNATURE_SECRET")?;
        let signature_header = env
            .or_default("SIGNATURE_HEADER", DEFAULT_SIGNATURE_HEADER)
            .trim()
            .to_ascii_lowercase();
        let internal_shared_secret = env.required_non_empty("INTERNAL_SHARED_SECRET")?;

        let cmdb_backend = match env.or_default("CMDB_MODE", "http").as_str() {
            "memory" => CmdbBackendConfig::Memory,
            "http" => CmdbBackendConfig::Http(HttpCmdbClientConfig {
                instance_url: env.required_non_empty("CMDB_INSTANCE_URL")?,
                table: env.or_default("CMDB_TABLE", "cmdb_ci"),
                auth: match env.or_default("CMDB_AUTH", "basic").as_str() {
                    "basic" => CmdbAuth::Basic {
                        username: env.required_non_empty("CMDB_USERNAME")?,
                        password: env.required_non_empty("CMDB_PASSWORD")?,
                    },
                    "oauth" => CmdbAuth::Bearer {
                        token: env.required_non_empty("CMDB_OAUTH_TOKEN")?,
                    },
                    other => {
                        return Err(AppError::Validation(format!(
                            "CMDB_AUTH must be either 'basic' or 'oauth', got '{other}'"
                        )));
                    }
                },
            }),
            other => {
                return Err(AppError::Validation(format!(
                    "CMDB_MODE must be either 'http' or 'memory', got '{other}'"
                )));
            }
        };

        let cmdb_call_timeout_ms = env.parse_or("CMDB_CALL_TIMEOUT_MS", 10_000_u64)?;
        let lock_wait_timeout_ms = env.parse_or("LOCK_WAIT_TIMEOUT_MS", 15_000_u64)?;
        let reconcile_concurrency = env.parse_or("RECONCILE_CONCURRENCY", 8_usize)?;
        for (name, value) in [
            ("CMDB_CALL_TIMEOUT_MS", cmdb_call_timeout_ms),
            ("LOCK_WAIT_TIMEOUT_MS", lock_wait_timeout_ms),
            ("RECONCILE_CONCURRENCY", reconcile_concurrency as u64),
        ] {
            if value == 0 {
                return Err(AppError::Validation(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let discovery_source = env.or_default("DISCOVERY_SOURCE", DEFAULT_DISCOVERY_SOURCE);

        let lock_backend = match env.or_default("LOCK_BACKEND", "memory").as_str() {
            "memory" => LockBackendConfig::Memory,
            "redis" => {
                let lease_seconds = env.parse_or("LOCK_LEASE_SECONDS", 30_u32)?;
                // The lease has to outlive the locked find plus create or update.
                let locked_section_ms = cmdb_call_timeout_ms.saturating_mul(2);
                if u64::from(lease_seconds).saturating_mul(1_000) <= locked_section_ms {
                    return Err(AppError::Validation(format!(
                        "LOCK_LEASE_SECONDS ({lease_seconds}) must exceed twice CMDB_CALL_TIMEOUT_MS ({locked_section_ms} ms)"
                    )));
                }
                LockBackendConfig::Redis {
                    redis_url: env.required_non_empty("REDIS_URL")?,
                    lease_seconds,
                }
            }
            other => {
                return Err(AppError::Validation(format!(
                    "LOCK_BACKEND must be either 'memory' or 'redis', got '{other}'"
                )));
            }
        };

        let failure_store = match env.or_default("FAILURE_STORE", "memory").as_str() {
            "memory" => FailureStoreConfig::Memory,
            "postgres" => FailureStoreConfig::Postgres {
                database_url: env.required_non_empty("DATABASE_URL")?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "FAILURE_STORE must be either 'memory' or 'postgres', got '{other}'"
                )));
            }
        };

        Ok(Self {
            migrate_only: false,
            api_host,
            api_port,
            instance_id,
            signature_secret,
            signature_header,
            internal_shared_secret,
            cmdb_backend,
            cmdb_call_timeout: Duration::from_millis(cmdb_call_timeout_ms),
            discovery_source,
            reconcile_concurrency,
            lock_wait_timeout: Duration::from_millis(lock_wait_timeout_ms),
            lock_backend,
            failure_store,
        })
    }

    pub fn socket_address(&self) -> AppResult<SocketAddr> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Validation(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn non_empty(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.non_empty(name).unwrap_or_else(|| default.to_owned())
    }

    fn required_non_empty(&self, name: &str) -> AppResult<String> {
        self.non_empty(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    }

    fn parse_or<T>(&self, name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.non_empty(name) {
            Some(value) => value.parse::<T>().map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            }),
            None => Ok(default),
        }
    }
}
