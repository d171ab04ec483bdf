//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use chrono_tz::Tz;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::{CliArgs, Command, ReportArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pressroom";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_ARTICLE_LIST_LIMIT: u64 = 8;
const DEFAULT_ARTICLE_LIST_TTL_SECS: u64 = 300;
const DEFAULT_CATEGORY_LIMIT: u64 = 4;
const DEFAULT_CATEGORY_TTL_SECS: u64 = 3600;
const DEFAULT_ARTICLE_LIMIT: u64 = 200;
const DEFAULT_ARTICLE_TTL_SECS: u64 = 600;
const DEFAULT_PAGE_SIZE: u64 = 100;
const DEFAULT_PEAK_START_HOUR: u8 = 9;
const DEFAULT_PEAK_END_HOUR: u8 = 23;
const DEFAULT_OFF_PEAK_MULTIPLIER: u64 = 3;
const DEFAULT_DAILY_READS: u64 = 50_000;
const DEFAULT_DAILY_WRITES: u64 = 20_000;
const DEFAULT_DAILY_DELETES: u64 = 20_000;
const DEFAULT_REVALIDATION_INTERVAL_SECS: u64 = 3600;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub quota: QuotaSettings,
    pub revalidation: RevalidationSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Http,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub base_url: Option<Url>,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub article_list_limit: NonZeroUsize,
    pub article_list_ttl: Duration,
    pub category_limit: NonZeroUsize,
    pub category_ttl: Duration,
    pub article_limit: NonZeroUsize,
    pub article_ttl: Duration,
    pub page_size: NonZeroUsize,
    pub peak_start_hour: u8,
    pub peak_end_hour: u8,
    pub off_peak_multiplier: NonZeroU32,
    pub timezone: Tz,
    pub coalesce_refreshes: bool,
}

#[derive(Debug, Clone)]
pub struct QuotaSettings {
    pub daily_reads: NonZeroU64,
    pub daily_writes: NonZeroU64,
    pub daily_deletes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct RevalidationSettings {
    /// `None` disables periodic revalidation.
    pub interval: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("PRESSROOM").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Report(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    store: RawStoreSettings,
    cache: RawCacheSettings,
    quota: RawQuotaSettings,
    revalidation: RawRevalidationSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(backend) = overrides.store_backend.as_ref() {
            self.store.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.store_base_url.as_ref() {
            self.store.base_url = Some(url.clone());
        }
        if let Some(path) = overrides.store_seed_file.as_ref() {
            self.store.seed_file = Some(path.clone());
        }
        if let Some(timezone) = overrides.cache_timezone.as_ref() {
            self.cache.timezone = Some(timezone.clone());
        }
        if let Some(seconds) = overrides.revalidation_interval_seconds {
            self.revalidation.interval_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            store,
            cache,
            quota,
            revalidation,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let store = build_store_settings(store)?;
        let cache = build_cache_settings(cache)?;
        let quota = build_quota_settings(quota)?;
        let revalidation = build_revalidation_settings(revalidation);

        Ok(Self {
            server,
            logging,
            store,
            cache,
            quota,
            revalidation,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }
    if admin_port == public_port {
        return Err(LoadError::invalid(
            "server.admin_port",
            "must differ from server.public_port",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;

    Ok(ServerSettings {
        public_addr,
        admin_addr,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let backend = match store
        .backend
        .as_deref()
        .map(|value| value.trim().to_ascii_lowercase())
        .as_deref()
    {
        None | Some("memory") => StoreBackend::Memory,
        Some("http") => StoreBackend::Http,
        Some(other) => {
            return Err(LoadError::invalid(
                "store.backend",
                format!("unknown backend `{other}` (expected memory or http)"),
            ));
        }
    };

    let base_url = match non_empty(store.base_url) {
        Some(raw) => Some(
            Url::parse(&raw)
                .map_err(|err| LoadError::invalid("store.base_url", err.to_string()))?,
        ),
        None => None,
    };
    if backend == StoreBackend::Http && base_url.is_none() {
        return Err(LoadError::invalid(
            "store.base_url",
            "required when store.backend is http",
        ));
    }

    let timeout_seconds = store.timeout_seconds.unwrap_or(DEFAULT_STORE_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "store.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(StoreSettings {
        backend,
        base_url,
        api_key: non_empty(store.api_key),
        timeout: Duration::from_secs(timeout_seconds),
        seed_file: store.seed_file,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let peak_start_hour = cache.peak_start_hour.unwrap_or(DEFAULT_PEAK_START_HOUR);
    let peak_end_hour = cache.peak_end_hour.unwrap_or(DEFAULT_PEAK_END_HOUR);
    if peak_start_hour > 23 {
        return Err(LoadError::invalid(
            "cache.peak_start_hour",
            "must be between 0 and 23",
        ));
    }
    if peak_end_hour > 23 {
        return Err(LoadError::invalid(
            "cache.peak_end_hour",
            "must be between 0 and 23",
        ));
    }
    if peak_start_hour == peak_end_hour {
        return Err(LoadError::invalid(
            "cache.peak_end_hour",
            "must differ from cache.peak_start_hour",
        ));
    }

    let timezone = match non_empty(cache.timezone) {
        Some(name) => Tz::from_str(&name)
            .map_err(|err| LoadError::invalid("cache.timezone", err.to_string()))?,
        None => Tz::UTC,
    };

    let off_peak_multiplier = non_zero_u32(
        cache
            .off_peak_multiplier
            .unwrap_or(DEFAULT_OFF_PEAK_MULTIPLIER),
        "cache.off_peak_multiplier",
    )?;

    Ok(CacheSettings {
        article_list_limit: non_zero_usize(
            cache
                .article_list_limit
                .unwrap_or(DEFAULT_ARTICLE_LIST_LIMIT),
            "cache.article_list_limit",
        )?,
        article_list_ttl: ttl(
            cache
                .article_list_ttl_seconds
                .unwrap_or(DEFAULT_ARTICLE_LIST_TTL_SECS),
            "cache.article_list_ttl_seconds",
        )?,
        category_limit: non_zero_usize(
            cache.category_limit.unwrap_or(DEFAULT_CATEGORY_LIMIT),
            "cache.category_limit",
        )?,
        category_ttl: ttl(
            cache
                .category_ttl_seconds
                .unwrap_or(DEFAULT_CATEGORY_TTL_SECS),
            "cache.category_ttl_seconds",
        )?,
        article_limit: non_zero_usize(
            cache.article_limit.unwrap_or(DEFAULT_ARTICLE_LIMIT),
            "cache.article_limit",
        )?,
        article_ttl: ttl(
            cache.article_ttl_seconds.unwrap_or(DEFAULT_ARTICLE_TTL_SECS),
            "cache.article_ttl_seconds",
        )?,
        page_size: non_zero_usize(
            cache.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            "cache.page_size",
        )?,
        peak_start_hour,
        peak_end_hour,
        off_peak_multiplier,
        timezone,
        coalesce_refreshes: cache.coalesce_refreshes.unwrap_or(true),
    })
}

fn build_quota_settings(quota: RawQuotaSettings) -> Result<QuotaSettings, LoadError> {
    Ok(QuotaSettings {
        daily_reads: non_zero_u64(
            quota.daily_reads.unwrap_or(DEFAULT_DAILY_READS),
            "quota.daily_reads",
        )?,
        daily_writes: non_zero_u64(
            quota.daily_writes.unwrap_or(DEFAULT_DAILY_WRITES),
            "quota.daily_writes",
        )?,
        daily_deletes: non_zero_u64(
            quota.daily_deletes.unwrap_or(DEFAULT_DAILY_DELETES),
            "quota.daily_deletes",
        )?,
    })
}

fn build_revalidation_settings(revalidation: RawRevalidationSettings) -> RevalidationSettings {
    let seconds = revalidation
        .interval_seconds
        .unwrap_or(DEFAULT_REVALIDATION_INTERVAL_SECS);
    RevalidationSettings {
        interval: (seconds > 0).then(|| Duration::from_secs(seconds)),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    backend: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_seconds: Option<u64>,
    seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    article_list_limit: Option<u64>,
    article_list_ttl_seconds: Option<u64>,
    category_limit: Option<u64>,
    category_ttl_seconds: Option<u64>,
    article_limit: Option<u64>,
    article_ttl_seconds: Option<u64>,
    page_size: Option<u64>,
    peak_start_hour: Option<u8>,
    peak_end_hour: Option<u8>,
    off_peak_multiplier: Option<u64>,
    timezone: Option<String>,
    coalesce_refreshes: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawQuotaSettings {
    daily_reads: Option<u64>,
    daily_writes: Option<u64>,
    daily_deletes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRevalidationSettings {
    interval_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn ttl(seconds: u64, key: &'static str) -> Result<Duration, LoadError> {
    if seconds == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(seconds))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_u64(value: u64, key: &'static str) -> Result<NonZeroU64, LoadError> {
    NonZeroU64::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value_usize: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value_usize)
        .ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
