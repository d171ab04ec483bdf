use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Pressroom binary.
#[derive(Debug, Parser)]
#[command(name = "pressroom", version, about = "Pressroom read-cache service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PRESSROOM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and admin HTTP listeners.
    Serve(Box<ServeArgs>),
    /// Download a point-in-time cache report from a running instance.
    Report(ReportArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the admin listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the log level (e.g. info, debug).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON logs.
    #[arg(long = "log-json", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub log_json: Option<bool>,

    /// Backing store adapter: `memory` or `http`.
    #[arg(long = "store-backend", value_name = "BACKEND")]
    pub store_backend: Option<String>,

    /// Base URL of the HTTP document store.
    #[arg(long = "store-base-url", value_name = "URL")]
    pub store_base_url: Option<String>,

    /// JSON file used to seed the in-memory store.
    #[arg(long = "store-seed-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub store_seed_file: Option<PathBuf>,

    /// IANA timezone used to decide peak hours.
    #[arg(long = "cache-timezone", value_name = "TZ")]
    pub cache_timezone: Option<String>,

    /// Seconds between periodic collection revalidations (0 disables).
    #[arg(long = "revalidation-interval-seconds", value_name = "SECONDS")]
    pub revalidation_interval_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct ReportArgs {
    /// Base URL of a running instance's admin listener.
    #[arg(
        long = "admin-url",
        env = "PRESSROOM_ADMIN_URL",
        value_name = "URL",
        default_value = "http://127.0.0.1:3001"
    )]
    pub admin_url: String,

    /// Where to write the report; `-` writes to stdout.
    #[arg(long, short, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}
