use clap::builder::{RangedU64ValueParser, TypedValueParser as _};
use clap::{value_parser, Parser};
use dotenvy::dotenv;
use log::LevelFilter;
use sse::EngineConfig;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Origin value that switches CORS to the permissive "allow all" policy.
pub const ANY_ORIGIN: &str = "*";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that are allowed to receive server responses.
    /// A single "*" allows any origin (without credentials).
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:5173"
    )]
    pub allowed_origins: Vec<String>,

    /// Path prefix under which the relay endpoints are mounted
    #[arg(long, env, default_value = "/api/sse")]
    api_base_path: String,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 8080)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// Maximum number of concurrently connected subscribers. Unlimited when not set.
    #[arg(long, env)]
    pub max_subscribers: Option<usize>,

    /// Number of messages that may be queued per subscriber before writes wait
    #[arg(
        long,
        env,
        default_value_t = 32,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub subscriber_buffer: usize,

    /// Milliseconds a single subscriber write may wait before that subscriber is dropped
    #[arg(long, env, default_value_t = 5000, value_parser = value_parser!(u64).range(1..))]
    pub write_timeout_ms: u64,

    /// Seconds between SSE keep-alive comments sent on idle subscriber streams
    #[arg(long, env, default_value_t = 15, value_parser = value_parser!(u64).range(1..))]
    pub keep_alive_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Path prefix for the relay routes, always starting with '/' and never ending with one.
    pub fn api_base_path(&self) -> String {
        let trimmed = self.api_base_path.trim_matches('/');
        format!("/{trimmed}")
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == ANY_ORIGIN)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_subscribers: self.max_subscribers,
            subscriber_buffer: self.subscriber_buffer,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
