use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;

/// Default ceiling on request bodies read by the dispatcher and the RPC gateway.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

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
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Secret used to sign CSRF tokens. When unset a random secret is generated at
    /// startup, which invalidates every outstanding token on restart.
    #[arg(long, env)]
    csrf_secret: Option<String>,

    /// Maximum age in seconds of an accepted CSRF token
    #[arg(long, env, default_value_t = 86400)]
    pub csrf_token_max_age_secs: u64,

    /// Require a valid CSRF token on RPC calls
    #[arg(long, env, default_value_t = true, action = clap::ArgAction::Set)]
    pub rpc_csrf_required: bool,

    /// Location mutating actions redirect to when they produce no explicit result
    #[arg(long, env, default_value = "/")]
    pub default_redirect: String,

    /// Largest request body, in bytes, that will be read and parsed
    #[arg(long, env, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Path the Action Cable WebSocket endpoint is mounted at
    #[arg(long, env, default_value = "/cable")]
    pub cable_path: String,

    /// Seconds between heartbeat pings sent to cable connections
    #[arg(long, env, default_value_t = 3)]
    pub cable_heartbeat_secs: u64,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
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

    pub fn csrf_secret(&self) -> Option<&str> {
        self.csrf_secret.as_deref()
    }

    pub fn set_csrf_secret(mut self, secret: String) -> Self {
        self.csrf_secret = Some(secret);
        self
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }

    /// Whether 500 responses carry the underlying error detail.
    pub fn expose_error_details(&self) -> bool {
        !self.is_production()
    }

    pub fn listen_address(&self) -> String {
        format!(
            "{}:{}",
            self.interface.as_deref().unwrap_or("127.0.0.1"),
            self.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::parse_from(std::iter::once("turbo_runtime").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.port, 4000);
        assert_eq!(config.default_redirect, "/");
        assert_eq!(config.cable_path, "/cable");
        assert_eq!(config.csrf_token_max_age_secs, 86400);
        assert!(config.rpc_csrf_required);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_production_hides_error_details() {
        let config = parse(&["--runtime-env", "production"]);
        assert!(config.is_production());
        assert!(!config.expose_error_details());

        let config = parse(&["--runtime-env", "DEVELOPMENT"]);
        assert!(config.expose_error_details());
    }

    #[test]
    fn test_rpc_csrf_can_be_disabled() {
        let config = parse(&["--rpc-csrf-required", "false"]);
        assert!(!config.rpc_csrf_required);
    }

    #[test]
    fn test_rust_env_parse() {
        assert_eq!("Staging".parse::<RustEnv>(), Ok(RustEnv::Staging));
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));
    }

    #[test]
    fn test_listen_address() {
        let config = parse(&["--interface", "0.0.0.0", "--port", "8080"]);
        assert_eq!(config.listen_address(), "0.0.0.0:8080");
    }
}
