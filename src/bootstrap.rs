//! Bootstrap helpers for brokerdesk.
//!
//! Env vars are read before any config file so that operators can point the
//! CLI at a different backend without editing `config.toml`.
//!
//! File: `~/.brokerdesk/.env` (standard dotenvy format)

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "brokerdesk=info";

/// Base directory for brokerdesk state: `~/.brokerdesk`.
pub fn brokerdesk_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".brokerdesk")
}

/// Path to the brokerdesk-specific `.env` file: `~/.brokerdesk/.env`.
pub fn brokerdesk_env_path() -> PathBuf {
    brokerdesk_base_dir().join(".env")
}

/// Load env vars from `./.env` and `~/.brokerdesk/.env`.
///
/// dotenvy never overwrites existing env vars, so the effective priority is:
///
///   explicit env vars > `./.env` > `~/.brokerdesk/.env`
pub fn load_brokerdesk_env() {
    let _ = dotenvy::dotenv();

    let path = brokerdesk_env_path();
    if path.exists() {
        let _ = dotenvy::from_path(&path);
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over [`DEFAULT_LOG_FILTER`]. With `json` set, events are
/// emitted as one JSON object per line for log shippers.
pub fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing already initialized: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_path_lives_under_base_dir() {
        let env_path = brokerdesk_env_path();
        assert!(env_path.starts_with(brokerdesk_base_dir()));
        assert!(env_path.ends_with(".env"));
    }
}
