use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::warn;

/// Placeholder JWT secrets that MUST NOT be used outside development.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SOLACE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("SOLACE_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("SOLACE_PORT is not a port: {raw}"))?,
            None => 3000,
        };
        let db_path = lookup("SOLACE_DB_PATH").unwrap_or_else(|| "solace.db".into()).into();

        let allow_dev_secret = lookup("SOLACE_ALLOW_DEV_SECRET").is_some_and(|v| v == "1");
        let jwt_secret = match lookup("SOLACE_JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) if !PLACEHOLDER_SECRETS.contains(&secret.as_str()) => secret,
            Some(secret) if allow_dev_secret => {
                warn!("SOLACE_JWT_SECRET is a placeholder; only acceptable in development");
                secret
            }
            None if allow_dev_secret => {
                warn!("SOLACE_JWT_SECRET unset; using the development secret");
                DEV_SECRET.to_string()
            }
            _ => bail!("SOLACE_JWT_SECRET is unset or still a placeholder (set SOLACE_ALLOW_DEV_SECRET=1 for local use)"),
        };

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_with_a_real_secret() {
        let config = Config::from_lookup(lookup(&[("SOLACE_JWT_SECRET", "s3cr3t-value")])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("solace.db"));
        assert_eq!(config.addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("SOLACE_JWT_SECRET", "dev-secret-change-me")])).is_err());
    }

    #[test]
    fn dev_secret_requires_opt_in() {
        let config = Config::from_lookup(lookup(&[("SOLACE_ALLOW_DEV_SECRET", "1")])).unwrap();
        assert_eq!(config.jwt_secret, DEV_SECRET);
    }

    #[test]
    fn bad_port_is_an_error() {
        let env = lookup(&[("SOLACE_JWT_SECRET", "x-real"), ("SOLACE_PORT", "http")]);
        assert!(Config::from_lookup(env).is_err());
    }
}
