pub mod profiles;

use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use profiles::{Profile, ProfileDefaults};

use crate::services::signature::SigningSecret;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub gateway_base_url: String,
    pub gateway_key_id: Option<String>,
    pub gateway_key_secret: Option<SigningSecret>,
    pub gateway_timeout: Duration,
    pub currency: String,
    pub cors_allowed_origins: Option<String>,
}

pub struct ConfigInfo {
    pub config: Config,
    pub profile: Profile,
    pub overrides: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<ConfigInfo> {
        dotenv().ok();
        Self::from_lookup(Profile::from_env(), |key| env::var(key).ok())
    }

    /// Builds the configuration from `lookup`, falling back to the profile
    /// defaults for anything it does not supply.
    pub fn from_lookup<F>(profile: Profile, lookup: F) -> anyhow::Result<ConfigInfo>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ProfileDefaults::for_profile(profile);
        let mut overrides = Vec::new();
        let mut var = |key: &str| {
            let value = lookup(key).filter(|v| !v.trim().is_empty());
            if value.is_some() {
                overrides.push(key.to_string());
            }
            value
        };

        let server_port = match var("SERVER_PORT") {
            Some(v) => v
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a port number, got '{}'", v))?,
            None => defaults.server_port,
        };

        let database_url = var("DATABASE_URL")
            .or(defaults.database_url)
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let database_max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v.parse::<u32>().map_err(|_| {
                anyhow::anyhow!("DATABASE_MAX_CONNECTIONS must be a number, got '{}'", v)
            })?,
            None => defaults.database_max_connections,
        };

        let gateway_base_url = var("GATEWAY_BASE_URL").unwrap_or(defaults.gateway_base_url);
        let gateway_key_id = var("GATEWAY_KEY_ID");
        let gateway_key_secret = var("GATEWAY_KEY_SECRET")
            .map(SigningSecret::new)
            .transpose()
            .map_err(|e| anyhow::anyhow!("GATEWAY_KEY_SECRET: {}", e))?;

        let gateway_timeout_secs = match var("GATEWAY_TIMEOUT_SECS") {
            Some(v) => v.parse::<u64>().map_err(|_| {
                anyhow::anyhow!("GATEWAY_TIMEOUT_SECS must be a number, got '{}'", v)
            })?,
            None => defaults.gateway_timeout_secs,
        };
        if gateway_timeout_secs == 0 {
            anyhow::bail!("GATEWAY_TIMEOUT_SECS must be greater than zero");
        }

        let currency = var("DONATION_CURRENCY")
            .map(|c| c.to_uppercase())
            .unwrap_or(defaults.currency);
        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS").or(defaults.cors_allowed_origins);

        Ok(ConfigInfo {
            config: Config {
                server_port,
                database_url,
                database_max_connections,
                gateway_base_url,
                gateway_key_id,
                gateway_key_secret,
                gateway_timeout: Duration::from_secs(gateway_timeout_secs),
                currency,
                cors_allowed_origins,
            },
            profile,
            overrides,
        })
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
    fn test_defaults_with_database_url() {
        let info = Config::from_lookup(
            Profile::Development,
            lookup(&[("DATABASE_URL", "postgres://localhost/donations")]),
        )
        .unwrap();

        assert_eq!(info.config.server_port, 3000);
        assert_eq!(info.config.currency, "INR");
        assert_eq!(info.config.gateway_timeout, Duration::from_secs(15));
        assert!(info.config.gateway_key_secret.is_none());
        assert_eq!(info.overrides, vec!["DATABASE_URL".to_string()]);
    }

    #[test]
    fn test_missing_database_url_fails() {
        assert!(Config::from_lookup(Profile::Production, lookup(&[])).is_err());
    }

    #[test]
    fn test_overrides_applied() {
        let info = Config::from_lookup(
            Profile::Production,
            lookup(&[
                ("DATABASE_URL", "postgres://db/donations"),
                ("SERVER_PORT", "9090"),
                ("GATEWAY_KEY_ID", "rzp_live_1"),
                ("GATEWAY_KEY_SECRET", "s3cret"),
                ("GATEWAY_TIMEOUT_SECS", "3"),
                ("DONATION_CURRENCY", "inr"),
            ]),
        )
        .unwrap();

        assert_eq!(info.profile, Profile::Production);
        assert_eq!(info.config.server_port, 9090);
        assert_eq!(info.config.gateway_key_id.as_deref(), Some("rzp_live_1"));
        assert!(info.config.gateway_key_secret.is_some());
        assert_eq!(info.config.gateway_timeout, Duration::from_secs(3));
        assert_eq!(info.config.currency, "INR");
        assert!(info.overrides.contains(&"GATEWAY_KEY_SECRET".to_string()));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let result = Config::from_lookup(
            Profile::Development,
            lookup(&[("DATABASE_URL", "postgres://db"), ("SERVER_PORT", "http")]),
        );
        assert!(result.is_err());

        let result = Config::from_lookup(
            Profile::Development,
            lookup(&[("DATABASE_URL", "postgres://db"), ("GATEWAY_TIMEOUT_SECS", "0")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_secret_not_printed() {
        let info = Config::from_lookup(
            Profile::Development,
            lookup(&[("DATABASE_URL", "postgres://db"), ("GATEWAY_KEY_SECRET", "topsecret")]),
        )
        .unwrap();
        assert!(!format!("{:?}", info.config).contains("topsecret"));
    }
}
