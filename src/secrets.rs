use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};
use vaultrs::auth::approle;
use vaultrs::client::{Client, VaultClient, VaultClientSettingsBuilder};
use vaultrs::kv2;

use crate::config::Config;
use crate::services::signature::SigningSecret;

const GATEWAY_SECRET_PATH: &str = "gateway";

/// Key id and signing secret for the payment gateway account.
#[derive(Debug, Clone)]
pub struct GatewayCredentials {
    pub key_id: String,
    pub key_secret: SigningSecret,
}

impl GatewayCredentials {
    fn from_secret(secret: &HashMap<String, String>) -> Result<Self> {
        let key_id = secret
            .get("key_id")
            .filter(|v| !v.is_empty())
            .cloned()
            .context("key_id not found in Vault secret/gateway")?;
        let key_secret = secret
            .get("key_secret")
            .cloned()
            .context("key_secret not found in Vault secret/gateway")?;
        let key_secret = SigningSecret::new(key_secret)
            .map_err(|e| anyhow::anyhow!("Vault secret/gateway: {}", e))?;

        Ok(Self { key_id, key_secret })
    }
}

pub struct SecretsManager {
    client: VaultClient,
    kv_mount: String,
}

impl SecretsManager {
    pub async fn new() -> Result<Self> {
        let vault_addr =
            env::var("VAULT_ADDR").unwrap_or_else(|_| "http://127.0.0.1:8200".to_string());
        let role_id = env::var("VAULT_ROLE_ID").context("VAULT_ROLE_ID is required")?;
        let secret_id = env::var("VAULT_SECRET_ID").context("VAULT_SECRET_ID is required")?;
        let auth_mount =
            env::var("VAULT_AUTH_MOUNT").unwrap_or_else(|_| "auth/approle".to_string());
        let kv_mount = env::var("VAULT_KV_MOUNT").unwrap_or_else(|_| "secret".to_string());

        let mut client = VaultClient::new(
            VaultClientSettingsBuilder::default()
                .address(&vault_addr)
                .build()
                .context("failed to build Vault client settings")?,
        )
        .context("failed to create Vault client")?;

        let auth = approle::login(&client, &auth_mount, &role_id, &secret_id)
            .await
            .context("failed to authenticate to Vault with AppRole")?;
        client.set_token(&auth.client_token);

        Ok(Self { client, kv_mount })
    }

    pub async fn get_gateway_credentials(&self) -> Result<GatewayCredentials> {
        let secret: HashMap<String, String> =
            kv2::read(&self.client, &self.kv_mount, GATEWAY_SECRET_PATH)
                .await
                .context("failed to read secret/gateway from Vault")?;

        GatewayCredentials::from_secret(&secret)
    }
}

/// Resolves gateway credentials. Vault wins when `VAULT_ROLE_ID` is set,
/// otherwise both `GATEWAY_KEY_ID` and `GATEWAY_KEY_SECRET` must be present.
pub async fn resolve_gateway_credentials(config: &Config) -> Result<GatewayCredentials> {
    if env::var("VAULT_ROLE_ID").is_ok() {
        tracing::info!("Loading gateway credentials from Vault");
        let manager = SecretsManager::new().await?;
        return manager.get_gateway_credentials().await;
    }

    credentials_from_config(config)
}

fn credentials_from_config(config: &Config) -> Result<GatewayCredentials> {
    match (&config.gateway_key_id, &config.gateway_key_secret) {
        (Some(key_id), Some(key_secret)) => Ok(GatewayCredentials {
            key_id: key_id.clone(),
            key_secret: key_secret.clone(),
        }),
        _ => anyhow::bail!(
            "gateway credentials missing: set GATEWAY_KEY_ID and GATEWAY_KEY_SECRET or configure Vault"
        ),
    }
}
