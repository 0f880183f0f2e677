use clap::{Parser, Subcommand};
use temple_donations::config::ConfigInfo;
use temple_donations::config::Config;
use temple_donations::db;
use temple_donations::db::queries;

#[derive(Parser)]
#[command(name = "temple-donations")]
#[command(about = "Temple Donations - donation payments, verification and receipts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Donation inspection commands
    #[command(subcommand)]
    Donation(DonationCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum DonationCommands {
    /// Show a donation by its gateway order id
    Show {
        /// Gateway order id
        #[arg(value_name = "ORDER_ID")]
        order_id: String,
    },
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    use sqlx::migrate::Migrator;
    use std::path::Path;

    let pool = db::create_pool(config).await?;
    let migrator = Migrator::new(Path::new("./migrations")).await?;

    tracing::info!("Running database migrations...");
    migrator.run(&pool).await?;

    tracing::info!("Database migrations completed");
    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(info: &ConfigInfo) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");
    let config = &info.config;

    println!("Configuration ({} profile):", info.profile.as_str());
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Database Max Connections: {}", config.database_max_connections);
    println!("  Gateway URL: {}", config.gateway_base_url);
    println!(
        "  Gateway Key ID: {}",
        config.gateway_key_id.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Gateway Key Secret: {}",
        if config.gateway_key_secret.is_some() { "****" } else { "(not set)" }
    );
    println!("  Gateway Timeout: {}s", config.gateway_timeout.as_secs());
    println!("  Currency: {}", config.currency);
    if !info.overrides.is_empty() {
        println!("  Overridden by environment: {}", info.overrides.join(", "));
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

pub async fn handle_donation_show(config: &Config, order_id: &str) -> anyhow::Result<()> {
    let pool = db::create_pool(config).await?;

    match queries::get_donation_by_order_id(&pool, order_id).await? {
        Some(row) => {
            println!("Donation {}", row.id);
            println!("  Order ID:   {}", row.order_id);
            println!("  Entity:     {}", row.entity_id);
            println!("  User:       {}", row.user_id);
            println!("  Amount:     {}", row.amount.with_scale(2));
            println!("  Type:       {}", row.donation_type);
            println!("  Status:     {}", row.status);
            println!("  Method:     {}", row.method);
            println!(
                "  Payment ID: {}",
                row.payment_id.as_deref().unwrap_or("-")
            );
            match row.donated_at {
                Some(at) => println!("  Donated at: {}", at),
                None => println!("  Donated at: -"),
            }
            Ok(())
        }
        None => {
            tracing::warn!("Donation for order {} not found", order_id);
            anyhow::bail!("Donation for order {} not found", order_id)
        }
    }
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user_start = slash_pos + 2;
                let user = &url[user_start..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
