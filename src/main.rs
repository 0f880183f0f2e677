mod cli;

use anyhow::Context;
use clap::Parser;
use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands, DbCommands, DonationCommands};
use temple_donations::config::{Config, ConfigInfo};
use temple_donations::db::{self, PgAuditSink, PgDonationRepository};
use temple_donations::gateway::GatewayClient;
use temple_donations::health::{GatewayChecker, HealthChecker, PostgresChecker, ReadinessState};
use temple_donations::metrics::DonationMetrics;
use temple_donations::services::DonationService;
use temple_donations::{create_app, secrets, AppState};

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config_info = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config_info).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config_info.config).await,
        Commands::Config => cli::handle_config_validate(&config_info),
        Commands::Donation(DonationCommands::Show { order_id }) => {
            cli::handle_donation_show(&config_info.config, &order_id).await
        }
    }
}

async fn serve(config_info: ConfigInfo) -> anyhow::Result<()> {
    let ConfigInfo {
        config,
        profile,
        overrides,
    } = config_info;
    tracing::info!(
        profile = profile.as_str(),
        overrides = ?overrides,
        "Configuration loaded"
    );

    let readiness = ReadinessState::new();

    let pool = db::create_pool(&config)
        .await
        .context("failed to connect to Postgres")?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let credentials = secrets::resolve_gateway_credentials(&config).await?;
    let gateway = GatewayClient::new(
        config.gateway_base_url.clone(),
        credentials.key_id.clone(),
        credentials.key_secret.expose().to_string(),
        config.gateway_timeout,
    )
    .context("failed to build gateway client")?;

    let metrics = DonationMetrics::new().context("failed to register metrics")?;

    let donations = DonationService::new(
        Arc::new(PgDonationRepository::new(pool.clone())),
        Arc::new(gateway),
        Arc::new(PgAuditSink::new(pool.clone())),
        metrics.clone(),
        credentials.key_secret,
        config.currency.clone(),
    );

    let app_state = AppState {
        donations: Arc::new(donations),
        metrics,
        health_checker: Arc::new(
            HealthChecker::new()
                .add_checker(Box::new(PostgresChecker::new(pool.clone())))
                .add_checker(Box::new(GatewayChecker::new(config.gateway_base_url.clone()))),
        ),
        readiness: readiness.clone(),
        cors_allowed_origins: config.cors_allowed_origins.clone(),
    };

    let app = create_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    readiness.set_ready(true);
    axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}
