//! services/api/src/bin/create_admin.rs
//!
//! Seeds an administrator account. Self-registration only ever yields agents.

use agent_metrics_core::domain::{NewAgent, Role};
use agent_metrics_core::ports::DatabaseService;
use api_lib::{
    adapters::DbAdapter,
    config::Config,
    error::ApiError,
    web::auth::{hash_password, validate_registration, RegisterRequest},
};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Create an administrator account")]
struct Args {
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let args = Args::parse();
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let request = RegisterRequest {
        email: args.email,
        password: args.password,
        name: args.name,
    };
    validate_registration(&request).map_err(ApiError::Internal)?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await?;
    let db = DbAdapter::new(pool);
    db.run_migrations().await?;

    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?;
    let admin = db
        .create_agent(NewAgent {
            email: request.email.trim().to_lowercase(),
            name: request.name.trim().to_string(),
            role: Role::Admin,
            password_hash,
        })
        .await?;

    info!("Created administrator {} <{}>", admin.id, admin.email);
    Ok(())
}
