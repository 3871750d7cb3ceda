#![forbid(unsafe_code)]
#![warn(clippy::dbg_macro, clippy::use_debug, clippy::todo)]

use std::{sync::Arc, time::Duration};

use exams::services::worker::{resume_pending, run_worker};
use lib::{config, redis::RedisConnection, SharedState};
use sandbox_client::SandboxClient;
use sea_orm::{ConnectOptions, Database};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    info!("Loading config");
    let config = Arc::new(config::load()?);

    info!("Connecting to database");
    let mut db_options = ConnectOptions::new(config.database.url.to_string());
    db_options.connect_timeout(Duration::from_secs(config.database.connect_timeout));
    let db = Database::connect(db_options).await?;

    info!("Connecting to redis");
    let redis = RedisConnection::new(config.redis.exams.as_str()).await?;

    let sandbox = SandboxClient::new(
        config.exams.sandbox.url.clone(),
        Duration::from_secs(config.exams.sandbox.request_timeout),
    )?;

    let state = Arc::new(SharedState {
        db: db.clone(),
        redis: redis.clone(),
    });

    info!("Resuming interrupted executions");
    let mut resume_redis = redis.clone();
    resume_pending(&db, &mut resume_redis).await?;

    run_worker(state, config, sandbox).await
}
