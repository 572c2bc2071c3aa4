use anyhow::Context;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaxbook_booking::BookingEngine;
use vaxbook_cli::{run, Shell};
use vaxbook_store::app_config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the conversation, logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vaxbook=info,vaxbook_cli=info,vaxbook_booking=info,vaxbook_store=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting vaxbook with {:?} store", config.store.backend);

    let backends = vaxbook_store::open(&config)
        .await
        .context("Failed to open booking store")?;
    let engine = Arc::new(BookingEngine::new(backends.store, backends.auth));

    let mut shell = Shell::new(engine);
    run(&mut shell, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}
