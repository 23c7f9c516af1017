use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use usdt_alerts::api::{router, ApiState};
use usdt_alerts::config::{Config, HTTP_TIMEOUT_SECS};
use usdt_alerts::db::Store;
use usdt_alerts::error::Result;
use usdt_alerts::evaluator::NotificationEvaluator;
use usdt_alerts::market::MarketDataClient;
use usdt_alerts::notify::{AlertDispatcher, TelegramSender};
use usdt_alerts::scheduler::PollingScheduler;
use usdt_alerts::subscriptions::SubscriptionRegistry;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(&cfg.db_path)
        .create_if_missing(true);
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // Single store handle constructed here and handed to every component —
    // no ambient global connection state.
    let store = Store::new(pool);
    let registry = SubscriptionRegistry::new(store.clone());
    let market = MarketDataClient::new(&cfg)?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?;
    let sender = Arc::new(TelegramSender::new(http, cfg.bot_token.clone()));
    let dispatcher = AlertDispatcher::new(sender);

    // --- Spawn the two independent loops ---
    let scheduler = PollingScheduler::new(
        Duration::from_secs(cfg.poll_interval_secs),
        cfg.spread_alert_pct,
        market.clone(),
        store.clone(),
        registry.clone(),
        dispatcher.clone(),
    );
    tokio::spawn(async move { scheduler.run().await });

    let evaluator = NotificationEvaluator::new(
        Duration::from_secs(cfg.evaluator_interval_secs),
        market,
        registry,
        dispatcher,
    );
    tokio::spawn(async move { evaluator.run().await });

    // --- HTTP API server ---
    let app = router(ApiState { store });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
