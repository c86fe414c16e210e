//! Delivery worker: wires the ledgers, broker, transports, and pollers
//! together and runs until interrupted.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bistro_core::channels::ChannelType;
use bistro_core::types::DbId;
use bistro_delivery::channels::{
    EmailConfig, EmailTransport, PushTransport, SlackTransport, SmsTransport, SocketManager,
    WebsocketTransport,
};
use bistro_delivery::{Broker, InProcessBroker, RecipientDirectory, TransportRegistry};
use bistro_pipeline::{
    ChannelPoller, EventOutboxPoller, FanoutConsumer, NotificationOutboxPoller, PipelineConfig,
    RetentionSweeper,
};

/// Resolves recipient email addresses through a catch-all relay domain
/// (`recipient-<id>@<domain>`); the relay owns the alias-to-mailbox
/// mapping, keeping the user domain outside the pipeline.
struct RelayDirectory {
    domain: String,
}

#[async_trait]
impl RecipientDirectory for RelayDirectory {
    async fn email_address(&self, recipient_id: DbId) -> Option<String> {
        Some(format!("recipient-{recipient_id}@{}", self.domain))
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bistro_worker=debug,bistro_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = PipelineConfig::from_env();
    tracing::info!(
        fast_poll_ms = config.fast_poll_interval.as_millis() as u64,
        slow_poll_enabled = config.slow_poll_enabled,
        max_retries = config.max_retries,
        "Loaded pipeline configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = bistro_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    bistro_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    bistro_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Broker ---
    let broker = Arc::new(InProcessBroker::default());

    // --- Channel transports ---
    let sockets = Arc::new(SocketManager::new());
    let registry = Arc::new(build_registry(Arc::clone(&sockets)));
    tracing::info!(
        channels = ?registry.registered_channels(),
        "Channel transports registered"
    );

    // --- Pollers ---
    let cancel = CancellationToken::new();
    let mut handles = Vec::new();

    let fast_poller =
        EventOutboxPoller::new(pool.clone(), Arc::clone(&broker) as Arc<dyn Broker>, config.clone());
    let fast_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        fast_poller.run_fast(fast_cancel).await;
    }));

    if config.slow_poll_enabled {
        let slow_poller =
            EventOutboxPoller::new(pool.clone(), Arc::clone(&broker) as Arc<dyn Broker>, config.clone());
        let slow_cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            slow_poller.run_slow(slow_cancel).await;
        }));
    }

    let notification_poller =
        NotificationOutboxPoller::new(pool.clone(), Arc::clone(&broker) as Arc<dyn Broker>, config.clone());
    let notification_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        notification_poller.run(notification_cancel).await;
    }));

    // Fan-out consumer exits on its own when the broker is dropped.
    let fanout = FanoutConsumer::new(pool.clone());
    handles.push(tokio::spawn(fanout.run(broker.subscribe())));

    let channel_poller = ChannelPoller::new(pool.clone(), registry, config.clone());
    let channel_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        channel_poller.run(channel_cancel).await;
    }));

    if config.retention.enabled {
        let sweeper = RetentionSweeper::new(pool.clone(), config.retention.clone());
        let sweeper_cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            sweeper.run(sweeper_cancel).await;
        }));
    }

    tracing::info!("Delivery worker started");

    // --- Shutdown ---
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl-c");
    tracing::info!("Shutdown signal received");
    cancel.cancel();
    drop(broker);

    for handle in handles {
        let _ = handle.await;
    }
    tracing::info!("Delivery worker stopped");
}

/// Register every transport that is configured in the environment.
///
/// Unconfigured channels are simply absent from the registry; the channel
/// poller logs and skips them.
fn build_registry(sockets: Arc<SocketManager>) -> TransportRegistry {
    let mut registry = TransportRegistry::new();

    if let Some(sms) = SmsTransport::from_env() {
        registry.register(ChannelType::Sms, Arc::new(sms));
    }
    if let Some(push) = PushTransport::from_env() {
        registry.register(ChannelType::Push, Arc::new(push));
    }
    if let Some(slack) = SlackTransport::from_env() {
        registry.register(ChannelType::Slack, Arc::new(slack));
    }
    if let Some(email_config) = EmailConfig::from_env() {
        if let Ok(domain) = std::env::var("EMAIL_RELAY_DOMAIN") {
            let directory = Arc::new(RelayDirectory { domain });
            registry.register(
                ChannelType::Email,
                Arc::new(EmailTransport::new(email_config, directory)),
            );
        } else {
            tracing::warn!("SMTP configured but EMAIL_RELAY_DOMAIN unset, email channel disabled");
        }
    }
    registry.register(
        ChannelType::Websocket,
        Arc::new(WebsocketTransport::new(sockets)),
    );

    registry
}
