mod api;
mod audit;
mod config;
mod discord;
mod dispatch;
mod error;
mod state;

use std::sync::Arc;

use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketbot_core::{
    AuditSink, BotConfig, ChannelAuditLog, ChannelId, MessagingPlatform, TicketBot, TokioClock,
};

use crate::config::ServerConfig;
use crate::discord::DiscordRest;
use crate::dispatch::EventQueue;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ticketbot_server=debug,ticketbot_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load()?;
    let policy = BotConfig::load(&config.policy_path)?;
    tracing::info!(
        "Loaded policy from {} ({} apps)",
        config.policy_path.display(),
        policy.apps.len()
    );

    let platform: Arc<dyn MessagingPlatform> =
        Arc::new(DiscordRest::connect(&config.discord.api_base, &config.discord.token).await?);

    let audit: Arc<dyn AuditSink> = match config.discord.log_channel_id {
        Some(id) => Arc::new(ChannelAuditLog::new(platform.clone(), ChannelId(id))),
        None => Arc::new(audit::TracingAudit),
    };

    let bot = TicketBot::new(&policy, platform, audit, Arc::new(TokioClock::new()));
    let bind_addr = config.bind_addr;
    let (events, _worker) = EventQueue::spawn(Arc::new(bot));

    let state = AppState {
        config: Arc::new(config),
        events,
    };

    let app = api::router()
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("ticketbot-server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
