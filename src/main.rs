use std::sync::Arc;

use inbox_pilot::clock::{Clock, SystemClock};
use inbox_pilot::config::Settings;
use inbox_pilot::gateway::{GraphClient, MessageGateway, Notifier, SmtpNotifier};
use inbox_pilot::routing::{Dispatcher, RoutingDeps};
use inbox_pilot::server::{AppState, webhook_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let settings = Settings::from_env();

    let dm_delivery = if settings.graph.page_token.is_some() {
        "enabled (page token)"
    } else if settings.graph.ig_token.is_some() {
        "enabled (IG token only)"
    } else {
        "disabled — set PAGE_ACCESS_TOKEN"
    };

    eprintln!("📬 Inbox Pilot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://{}/webhook", settings.bind_addr);
    eprintln!("   Health:  http://{}/health", settings.bind_addr);
    eprintln!("   Graph API: {}", settings.graph.base_url);
    eprintln!("   Delivery: {}", dm_delivery);

    let notifier: Option<Arc<dyn Notifier>> = match &settings.email {
        Some(email) => {
            eprintln!(
                "   Escalation email: enabled (SMTP: {}, default to: {})",
                email.smtp_host, email.to_default
            );
            Some(Arc::new(SmtpNotifier::new(email.clone())))
        }
        None => {
            eprintln!("   Escalation email: disabled — set EMAIL_USERNAME/EMAIL_PASSWORD");
            None
        }
    };
    eprintln!();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gateway: Arc<dyn MessageGateway> =
        Arc::new(GraphClient::new(settings.graph.clone(), clock.clone()));

    let mut deps = RoutingDeps::with_config(&settings.routing, gateway, notifier, clock);
    deps.replies = settings.replies.clone();
    let dispatcher = Arc::new(Dispatcher::new(deps));

    let app = webhook_routes(AppState {
        dispatcher,
        verify_token: settings.verify_token.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "Webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}
