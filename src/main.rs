use std::sync::Arc;

use anyhow::Context;
use ideaboard::config::Settings;
use ideaboard::email::{LogSender, Mailer, RecipientFilter};
use ideaboard::posts::InMemoryPostService;
use ideaboard::server::{Server, forward_os_signals, listen_signals};
use ideaboard::services::{Services, Site};
use ideaboard::web::{self, AppState};
use ideaboard::worker::WorkerQueue;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Failed to start");
            1
        }
    };
    std::process::exit(code);
}

async fn run() -> anyhow::Result<i32> {
    let settings = Settings::from_env().context("Invalid configuration")?;

    eprintln!("💡 ideaboard v{}", settings.system.version);
    eprintln!("   Environment: {}", settings.system.environment);
    eprintln!("   API: http://{}/api/v1/posts", settings.server.bind_addr());
    eprintln!(
        "   Workers: {} (queue capacity {})\n",
        settings.worker.workers, settings.worker.capacity
    );

    let filter = RecipientFilter::new(&settings.email.allowlist, &settings.email.denylist)
        .context("Invalid email filter")?;
    let mailer = Mailer::new(&settings.email.noreply, filter, Arc::new(LogSender))
        .context("Invalid noreply address")?;
    let services = Services::new(
        Arc::new(InMemoryPostService::new()),
        Arc::new(mailer),
        Site {
            name: settings.server.site_name.clone(),
            base_url: settings.server.base_url.clone(),
        },
    );

    let queue = WorkerQueue::start(settings.worker.clone());
    let router = web::router(AppState::new(services, queue.clone()));

    let signals = forward_os_signals().context("Failed to register signal handlers")?;
    let server = Server::start(settings.server, settings.system, router, queue)
        .await
        .context("Failed to start server")?;

    Ok(listen_signals(signals, &server).await)
}
