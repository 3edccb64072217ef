use std::sync::Arc;
use tokio::time::timeout;

use alerthub::{
    arguments::has_arg,
    config::{self, with_config},
    database::Database,
    hydrants::HydrantBatcher,
    logger::{self, LogTag},
    notification::NotificationService,
    weather::WeatherService,
    webserver::{self, middleware, AppState},
    webserver::ws::{Hub, HubType},
};

/// Main entry point for alerthub
///
/// Startup order: logger, config, database (with retries), hubs, audit
/// wiring, background services, HTTP server. Shutdown drains the server
/// within the configured grace period, then stops the weather poller and
/// flushes the audit log.
#[tokio::main]
async fn main() {
    logger::init();

    if has_arg("--help") {
        print_help();
        return;
    }

    logger::info(LogTag::System, "🚀 alerthub starting up...");

    if let Err(e) = config::load_config() {
        logger::error(LogTag::System, &format!("Failed to load config: {}", e));
        std::process::exit(1);
    }

    let db_path = with_config(|cfg| cfg.database.path.clone());
    let db = match Database::open_with_retries(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            logger::error(LogTag::System, &format!("❌ Failed to open database: {}", e));
            std::process::exit(1);
        }
    };

    // Hubs - one per channel
    let dashboard_hub = Hub::new(HubType::Dashboard);
    let client_hub = Hub::new(HubType::ClientControl);
    let logs_hub = Hub::new(HubType::Logs);

    let notifier = NotificationService::new();
    let weather = WeatherService::new(dashboard_hub.clone(), db.clone());
    let batcher = HydrantBatcher::new(db.clone());

    let state = Arc::new(AppState {
        db,
        dashboard_hub: dashboard_hub.clone(),
        client_hub: client_hub.clone(),
        logs_hub: logs_hub.clone(),
        weather: weather.clone(),
        batcher: batcher.clone(),
        notifier,
    });

    // Message auditing on every hub
    dashboard_hub
        .set_log_message_callback(middleware::make_ws_log_callback(
            state.clone(),
            logs_hub.clone(),
            "/ws/dashboard",
        ))
        .await;
    client_hub
        .set_log_message_callback(middleware::make_ws_log_callback(
            state.clone(),
            logs_hub.clone(),
            "/ws/client",
        ))
        .await;
    logs_hub
        .set_log_message_callback(middleware::make_ws_log_callback(
            state.clone(),
            logs_hub.clone(),
            "/ws/logs",
        ))
        .await;

    weather.start();

    let mut server = tokio::spawn(webserver::start_server(state.clone()));

    // Run until interrupted or the server fails on its own
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            logger::info(LogTag::System, "Shutdown signal received");
        }
        result = &mut server => {
            match result {
                Ok(Ok(())) => logger::info(LogTag::System, "Server stopped"),
                Ok(Err(e)) => logger::error(LogTag::System, &format!("❌ Server failed: {}", e)),
                Err(e) => logger::error(LogTag::System, &format!("❌ Server task panicked: {}", e)),
            }
            weather.stop().await;
            logger::flush();
            std::process::exit(1);
        }
    }

    // Graceful shutdown with a bounded grace period
    webserver::trigger_shutdown();
    batcher.cancel();

    let grace = with_config(|cfg| cfg.server.shutdown_timeout);
    match timeout(grace, &mut server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => logger::error(LogTag::System, &format!("Server error during shutdown: {}", e)),
        Ok(Err(e)) => logger::error(LogTag::System, &format!("Server task panicked: {}", e)),
        Err(_) => {
            logger::warning(
                LogTag::System,
                "Could not shut down server gracefully within the grace period",
            );
            server.abort();
        }
    }

    weather.stop().await;
    logger::flush();
    logger::info(LogTag::System, "✅ Server gracefully stopped");
}

fn print_help() {
    println!("alerthub - real-time alert distribution service");
    println!();
    println!("USAGE:");
    println!("    alerthub [--port <port>]");
    println!();
    println!("OPTIONS:");
    println!("    --port <port>    Listen port (overrides SERVER_PORT)");
    println!("    --help           Show this help");
    println!();
    println!("Configuration comes from environment variables; see the");
    println!("SERVER_*, DB_*, API_PASSWORD, LOG_*, WEATHER_*, and EMAIL_*");
    println!("knobs in the deployment docs.");
}
