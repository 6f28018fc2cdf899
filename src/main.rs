use pr_reviewer_service::config::Config;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .filter_module("sqlx", log::LevelFilter::Warn)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("[app] Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("[app] Failed to listen for Ctrl-C: {}", e);
            return;
        }
        log::info!("[app] Ctrl-C received, shutting down");
        signal_token.cancel();
    });

    if let Err(e) = pr_reviewer_service::run(config, shutdown).await {
        log::error!("[app] {}", e);
        std::process::exit(1);
    }
}
