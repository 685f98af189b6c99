use std::net::SocketAddr;

use tokio::net::TcpListener;
use tower::make::Shared;
use tracing_subscriber::EnvFilter;

use reviewdesk::auth::jwt::JwtService;
use reviewdesk::config::AppConfig;
use reviewdesk::routes;
use reviewdesk::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "devserver",
        server_host = %config.server_host,
        server_port = config.server_port,
        public_url = %config.api_base_url,
        reviewers = config.reviewer_emails.len(),
        "loaded dev backend configuration"
    );
    let jwt = JwtService::from_config(&config)?;

    let state = AppState::new(config, jwt);
    let listen_addr: SocketAddr = {
        let config = state.config.clone();
        format!("{}:{}", config.server_host, config.server_port).parse()?
    };
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("dev backend listening on {}", listen_addr);

    axum::serve(listener, Shared::new(router)).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
