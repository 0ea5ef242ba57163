use claude_code_proxy::app;
use claude_code_proxy::error::AppError;

#[tokio::main]
async fn main() {
    let default_filter = if app::verbose_from_env() {
        "info,claude_code_proxy=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .json()
        .init();

    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let runtime = app::RuntimeConfig::from_env()?;
    let state = app::load_state(runtime)?;
    let app = app::build_app(state.clone());
    let addr: std::net::SocketAddr = state
        .runtime
        .listen
        .parse()
        .map_err(|err: std::net::AddrParseError| AppError::Config(err.to_string()))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Config(err.to_string()))?;
    tracing::info!(
        verbose = state.runtime.verbose,
        "starting claude-code-proxy, listening on {}",
        addr
    );
    axum::serve(listener, app)
        .await
        .map_err(|err| AppError::Config(err.to_string()))?;
    Ok(())
}
