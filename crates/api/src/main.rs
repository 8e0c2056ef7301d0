use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cashnote_observability::init();

    let config = cashnote_api::config::Config::from_env();
    let app = cashnote_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind 0.0.0.0:{}", config.port))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
