use std::sync::Arc;

use orderflow_infra::workers::OrderConsumer;
use orderflow_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    orderflow_observability::init();

    let config = AppConfig::from_env();

    // An unreachable primary store is fatal; broker trouble is not (the
    // publish path reports it per request instead).
    let services = Arc::new(orderflow_api::app::build_services(&config).await?);

    let _consumer = match OrderConsumer::spawn(
        services.queue.as_ref(),
        services.registry.clone(),
    )
    .await
    {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::error!(error = %err, "failed to start order consumer");
            None
        }
    };

    let app = orderflow_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
