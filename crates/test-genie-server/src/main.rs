//! test-genie server
//!
//! Suite orchestration, agent supervision and replay export over HTTP.

use test_genie_core::GenieConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    test_genie_server::start_server(GenieConfig::from_env()).await
}
