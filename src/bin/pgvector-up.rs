//! Start (or tear down) the local pgvector development database.
//!
//! Usage: `pgvector-up [down]`

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use brigade::bootstrap::PgVectorBootstrap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let bootstrap = PgVectorBootstrap::default();
    let tear_down = std::env::args().nth(1).as_deref() == Some("down");

    if tear_down {
        bootstrap
            .down()
            .await
            .context("failed to remove the pgvector container")?;
        println!("pgvector container removed");
    } else {
        bootstrap
            .up()
            .await
            .context("failed to start the pgvector container")?;
        println!("pgvector ready at {}", bootstrap.db_url());
    }
    Ok(())
}
