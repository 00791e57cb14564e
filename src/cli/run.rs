//! Run command implementation

use crate::config::Config;
use crate::engine::Engine;
use crate::store::JsonFileStore;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct RunArgs {}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let store = Arc::new(JsonFileStore::open(&config.persistence.data_dir)?);
        tracing::info!(data_dir = %config.persistence.data_dir.display(), "Opened quote store");

        let engine = Engine::start(config, store).await?;
        tracing::info!("Engine running, press Ctrl-C to stop");

        tokio::signal::ctrl_c().await?;
        engine.shutdown().await;
        Ok(())
    }
}
