//! Seed command implementation

use crate::bootstrap;
use crate::config::Config;
use crate::store::{JsonFileStore, QuoteStore};
use clap::Args;

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Overwrite day bounds even if instruments already exist
    #[arg(long)]
    pub force: bool,
}

impl SeedArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let store = JsonFileStore::open(&config.persistence.data_dir)?;

        let existing = store.load_instruments().await?;
        if !existing.is_empty() && !self.force {
            println!(
                "Store already holds {} instruments; use --force to reseed",
                existing.len()
            );
            return Ok(());
        }

        let seeds = bootstrap::seed_instruments();
        store.apply_flush(&seeds, &[]).await?;
        println!(
            "Seeded {} instruments into {}",
            seeds.len(),
            config.persistence.data_dir.display()
        );
        Ok(())
    }
}
