use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::normalize::Normalizer;
use crate::store::PgWarehouse;

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,
    #[arg(long, default_value_t = 5, global = true)]
    pub max_connections: u32,
}

impl StoreArgs {
    pub async fn connect(&self) -> anyhow::Result<PgWarehouse> {
        let database_url = self
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set to the warehouse Postgres instance")?;
        PgWarehouse::connect(database_url, self.max_connections)
            .await
            .context("failed to connect to Postgres")
    }
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Folder holding transcript documents (.pdf or pre-extracted .txt)
    #[arg(long, default_value = "source")]
    pub input: PathBuf,
    /// Replaces the default conjunction list used to repair glued words
    #[arg(long = "conjunction")]
    pub conjunctions: Vec<String>,
    /// Print load statistics as JSON
    #[arg(long)]
    pub json: bool,
}

impl LoadArgs {
    pub fn normalizer(&self) -> anyhow::Result<Normalizer> {
        if self.conjunctions.is_empty() {
            return Ok(Normalizer::default());
        }
        Normalizer::new(&self.conjunctions).context("invalid conjunction list")
    }
}
