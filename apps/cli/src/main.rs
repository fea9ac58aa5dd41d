//! Graphloom CLI — knowledge-graph indexing for extracted corpora.
//!
//! Turns chunked text units and raw extraction seeds into a finalized,
//! deduplicated entity/relationship graph.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
