//! nbdocs CLI: publish Jupyter notebooks through a static site builder.
//!
//! Converts notebooks into Markdown pages inside the docs tree, runs the
//! site builder, strips plotly bootstrap scripts from the result, and
//! removes the generated pages again.

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
