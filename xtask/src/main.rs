use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod tasks;

#[derive(Parser)]
#[command(
    name = "disk-unet",
    about = "Thin U-Net feature backbone toolkit",
    author,
    version
)]
struct Cli {
    /// Log construction and forward-pass details.
    #[arg(short, long, global = true, action)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a network and run one forward pass on random input.
    Summary(tasks::summary::SummaryArgs),
}

fn setup_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { Level::TRACE } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose)?;

    match &cli.command {
        Commands::Summary(args) => tasks::summary::run(args),
    }
}
