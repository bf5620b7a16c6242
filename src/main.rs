use clap::Parser;
use dayops::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the JSON result only.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dayops=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = dayops::run(cli).await.map_err(anyhow::Error::msg)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
