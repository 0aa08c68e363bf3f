use clap::{Parser, Subcommand};
use confluence_qa::Result;
use confluence_qa::commands::{run_chat, run_ingest, run_serve, show_status};
use confluence_qa::config::Config;

#[derive(Parser)]
#[command(name = "confluence-qa")]
#[command(about = "A Confluence question-answering assistant with vector search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl all Confluence spaces and rebuild the vector index
    Ingest,
    /// Start the HTTP query API
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Interactive question-answering session in the terminal
    Chat,
    /// Show connectivity and index status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Credentials and endpoints come from the environment; a .env file is
    // honored when present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest => {
            let config = Config::from_env()?;
            run_ingest(&config).await?;
        }
        Commands::Serve { port } => {
            let config = Config::from_env()?;
            run_serve(&config, port).await?;
        }
        Commands::Chat => {
            let config = Config::from_env()?;
            run_chat(&config).await?;
        }
        Commands::Status => {
            let config = Config::from_env()?;
            show_status(&config).await?;
        }
    }

    Ok(())
}
