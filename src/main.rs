use clap::Parser;
use form_sense::cli::commands::{cmd_detect, cmd_fill};
use form_sense::cli::config::{Cli, Commands, load_config};
use form_sense::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose);
    let config = load_config(cli.config.as_deref());

    let ollama_endpoint = cli.ollama_endpoint.as_deref();
    let ollama_model = cli.ollama_model.as_deref();

    match cli.command {
        Commands::Detect {
            page,
            async_mode,
            format,
            trace,
        } => {
            cmd_detect(
                &page,
                async_mode,
                &format,
                trace.as_deref(),
                &config,
                ollama_endpoint,
                ollama_model,
            )
            .await?;
        }
        Commands::Fill { page, output } => {
            cmd_fill(&page, output.as_deref(), &config, ollama_endpoint, ollama_model).await?;
        }
    }

    Ok(())
}
