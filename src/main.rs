use clap::Parser;

use docchat::Settings;
use docchat::cli::commands::{self, index::IndexArgs};
use docchat::cli::{Cli, Commands};
use docchat::config::DEFAULT_CONFIG_FILE;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Init must work even when the existing file does not parse
    if let Commands::Init { force } = cli.command {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());
        exit_on_error(commands::init::run_init(&path, force));
        return;
    }

    let config = match Settings::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Config => commands::init::run_config(&config),
        Commands::Index {
            docs_dir,
            no_progress,
        } => commands::index::run(
            IndexArgs {
                docs_dir,
                progress: !no_progress,
            },
            &config,
        )
        .map(|_| ()),
        Commands::Chat => commands::chat::run(&config).await,
        Commands::Ask { question } => commands::ask::run(&question.join(" "), &config).await,
        Commands::Serve { bind } => commands::serve::run(bind, &config).await,
        Commands::Logs { file, lines, json } => commands::logs::run(&config, file, lines, json),
    };

    exit_on_error(result);
}

fn exit_on_error(result: anyhow::Result<()>) {
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
