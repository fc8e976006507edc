// Parley Debate Engine
// Main entry point for the parley binary

use clap::Parser;
use parley_engine::cli::{BankAction, Cli, Command, ConfigAction};
use parley_engine::config::Config;
use parley_engine::handlers::{
    handle_bank_list, handle_bank_rm, handle_bank_show, handle_chat, handle_config_show,
    handle_config_validate, handle_export, handle_import, handle_models, OutputFormat,
};
use parley_engine::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Config validation reports load errors itself instead of failing early.
    if let Command::Config {
        action: ConfigAction::Validate,
    } = &cli.command
    {
        telemetry::init(cli.log.as_deref(), "info");
        return handle_config_validate(cli.config.as_deref(), format);
    }

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    telemetry::init(cli.log.as_deref(), &config.core.log_level);
    tracing::debug!("Parley v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Chat { topic } => {
            tracing::info!("Starting debate session");
            handle_chat(topic, &config).await
        }

        Command::Models { provider } => handle_models(provider, &config, format).await,

        Command::Bank { action } => match action {
            BankAction::List => handle_bank_list(&config, format),
            BankAction::Show { uid } => handle_bank_show(&uid, &config, format),
            BankAction::Rm { uid } => handle_bank_rm(&uid, &config),
        },

        Command::Export { path } => handle_export(&path, &config),

        Command::Import { path } => handle_import(&path, &config),

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Validate => handle_config_validate(cli.config.as_deref(), format),
        },
    }
}
