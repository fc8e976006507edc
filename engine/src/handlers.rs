//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - chat: Drive an interactive debate session
//! - models: List models available from the configured backends
//! - bank list/show/rm: Manage saved bot templates
//! - export/import: Move the conversation and bank through backup files
//! - config show/validate: Inspect the configuration

use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::backup::Backup;
use crate::bank::BotBank;
use crate::chat::{ChatState, SharedSettings};
use crate::config::Config;
use crate::error::EngineError;
use crate::events::{Event, EventBus, EventType};
use crate::llm::{Gateway, OllamaProvider, OpenAiProvider, Provider, Role};
use crate::quota::Quota;
use crate::scheduler::ConversationEngine;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Build the generation gateway from the configured endpoints
pub fn build_gateway(config: &Config) -> Gateway {
    Gateway::new(
        OpenAiProvider::new(
            config.llm.openai.base_url.clone(),
            config.llm.openai.api_key.clone(),
        ),
        OllamaProvider::new(config.llm.ollama.base_url.clone()),
    )
}

/// Path of the persisted session file
fn session_path(config: &Config) -> PathBuf {
    config.core.data_dir.join("session.json")
}

/// Load the persisted session, falling back to a fresh conversation
fn load_session(config: &Config) -> (ChatState, BotBank) {
    let mut state = fresh_state(config);
    let mut bank = BotBank::new();

    let path = session_path(config);
    if path.exists() {
        let restored =
            Backup::read_from(&path).and_then(|backup| backup.apply(&mut state, &mut bank));
        if let Err(e) = restored {
            tracing::warn!(error = %e, "ignoring unusable session file");
        }
    }

    (state, bank)
}

/// A fresh conversation state seeded from config defaults
fn fresh_state(config: &Config) -> ChatState {
    let provider = config
        .chat
        .provider
        .parse::<Provider>()
        .unwrap_or(Provider::OpenAi);

    ChatState::new(
        crate::chat::default_bots(),
        SharedSettings {
            provider,
            model_id: config.chat.model_id.clone(),
            max_response_length: config.chat.max_response_length,
        },
        Quota::new(config.chat.initial_quota),
    )
}

/// Persist the current session snapshot
fn save_session(config: &Config, state: &ChatState, bank: &BotBank) -> Result<()> {
    let path = session_path(config);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    Backup::capture(state, bank)
        .write_to(&path)
        .context("writing session snapshot")?;
    Ok(())
}

/// Drive an interactive debate session
///
/// Reads human messages from stdin and prints every appended message as the
/// event bus reports it. Slash commands control the session:
/// `/end`, `/resume`, `/restart <message-id>`, `/quota`, `/bots`, `/quit`.
pub async fn handle_chat(topic: Option<String>, config: &Config) -> Result<()> {
    let (state, bank) = load_session(config);
    let events = Arc::new(EventBus::new());
    let gateway = Arc::new(build_gateway(config));
    let mut engine = ConversationEngine::with_state(state, gateway, Arc::clone(&events));

    // Printer task: render messages and session transitions as they happen.
    let mut rx = events.subscribe(EventType::All).await;
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                Event::MessageAppended { message } => {
                    let label = match message.role {
                        Role::User => "you".to_string(),
                        Role::System => message
                            .bot_id
                            .clone()
                            .unwrap_or_else(|| "system".to_string()),
                        Role::Assistant => message
                            .name
                            .clone()
                            .or_else(|| message.bot_id.clone())
                            .unwrap_or_else(|| "assistant".to_string()),
                    };
                    println!("[{}] {}", label, message.content);
                }
                Event::ConversationEnded => println!("-- conversation ended --"),
                Event::ConversationResumed => println!("-- conversation resumed --"),
                _ => {}
            }
        }
    });

    println!("Parley debate session. Type a message, or /help for commands.");

    if let Some(topic) = topic {
        engine.handle_user_message(&topic).await?;
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(a, b)| (a, b)) {
            ("/quit", _) => break,
            ("/help", _) => {
                println!("/end                    end the conversation");
                println!("/resume                 resume an ended conversation");
                println!("/restart <id>           rewind to a message and branch");
                println!("/model <provider> <id>  switch generation backend and model");
                println!("/reset                  start a fresh conversation");
                println!("/quota                  show the remaining quota");
                println!("/bots                   show the participants");
                println!("/quit                   save and exit");
            }
            ("/end", _) => engine.end_conversation(Some("Conversation ended by user.")).await,
            ("/resume", _) => engine.resume_conversation().await?,
            ("/restart", id) if !id.is_empty() => {
                if let Err(e) = engine.restart_from_message(id.trim()).await {
                    println!("restart failed: {}", e);
                }
            }
            ("/model", rest) => {
                let mut parts = rest.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some(provider), Some(model)) => match provider.parse::<Provider>() {
                        Ok(provider) => {
                            let mut settings = engine.state().shared_settings().clone();
                            settings.provider = provider;
                            settings.model_id = model.to_string();
                            engine.state_mut().set_shared_settings(settings);
                            println!("now using {} {}", provider, model);
                        }
                        Err(e) => println!("{}", e),
                    },
                    _ => println!("usage: /model <openai|ollama> <model-id>"),
                }
            }
            ("/reset", _) => engine.reset_chat(Vec::new()).await,
            ("/quota", _) => println!("quota remaining: {}", engine.state().remaining_quota()),
            ("/bots", _) => {
                for bot in engine.state().bots() {
                    println!(
                        "{} — {} (temperature {})",
                        bot.id, bot.name, bot.model_config.temperature
                    );
                }
            }
            _ => engine.handle_user_message(line).await?,
        }

        save_session(config, engine.state(), &bank)?;
    }

    save_session(config, engine.state(), &bank)?;
    printer.abort();
    Ok(())
}

/// List models available from the configured backends
pub async fn handle_models(
    provider: Option<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let provider = provider
        .map(|p| p.parse::<Provider>())
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;

    let gateway = build_gateway(config);
    let models = gateway.list_models(provider).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&models)?);
        }
        OutputFormat::Text => {
            if models.is_empty() {
                println!("No models available.");
            } else {
                for model in &models {
                    println!("{:<10} {}", model.provider.to_string(), model.id);
                    if let Some(description) = &model.description {
                        println!("           {}", description);
                    }
                }
                println!("{} model(s) available.", models.len());
            }
        }
    }
    Ok(())
}

/// List saved bot templates
pub fn handle_bank_list(config: &Config, format: OutputFormat) -> Result<()> {
    let (_, bank) = load_session(config);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(bank.templates())?);
        }
        OutputFormat::Text => {
            if bank.templates().is_empty() {
                println!("Bot bank is empty.");
            } else {
                for template in bank.templates() {
                    println!("{}  {}", template.uid, template.name);
                    if let Some(description) = &template.description {
                        println!("    {}", description);
                    }
                }
                println!("{} template(s) saved.", bank.templates().len());
            }
        }
    }
    Ok(())
}

/// Show a template's full configuration
pub fn handle_bank_show(uid: &str, config: &Config, format: OutputFormat) -> Result<()> {
    let (_, bank) = load_session(config);
    let template = bank
        .get(uid)
        .ok_or_else(|| EngineError::UnknownTemplate(uid.to_string()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(template)?),
        OutputFormat::Text => {
            println!("uid:         {}", template.uid);
            println!("name:        {}", template.name);
            if let Some(description) = &template.description {
                println!("description: {}", description);
            }
            println!("temperature: {}", template.model_config.temperature);
            println!("prompt:\n{}", template.system_prompt);
        }
    }
    Ok(())
}

/// Remove a template from the bank
pub fn handle_bank_rm(uid: &str, config: &Config) -> Result<()> {
    let (state, mut bank) = load_session(config);
    if !bank.remove(uid) {
        return Err(EngineError::UnknownTemplate(uid.to_string()).into());
    }
    save_session(config, &state, &bank)?;
    println!("Removed template {}.", uid);
    Ok(())
}

/// Export the session to a backup file
pub fn handle_export(path: &Path, config: &Config) -> Result<()> {
    let (state, bank) = load_session(config);
    Backup::capture(&state, &bank)
        .write_to(path)
        .with_context(|| format!("exporting to {}", path.display()))?;
    println!("Exported conversation to {}.", path.display());
    Ok(())
}

/// Import a session from a backup file
///
/// The file is parsed and validated before anything is overwritten; a
/// malformed backup leaves the current session untouched.
pub fn handle_import(path: &Path, config: &Config) -> Result<()> {
    let backup =
        Backup::read_from(path).with_context(|| format!("importing {}", path.display()))?;

    let mut state = fresh_state(config);
    let mut bank = BotBank::new();
    backup
        .apply(&mut state, &mut bank)
        .with_context(|| format!("importing {}", path.display()))?;

    save_session(config, &state, &bank)?;
    println!(
        "Imported {} message(s) and {} template(s).",
        state.messages().len(),
        bank.templates().len()
    );
    Ok(())
}

/// Show the current configuration
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => println!("{}", toml::to_string_pretty(config)?),
    }
    Ok(())
}

/// Validate a configuration file
pub fn handle_config_validate(path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let result = match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load_or_create(),
    };

    match (result, format) {
        (Ok(_), OutputFormat::Text) => {
            println!("Configuration is valid.");
            Ok(())
        }
        (Ok(_), OutputFormat::Json) => {
            println!("{}", json!({ "valid": true }));
            Ok(())
        }
        (Err(e), OutputFormat::Json) => {
            println!("{}", json!({ "valid": false, "error": e.to_string() }));
            Err(e.into())
        }
        (Err(e), OutputFormat::Text) => {
            println!("Configuration is invalid: {}", e);
            Err(e.into())
        }
    }
}
