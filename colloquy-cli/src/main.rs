//! Colloquy CLI - chat with a persona-driven, token-budgeted assistant

mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colloquy_core::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use repl::{Command, Input};

#[derive(Parser)]
#[command(name = "colloquy")]
#[command(about = "Persona-driven chat with a token-budgeted history", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        #[command(flatten)]
        session: SessionArgs,

        /// Persona to start with
        #[arg(short, long)]
        persona: Option<String>,

        /// Token budget for the retained history
        #[arg(long)]
        budget: Option<usize>,

        /// Default sampling temperature
        #[arg(long)]
        temperature: Option<f32>,

        /// Maximum tokens per reply
        #[arg(long)]
        max_tokens: Option<usize>,
    },
    /// List available personas
    Personas,
    /// Print a persisted conversation
    History {
        #[command(flatten)]
        session: SessionArgs,

        /// Print the raw JSON instead of a transcript
        #[arg(long)]
        json: bool,
    },
    /// Version information
    Version,
}

#[derive(clap::Args)]
struct SessionArgs {
    /// Configuration file (defaults to colloquy.toml and COLLOQUY_* variables)
    #[arg(short, long, env = "COLLOQUY_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// History identifier to resume or create
    #[arg(long)]
    history_id: Option<String>,
}

impl SessionArgs {
    fn load_config(&self) -> Result<ColloquyConfig> {
        let mut config = match &self.config {
            Some(path) => ColloquyConfig::from_file(path)?,
            None => ColloquyConfig::load()?,
        };
        if let Some(id) = &self.history_id {
            config.storage.history_id = Some(id.clone());
        }
        Ok(config)
    }

    fn storage(config: &ColloquyConfig) -> JsonFileStorage {
        match &config.storage.history_id {
            Some(id) => JsonFileStorage::new(&config.storage.history_dir, id),
            None => JsonFileStorage::timestamped(&config.storage.history_dir),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so transcripts on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("colloquy {}", env!("CARGO_PKG_VERSION"));
            println!("colloquy-core {}", colloquy_core::VERSION);
        }
        Commands::Personas => {
            let registry = PersonaRegistry::new();
            for persona in Persona::ALL {
                println!("{:<22} {}", persona.name(), registry.prompt(persona));
            }
        }
        Commands::History { session, json } => {
            let config = session.load_config()?;
            let id = config
                .storage
                .history_id
                .as_deref()
                .context("--history-id is required to print a conversation")?;
            let storage = JsonFileStorage::new(&config.storage.history_dir, id);
            let messages = storage
                .load()?
                .with_context(|| format!("No conversation saved under '{}'", id))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                print_transcript(&messages);
            }
        }
        Commands::Chat {
            session,
            persona,
            budget,
            temperature,
            max_tokens,
        } => {
            let mut config = session.load_config()?;
            if let Some(budget) = budget {
                config.session.token_budget = budget;
            }
            if let Some(temperature) = temperature {
                config.session.temperature = temperature;
            }
            if let Some(max_tokens) = max_tokens {
                config.session.max_output_tokens = max_tokens;
            }
            config.validate()?;

            let client = Arc::new(OpenAiClient::from_config(&config.llm)?);
            let (mut store, outcome) = ConversationStore::builder()
                .config(&config)
                .client(client)
                .storage(SessionArgs::storage(&config))
                .open()?;

            if let Some(name) = persona {
                store.set_persona(&name)?;
            }

            eprintln!(
                "Session '{}' ({:?}), persona {}. Type /help for commands.",
                store.history_id(),
                outcome,
                store.persona()
            );
            if outcome == LoadOutcome::Restored {
                print_transcript(store.history().messages());
            }

            run_repl(&mut store).await?;
        }
    }

    Ok(())
}

async fn run_repl(store: &mut ConversationStore) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let input = match repl::parse(&line) {
            Ok(input) => input,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match input {
            Input::Empty => {}
            Input::Chat(prompt) => match store.send_message(&prompt, SendOptions::new()).await {
                Ok(reply) => println!("assistant: {reply}"),
                Err(e) => println!("(no reply: {e})"),
            },
            Input::Command(Command::Quit) => break,
            Input::Command(command) => {
                if let Err(e) = apply(store, command) {
                    println!("{e}");
                }
            }
        }
    }

    Ok(())
}

fn apply(store: &mut ConversationStore, command: Command) -> colloquy_core::error::Result<()> {
    match command {
        Command::Persona(name) => {
            store.set_persona(&name)?;
            println!("Persona: {}", store.persona());
        }
        Command::Custom(text) => {
            store.set_custom_persona(&text)?;
            println!("Persona: {}", store.persona());
        }
        Command::Clear => {
            store.clear_history();
            println!("Conversation cleared.");
        }
        Command::Temperature(t) => store.set_temperature(t)?,
        Command::Budget(n) => store.set_token_budget(n)?,
        Command::MaxTokens(n) => store.set_max_output_tokens(n)?,
        Command::History => print_transcript(store.history().messages()),
        Command::Tokens => println!(
            "{} / {} tokens",
            store.total_tokens_used(),
            store.settings().token_budget
        ),
        Command::Help => println!("{}", repl::HELP),
        Command::Quit => {}
    }
    Ok(())
}

fn print_transcript(messages: &[Message]) {
    for message in messages.iter().filter(|m| !m.is_system()) {
        println!("{}: {}", message.role, message.content);
    }
}
