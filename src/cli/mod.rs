//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod say;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::auth::{interactive_auth, interactive_deauth};
use crate::cli::chat::run_chat;
use crate::cli::say::run_say;
use crate::core::chat_stream::GeminiTransport;
use crate::core::config::data::{Config, ConfigKey};
use crate::core::orchestrator::TurnOrchestrator;
use crate::core::tools::ToolRegistry;
use crate::utils::logging::init_tracing;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("VERGEN_GIT_DESCRIBE"),
    "\nbuilt: ",
    env!("VERGEN_BUILD_DATE"),
    "\nrustc: ",
    env!("VERGEN_RUSTC_SEMVER"),
);

#[derive(Parser)]
#[command(name = "moodchat", version, long_version = LONG_VERSION)]
#[command(about = "A terminal chat client for Gemini with streamed replies and tool calls")]
#[command(
    long_about = "Moodchat streams Gemini replies into a line-oriented terminal chat. \
The model can call a set_mood tool mid-reply; the client acknowledges the call \
and keeps streaming the rest of the answer.\n\n\
Authentication:\n\
  Use 'moodchat auth' to store a Gemini API key in your system keyring.\n\n\
Environment Variables (fallback if no key is stored):\n\
  GEMINI_API_KEY    Your Gemini API key\n\
  API_KEY           Used when GEMINI_API_KEY is unset\n\
  MOODCHAT_LOG      Log filter directives (default: warn)\n\n\
Commands inside the chat:\n\
  /help             List commands\n\
  /new, /sessions   Start or list conversations\n\
  /key              Choose a different API key\n\
  Ctrl+C            Stop the reply in progress"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Gemini model to use for chat
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Write logs to the specified file instead of stderr
    #[arg(short = 'l', long, global = true)]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a Gemini API key in the system keyring
    Auth,
    /// Remove the stored API key
    Deauth,
    /// Start the chat interface (default)
    Chat,
    /// Send a single prompt and print the reply
    Say {
        /// Prompt text (multiple words are joined with spaces)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Set configuration values, or show them when no key is given
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key (can be multiple words for system-prompt)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Auth => {
            if let Err(e) = interactive_auth() {
                eprintln!("❌ Authentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Deauth => {
            if let Err(e) = interactive_deauth() {
                eprintln!("❌ Deauthentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Chat => run_chat(args.model).await,
        Commands::Say { prompt } => run_say(prompt, args.model).await,
        Commands::Set { key, value } => {
            let Some(key) = key else {
                Config::load()?.print_all();
                return Ok(());
            };
            let key = parse_key(&key);
            if value.is_empty() {
                Config::load()?.print_all();
                return Ok(());
            }
            let value = value.join(" ");
            Config::mutate(|config| {
                config.set_value(key, &value)?;
                Ok(())
            })?;
            println!("✅ Set {key} to: {value}");
            Ok(())
        }
        Commands::Unset { key } => {
            let key = parse_key(&key);
            Config::mutate(|config| {
                config.unset_value(key);
                Ok(())
            })?;
            println!("✅ Unset {key}");
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> ConfigKey {
    match key.parse::<ConfigKey>() {
        Ok(key) => key,
        Err(_) => {
            eprintln!("❌ Unknown config key: {key}");
            let known: Vec<_> = ConfigKey::ALL.iter().map(|k| k.as_str()).collect();
            eprintln!("Known keys: {}", known.join(", "));
            std::process::exit(1);
        }
    }
}

/// Builds the orchestrator for one API key. A new key needs a new transport.
pub(crate) fn build_orchestrator(
    client: &reqwest::Client,
    config: &Config,
    model: &str,
    api_key: &str,
) -> TurnOrchestrator {
    let transport = GeminiTransport::new(
        client.clone(),
        config.effective_base_url(),
        model,
        api_key,
    );
    TurnOrchestrator::new(Arc::new(transport), ToolRegistry::new())
}
