//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod say;

use std::error::Error;

use clap::{Parser, Subcommand};

use crate::cli::chat::run_chat;
use crate::cli::say::run_say;
use crate::core::config::defaults::CONFIG_KEYS;
use crate::core::config::Config;
use crate::utils::url::is_http_url;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_SHA"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "streamchat")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "A terminal chat client for streaming /api/chat endpoints")]
#[command(
    long_about = "streamchat talks to an LLM chat server that accepts POST /api/chat and \
answers with either a JSON object or a stream of SSE-style data: frames. \
Responses are printed as they arrive.\n\n\
Configuration lives in config.toml under the platform config directory \
(override with STREAMCHAT_CONFIG_DIR). Set RUST_LOG=debug for diagnostics.\n\n\
Chat commands:\n\
  /refine <text>    Regenerate the last answer with an edit instruction\n\
  /retry            Regenerate the last answer unchanged\n\
  /log [file]       Enable logging to a file, or toggle it\n\
  /help             Show chat commands\n\
  /quit             Leave the chat\n\
  Ctrl+C            Cancel a response while it streams"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server base URL (overrides base-url from the config file)
    #[arg(short = 'u', long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// Chat endpoint path (overrides endpoint from the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub endpoint: Option<String>,

    /// Request a single buffered JSON response instead of a stream
    #[arg(long, global = true)]
    pub no_stream: bool,

    /// Enable logging to specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat,
    /// Send one prompt and print the answer
    Say {
        /// Prompt text; multiple words are joined with spaces
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// Set a configuration value, or print the configuration
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set (multiple words are joined with spaces)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset a configuration value
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

/// Fold command-line overrides into the loaded configuration.
pub fn apply_overrides(mut config: Config, args: &Args) -> Result<Config, String> {
    if let Some(url) = &args.url {
        config.base_url = Some(url.clone());
    }
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    if args.no_stream {
        config.stream = Some(false);
    }

    if !is_http_url(config.base_url()) {
        return Err(format!(
            "Base URL must start with http:// or https://, got '{}'",
            config.base_url()
        ));
    }
    Ok(config)
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command.as_ref().unwrap_or(&Commands::Chat) {
        Commands::Set { key: None, .. } => {
            Config::load()?.print_all();
            Ok(())
        }
        Commands::Set {
            key: Some(key),
            value,
        } => {
            let mut config = Config::load()?;
            if value.is_empty() {
                eprintln!("⚠️  Usage: streamchat set <key> <value>");
                eprintln!("Keys: {}", CONFIG_KEYS.join(", "));
                std::process::exit(1);
            }
            let value = value.join(" ");
            config.set_value(key, &value)?;
            config.save()?;
            println!("✅ Set {key} to: {value}");
            Ok(())
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            config.unset_value(key)?;
            config.save()?;
            println!("✅ Unset {key}");
            Ok(())
        }
        Commands::Say { prompt } => {
            let config = apply_overrides(Config::load()?, &args)?;
            run_say(prompt.join(" "), &config).await
        }
        Commands::Chat => {
            let config = apply_overrides(Config::load()?, &args)?;
            run_chat(&config, args.log.clone()).await
        }
    }
}
