//! Terminal front end for a single chat session

use anyhow::Context;
use clap::Parser;
use persona_chat::{logging, ChatError, Config, ConversationController, SubmitOptions};
use secrecy::SecretString;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

#[derive(Parser)]
#[command(name = "persona-chat", version, about = "Chat with a persona-driven assistant")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, default_value = "persona-chat.toml")]
    config: PathBuf,

    /// Provider API key (or the configured access passphrase)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Starting persona
    #[arg(short, long)]
    persona: Option<String>,
}

const HELP: &str = "Commands: /persona <key>, /custom <text>, /reset, /key <credential>, /tokens, /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(Some(cli.config.as_path())).context("failed to load configuration")?;
    logging::init(&config.logging);

    let mut chat = ConversationController::from_config(SecretString::new(cli.api_key), config)
        .context("failed to start session")?;
    if let Some(persona) = cli.persona.as_deref() {
        chat.set_persona(persona)?;
    }

    println!("Welcome to AI Chatbot! ({})", chat.history_path().display());
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        let outcome = match command {
            "/quit" | "/exit" => break,
            "/help" => {
                println!("{}", HELP);
                Ok(())
            }
            "/persona" => chat
                .set_persona(arg)
                .map(|_| println!("Persona: {}", chat.persona())),
            "/custom" => chat
                .set_custom_persona(arg)
                .map(|_| println!("Persona: custom")),
            "/reset" => {
                chat.reset();
                println!("Conversation reset.");
                Ok(())
            }
            "/key" => {
                chat.update_credential(SecretString::new(arg.to_string()));
                println!("Credential updated.");
                Ok(())
            }
            "/tokens" => {
                println!(
                    "{} tokens in context (budget {})",
                    chat.total_tokens(),
                    chat.config().token_budget
                );
                Ok(())
            }
            _ => chat
                .submit(line, SubmitOptions::default())
                .await
                .map(|reply| println!("AI: {}", reply)),
        };

        if let Err(e) = outcome {
            report(&e);
        }
        if let Some(warning) = chat.take_storage_warning() {
            eprintln!("(history not saved: {})", warning);
        }
    }

    Ok(())
}

fn report(err: &ChatError) {
    match err {
        ChatError::Authentication(_) => {
            eprintln!("Authentication failed. Check your API key and set a new one with /key.")
        }
        e if e.is_user_facing() => eprintln!("{}", e),
        e => {
            error!(error = %e, "Request failed");
            eprintln!("Something went wrong generating a response. Please try again.");
        }
    }
}
