//! relay - ollama-relay CLI
//!
//! Exercises the pool and caches against a live Ollama server.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ollama_relay::{Config, Message, RelayContext};

/// ollama-relay CLI
#[derive(Parser)]
#[command(name = "relay")]
#[command(version = ollama_relay::PKG_VERSION)]
#[command(about = "Pooled, cached access to Ollama servers")]
struct Args {
    /// Config file (default: ~/.ollama-relay/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List models available at a host
    Models {
        /// Ollama host (default: ollama.default_host)
        host: Option<String>,
    },

    /// Check whether a host is reachable
    Ping {
        /// Ollama host
        host: Option<String>,
    },

    /// Show server version
    Version {
        /// Ollama host
        host: Option<String>,
    },

    /// Send a single chat message
    Chat {
        /// User message (or omit to read from stdin)
        message: Option<String>,
        /// Model to use
        #[arg(short, long)]
        model: String,
        /// Ollama host
        #[arg(long)]
        host: Option<String>,
    },

    /// Fetch the model list twice and print pool and cache statistics
    Stats {
        /// Ollama host
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let relay = RelayContext::new(config);

    let result = run(&relay, args.command).await;
    relay.shutdown().await;
    result
}

async fn run(relay: &RelayContext, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let resolve = |host: Option<String>| host.unwrap_or_else(|| relay.default_host().to_string());

    match command {
        Command::Models { host } => {
            let host = resolve(host);
            let models = relay.models().list_models(&host).await?;
            if models.is_empty() {
                println!("no models available at {host}");
            } else {
                for model in models {
                    println!(
                        "{} ({}, {}): {}",
                        model.name,
                        model.size_human(),
                        model.category(),
                        model.capabilities().join(", ")
                    );
                }
            }
        }

        Command::Ping { host } => {
            let host = resolve(host);
            let client = relay.pool().get_client(&host).await;
            let healthy = client.test_connection().await?;
            let status = if healthy { "reachable" } else { "unreachable" };
            println!("{host}: {status}");
        }

        Command::Version { host } => {
            let host = resolve(host);
            let client = relay.pool().get_client(&host).await;
            let version = client.version().await?;
            println!("ollama {}", version.version);
            if let Some(arch) = &version.architecture {
                println!("architecture: {arch}");
            }
            if let Some(llama) = &version.llama_cpp_version {
                println!("llama.cpp: {llama}");
            }
            if let Some(cuda) = &version.cuda_version {
                println!("cuda: {cuda}");
            }
            if let Some(commit) = &version.git_commit {
                println!("commit: {commit}");
            }
        }

        Command::Chat {
            message,
            model,
            host,
        } => {
            let host = resolve(host);
            let message = resolve_text(message, "chat")?;
            let client = relay.pool().get_client(&host).await;
            let response = client.chat(&model, &[Message::user(message)]).await?;
            println!("{}", response.content());
            if response.eval_count > 0 {
                eprintln!("[{} tokens]", response.eval_count);
            }
        }

        Command::Stats { host } => {
            let host = resolve(host);
            relay.models().list_models(&host).await?;
            relay.models().list_models(&host).await?;
            let stats = relay.stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

/// Resolve text input from CLI arg, stdin, or both.
///
/// When both are present the argument comes first, separated by a blank line.
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
