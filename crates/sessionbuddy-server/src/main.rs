//! Session Buddy — chat front-end relaying to Gemini or Dify.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sessionbuddy_core::{AppConfig, ProviderConfig};
use sessionbuddy_server::{build_router, AppState};

const DEFAULT_PROBE_MESSAGE: &str = "こんにちは、テストです";

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn print_help() {
    println!("Session Buddy — chat front-end for Gemini / Dify");
    println!();
    println!("Usage: sessionbuddy [command]");
    println!();
    println!("Commands:");
    println!("  (none)                   Start the server");
    println!("  check                    Validate configuration and print a summary");
    println!("  probe [message]          Send one blocking chat message and print the answer");
    println!("  help                     Show this help message");
    println!();
    println!("Configuration is read from the environment (AI_PROVIDER, DIFY_*, GEMINI_*, PORT, ...)");
    println!("and from a .env file in the working directory, if present.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if matches!(args.get(1).map(String::as_str), Some("--help" | "-h" | "help")) {
        print_help();
        return Ok(());
    }

    // Config errors are fatal before anything is served.
    let loaded = sessionbuddy_core::config::load_dotenv()
        .and_then(|dotenv| AppConfig::from_env().map(|config| (config, dotenv)));
    init_tracing(loaded.as_ref().map(|(c, _)| c.server.debug).unwrap_or(false));
    let config = match loaded {
        Ok((config, dotenv)) => {
            if let Some(path) = dotenv {
                info!("Loaded environment from {}", path.display());
            }
            config
        }
        Err(e) => {
            error!("{}", e);
            return Err(e).context("invalid configuration, check the environment variables");
        }
    };

    match args.get(1).map(String::as_str) {
        None => serve(config).await,
        Some("--check" | "check") => {
            check(&config);
            Ok(())
        }
        Some("--probe" | "probe") => {
            let message = if args.len() > 2 {
                args[2..].join(" ")
            } else {
                DEFAULT_PROBE_MESSAGE.to_string()
            };
            probe(config, &message).await
        }
        Some(other) => {
            eprintln!("Unknown command: {}. Use 'sessionbuddy help' for usage.", other);
            std::process::exit(1);
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let port = config.server.port;
    let state = Arc::new(AppState::new(config));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Session Buddy listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn check(config: &AppConfig) {
    println!("Provider: {}", config.provider.name());
    match &config.provider {
        ProviderConfig::Gemini(gemini) => {
            println!("  Endpoint: {}", gemini.base_url);
            println!("  Model:    {}", gemini.model);
        }
        ProviderConfig::Dify(dify) => {
            println!("  Endpoint: {}", dify.base_url);
            println!("  User:     {}", dify.user);
        }
    }
    println!("Port:     {}", config.server.port);
    println!("Debug:    {}", config.server.debug);
    println!("Avatar:   {}", config.ui.avatar_full_name);
}

async fn probe(config: AppConfig, message: &str) -> anyhow::Result<()> {
    let state = AppState::new(config);
    info!("Probing {} with {:?}", state.provider.name(), message);

    let answer = state
        .provider
        .chat(message)
        .await
        .with_context(|| format!("{} probe failed", state.provider.name()))?;
    println!("{}", answer);
    Ok(())
}
