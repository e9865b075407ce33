use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use farmstand::auth::{AuthContext, SessionPoller};
use farmstand::config::{AuthConfig, ConfigError};
use farmstand::error::AuthError;
use farmstand::net::api::ApiClient;
use farmstand::net::types::User;
use farmstand::state::auth::{AuthPhase, AuthState};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{}", .0.message())]
    Auth(#[from] AuthError),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "farmstand", about = "Farmstand marketplace session CLI")]
struct Cli {
    /// Server base URL; overrides FARMSTAND_API_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Existing session token; overrides FARMSTAND_SESSION_TOKEN.
    #[arg(long)]
    session_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the current session.
    Session,
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long, env = "FARMSTAND_PASSWORD", hide_env_values = true)]
        password: String,
    },
    SignUp {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "FARMSTAND_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        zip: String,
    },
    SignOut,
    /// Poll the session and print every change until Ctrl-C.
    Watch {
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[derive(Serialize)]
struct Report<'a> {
    phase: AuthPhase,
    authenticated: bool,
    user: Option<&'a User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = AuthConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url)?;
    }
    if let Some(token) = cli.session_token {
        config.session_token = Some(token);
    }

    let api = Arc::new(ApiClient::new(&config)?);
    let ctx = AuthContext::with_confirmation(api.clone(), config.confirmation);

    match cli.command {
        Command::Session => {
            let state = ctx.initialize().await;
            print_report(&state, None)
        }
        Command::SignIn { email, password } => {
            ctx.sign_in(&email, &password).await?;
            print_report(&ctx.snapshot(), api.session_token())
        }
        Command::SignUp { name, email, password, zip } => {
            ctx.sign_up(&name, &email, &password, &zip).await?;
            print_report(&ctx.snapshot(), api.session_token())
        }
        Command::SignOut => {
            ctx.sign_out().await;
            print_report(&ctx.snapshot(), None)
        }
        Command::Watch { interval_secs } => {
            let interval = interval_secs.map_or(config.poll_interval, Duration::from_secs);
            run_watch(&ctx, interval).await
        }
    }
}

async fn run_watch(ctx: &AuthContext, interval: Duration) -> Result<(), CliError> {
    let mut rx = ctx.subscribe();
    let _poller = SessionPoller::spawn(ctx, interval);
    let mut last_phase = None;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = rx.borrow_and_update().clone();
                // Loading flips on every poll; only report phase or user changes.
                let key = (state.phase(), state.user().cloned());
                if last_phase.as_ref() != Some(&key) && state.phase() != AuthPhase::Checking {
                    print_report(&state, None)?;
                    last_phase = Some(key);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                return Ok(());
            }
        }
    }
}

fn print_report(state: &AuthState, session_token: Option<String>) -> Result<(), CliError> {
    let report = Report {
        phase: state.phase(),
        authenticated: state.is_authenticated(),
        user: state.user(),
        session_token,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
