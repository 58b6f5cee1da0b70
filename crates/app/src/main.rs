mod file_store;
mod repl;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use services::{AppServices, Clock, SessionSettings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::file_store::FileUsernameStore;

const API_BASE_ENV: &str = "TUTOR_API_BASE";
const USERNAME_ENV: &str = "TUTOR_USERNAME";
const STATE_FILE_ENV: &str = "TUTOR_STATE_FILE";
const DEFAULT_STATE_FILE: &str = ".tutor_username";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUsername { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUsername { raw } => write!(f, "invalid --user value: {raw:?}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--api <url>] [--user <name>] [--state-file <path>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --api {}", api::DEFAULT_API_BASE);
    eprintln!("  --state-file {DEFAULT_STATE_FILE}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {API_BASE_ENV}, {USERNAME_ENV}, {STATE_FILE_ENV}, RUST_LOG");
    eprintln!("  TUTOR_ADVANCE_ON_CORRECT, TUTOR_UNLOCK_STREAK, TUTOR_*_MS timing overrides");
}

struct Args {
    api_base: String,
    username: Option<String>,
    state_file: PathBuf,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let mut api_base = env(API_BASE_ENV).unwrap_or_else(|| api::DEFAULT_API_BASE.into());
        let mut username = env(USERNAME_ENV).map(|name| name.trim().to_string());
        let mut state_file = env(STATE_FILE_ENV).map_or_else(|| DEFAULT_STATE_FILE.into(), PathBuf::from);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api" => api_base = require_value(args, "--api")?,
                "--user" => {
                    let value = require_value(args, "--user")?;
                    let trimmed = value.trim();
                    if trimmed.is_empty() {
                        return Err(ArgsError::InvalidUsername { raw: value });
                    }
                    username = Some(trimmed.to_string());
                }
                "--state-file" => state_file = require_value(args, "--state-file")?.into(),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            api_base,
            username,
            state_file,
        })
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "app=info,services=info,api=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let settings = SessionSettings::from_env()?;
    let store = Arc::new(FileUsernameStore::new(&args.state_file));
    tracing::debug!(path = %store.path().display(), "username store");

    let services = AppServices::new_http(&args.api_base, store, settings, Clock::System)?;

    match &args.username {
        Some(name) => {
            services.auth().open_login();
            if let Err(err) = services.login().login_with_username(name).await {
                eprintln!("login as {name} failed: {err}");
            }
            // Counts and estimates for the lesson list.
            if let Err(err) = services.lessons().load_lessons_data().await {
                tracing::warn!(%err, "could not load lesson list");
            }
        }
        None => services.bootstrap().await,
    }

    let reactor = services.spawn_reactor();
    let result = repl::run(&services).await;
    reactor.abort();
    services.review().cancel_polling();
    services.practice().clear_advance_timer();
    result?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
