use anyhow::{Context, Result};
use bcryptkit::{Bcrypt, Completion, Config};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
mod auth;

#[derive(Debug, Parser)]
#[command(name = "bcryptkit")]
#[command(version, about = "Generate, check and inspect bcrypt password hashes.")]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true, value_name = "PATH", env = "BCRYPTKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Run on the calling thread instead of the worker pool
    #[arg(long, global = true, default_value_t = false)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generates a new salt
    Salt {
        /// Cost factor (default from config, else 10)
        #[arg(long)]
        rounds: Option<u32>,

        /// Minor revision, "a" or "b" (default "b")
        #[arg(long)]
        minor: Option<String>,
    },

    /// Hashes a password
    Hash {
        /// Cost factor for a freshly generated salt
        #[arg(long, conflicts_with = "salt")]
        rounds: Option<u32>,

        /// Use this salt instead of generating one
        #[arg(long)]
        salt: Option<String>,
    },

    /// Checks a password against a hash; exits with 1 on mismatch
    #[command(arg_required_else_help = true)]
    Compare { hash: String },

    /// Prints the cost factor of a salt or hash
    #[command(arg_required_else_help = true)]
    Rounds { hash: String },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Output {
    Salt { salt: String },
    Hash { hash: String },
    Compare { matched: bool },
    Rounds { rounds: u32 },
}

impl Output {
    fn render(&self, json: bool) -> Result<String> {
        if json {
            return Ok(serde_json::to_string(self)?);
        }
        Ok(match self {
            Output::Salt { salt } => salt.clone(),
            Output::Hash { hash } => hash.clone(),
            Output::Compare { matched } => matched.to_string(),
            Output::Rounds { rounds } => rounds.to_string(),
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "bcryptkit").map(|dirs| dirs.config_dir().join("config.json"))
}

fn resolve_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(p) => p,
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(Config::default()),
        },
    };

    debug!(path = %path.display(), "loading config");
    Config::load(&path).with_context(|| format!("failed to load config {}", path.display()))
}

fn optional<T: Into<Value>>(v: Option<T>) -> Value {
    v.map_or(Value::Null, Into::into)
}

async fn settle<T>(completion: Completion<T>) -> Result<T> {
    let deferred = completion
        .into_deferred()
        .context("call was handed to a callback instead of returning a result")?;
    Ok(deferred.await?)
}

async fn execute(bcrypt: &Bcrypt, command: Commands, sync: bool) -> Result<Output> {
    let output = match command {
        Commands::Salt { rounds, minor } => {
            let (rounds, minor) = (optional(rounds), optional(minor));
            let salt = if sync {
                bcrypt.gen_salt_sync(rounds, minor)?
            } else {
                settle(bcrypt.gen_salt(rounds, minor, ())).await?
            };
            Output::Salt { salt }
        }
        Commands::Hash { rounds, salt } => {
            let password = auth::read_password()?;
            let salt = match salt {
                Some(salt) => Value::from(salt),
                None => Value::from(rounds.unwrap_or(bcrypt.config().rounds())),
            };
            let data = Value::from(password.as_str());
            let hash = if sync {
                bcrypt.hash_sync(data, salt)?
            } else {
                settle(bcrypt.hash(data, salt, ())).await?
            };
            Output::Hash { hash }
        }
        Commands::Compare { hash } => {
            let password = auth::read_password()?;
            let data = Value::from(password.as_str());
            let matched = if sync {
                bcrypt.compare_sync(data, hash)?
            } else {
                settle(bcrypt.compare(data, hash, ())).await?
            };
            Output::Compare { matched }
        }
        Commands::Rounds { hash } => Output::Rounds {
            rounds: bcrypt.get_rounds(hash)?,
        },
    };
    Ok(output)
}

fn run(args: Cli) -> Result<ExitCode> {
    let config = resolve_config(args.config.clone())?;
    let bcrypt = Bcrypt::builder().config(config).build();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let output = runtime.block_on(execute(&bcrypt, args.command, args.sync))?;

    println!("{}", output.render(args.json)?);

    match output {
        Output::Compare { matched: false } => Ok(ExitCode::from(1)),
        _ => Ok(ExitCode::SUCCESS),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
