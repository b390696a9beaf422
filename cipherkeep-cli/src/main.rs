use anyhow::{anyhow, bail, Context, Result};
use cipherkeep_core::{ClientConfig, InitOutcome, Keeper, KeeperError, Session};
use clap::{Parser, Subcommand};
use rpassword::prompt_password;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CipherKeep CLI - end-to-end encrypted secret storage
#[derive(Parser)]
#[command(name = "cipherkeep")]
#[command(about = "Zero-knowledge secret store client", long_about = None)]
struct Cli {
    /// Server URL (overrides client.toml)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Path to a client config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register or join an account on this device
    Init {
        /// Account identifier (usually an email address)
        account: String,
    },

    /// Refresh the session token with a new login code
    Login,

    /// Encrypt and upload a new secret
    Add {
        /// Secret value (will prompt if not provided)
        #[arg(long)]
        value: Option<String>,

        /// Cleartext annotation as key=value, repeatable
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
    },

    /// List active secrets
    List,

    /// Decrypt and print a secret
    Show {
        /// Secret ID
        id: i64,
    },

    /// Replace a secret's value
    Update {
        /// Secret ID
        id: i64,

        /// New value (will prompt if not provided)
        #[arg(long)]
        value: Option<String>,

        /// Replace the annotation; omitted keeps the current one
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
    },

    /// Delete a secret
    Delete {
        /// Secret ID
        id: i64,
    },

    /// Pull remote changes into the local mirror
    Sync,
}

fn parse_meta(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("metadata key must not be empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

fn metadata_json(meta: Vec<(String, String)>) -> String {
    let map: serde_json::Map<String, serde_json::Value> = meta
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect();
    serde_json::Value::Object(map).to_string()
}

/// The server may echo the login code; anything else is shown to the user.
fn looks_like_code(message: &str) -> bool {
    let message = message.trim();
    message.len() == 32 && message.chars().all(|c| c.is_ascii_hexdigit())
}

fn prompt_code(message: &str) -> cipherkeep_core::Result<String> {
    if looks_like_code(message) {
        return Ok(message.trim().to_string());
    }

    println!("{}", message);
    print!("Login code: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn read_secret(value: Option<String>) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(prompt_password("Secret value: ")?),
    }
}

fn unlock(keeper: &Keeper) -> Result<Session> {
    let password = prompt_password("Master password: ")?;
    keeper.unlock(&password).map_err(describe)
}

fn describe(e: KeeperError) -> anyhow::Error {
    match e {
        KeeperError::NotInitialized => anyhow!("No account on this device. Run: cipherkeep init <account>"),
        KeeperError::WrongPassword => anyhow!("Wrong master password"),
        KeeperError::Unauthorized(msg) => {
            anyhow!("Server rejected the session ({}). Run: cipherkeep login", msg)
        }
        other => anyhow::Error::new(other),
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ClientConfig::load_or_default()?,
    };
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let keeper = Keeper::new(load_config(&cli)?)?;

    match cli.command {
        Commands::Init { account } => {
            let password = prompt_password("Master password: ")?;
            let confirm = prompt_password("Confirm master password: ")?;
            if password != confirm {
                bail!("Passwords do not match");
            }

            match keeper
                .initialize(&account, &password, prompt_code)
                .await
                .map_err(describe)?
            {
                InitOutcome::Created => println!("Created account {}", account.trim()),
                InitOutcome::Joined(report) => println!(
                    "Joined account {} ({} records synced)",
                    account.trim(),
                    report.applied
                ),
            }
        }
        Commands::Login => {
            let mut session = unlock(&keeper)?;
            session.relogin(prompt_code).await.map_err(describe)?;
            println!("Logged in as {}", session.account());
        }
        Commands::Add { value, meta } => {
            let mut session = unlock(&keeper)?;
            let secret = read_secret(value)?;
            let id = session
                .add(secret.as_bytes(), &metadata_json(meta))
                .await
                .map_err(describe)?;
            println!("Added secret {}", id);
        }
        Commands::List => {
            let mut session = unlock(&keeper)?;
            let entries = session.list().await.map_err(describe)?;
            if entries.is_empty() {
                println!("No secrets stored");
            }
            for entry in entries {
                println!("{:>6}  {}", entry.id, entry.metadata);
            }
        }
        Commands::Show { id } => {
            let mut session = unlock(&keeper)?;
            let plaintext = session.show(id).await.map_err(describe)?;
            println!("{}", String::from_utf8_lossy(&plaintext));
        }
        Commands::Update { id, value, meta } => {
            let mut session = unlock(&keeper)?;
            let secret = read_secret(value)?;
            let metadata = (!meta.is_empty()).then(|| metadata_json(meta));
            session
                .update(id, secret.as_bytes(), metadata.as_deref())
                .await
                .map_err(describe)?;
            println!("Updated secret {}", id);
        }
        Commands::Delete { id } => {
            let mut session = unlock(&keeper)?;
            session.delete(id).await.map_err(describe)?;
            println!("Deleted secret {}", id);
        }
        Commands::Sync => {
            let mut session = unlock(&keeper)?;
            let report = session.sync().await.map_err(describe)?;
            println!(
                "Synced {} records in {} batches (cursor {})",
                report.applied, report.batches, report.cursor
            );
        }
    }

    Ok(())
}
