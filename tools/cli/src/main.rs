//! VaultDrive CLI - keep a password-safe file in sync with Google Drive.
//!
//! Files are pulled next to a `.meta.json` sidecar holding the remote
//! version they were read at; pushes refuse to overwrite newer remote edits.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use vaultdrive_common::{Entity, Error};
use vaultdrive_storage::gdrive::{
    AuthConfig, AuthManager, GDriveConfig, GDriveProvider, RefreshCallback,
};
use vaultdrive_storage::{CloudProvider, CreateTarget, ListResponse};

#[derive(Parser)]
#[command(name = "vaultdrive")]
#[command(about = "VaultDrive - Google Drive storage for password safes")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Config file (default: <config dir>/vaultdrive/config.json).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize access to Google Drive.
    Login {
        /// OAuth client ID to use instead of the built-in one.
        #[arg(long)]
        client_id: Option<String>,

        /// OAuth client secret matching --client-id.
        #[arg(long, requires = "client_id")]
        client_secret: Option<String>,

        /// Print the authorization URL without opening a browser.
        #[arg(long)]
        no_browser: bool,
    },

    /// Search for files by name.
    Search {
        /// Text the file name must contain.
        name: String,
    },

    /// List the contents of a folder.
    List {
        /// Folder ID (default: drive root).
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Download a file and record its remote version.
    Pull {
        /// Drive file ID.
        id: String,

        /// Destination file path.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Upload a local file over its remote copy.
    Push {
        /// Drive file ID.
        id: String,

        /// Source file path.
        #[arg(short, long)]
        file: PathBuf,

        /// Overwrite even if the remote changed since the last pull.
        #[arg(long)]
        force: bool,
    },

    /// Create a new file on the drive.
    Create {
        /// Name of the new file.
        name: String,

        /// Source file path.
        #[arg(short, long)]
        file: PathBuf,

        /// Folder ID (default: drive root).
        #[arg(short, long)]
        parent: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };

    match cli.command {
        Commands::Login {
            client_id,
            client_secret,
            no_browser,
        } => cmd_login(&config_path, client_id, client_secret, no_browser).await,

        Commands::Search { name } => cmd_search(&config_path, &name).await,

        Commands::List { parent } => cmd_list(&config_path, parent.as_deref()).await,

        Commands::Pull { id, out } => cmd_pull(&config_path, &id, &out).await,

        Commands::Push { id, file, force } => cmd_push(&config_path, &id, &file, force).await,

        Commands::Create { name, file, parent } => {
            cmd_create(&config_path, &name, &file, parent.as_deref()).await
        }
    }
}

/// Build a provider whose refreshed tokens are written back to the config.
fn open_provider(config_path: &Path) -> Result<GDriveProvider> {
    let gdrive_config = config::load_config(config_path)?;

    let path = config_path.to_path_buf();
    let on_refresh: RefreshCallback = Arc::new(move |tokens_json: &str| {
        if let Err(e) = config::persist_tokens(&path, tokens_json) {
            warn!("Failed to store refreshed tokens: {:#}", e);
        }
    });

    GDriveProvider::new(gdrive_config, Some(on_refresh)).context("Failed to set up Google Drive")
}

/// Attach a retry hint to transport failures.
fn remote_error(err: Error, action: &str) -> anyhow::Error {
    if err.is_transport() {
        anyhow::Error::new(err).context(format!(
            "{} failed: could not reach Google Drive. Check your connection and try again",
            action
        ))
    } else {
        anyhow::Error::new(err).context(format!("{} failed", action))
    }
}

/// Pull the authorization code out of what the user pasted.
///
/// Accepts either the bare code or the full redirect URL. When a URL carries
/// a `state` parameter it must match `csrf_token`.
fn extract_code(input: &str, csrf_token: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        anyhow::bail!("No authorization code entered");
    }

    let Ok(url) = url::Url::parse(input) else {
        return Ok(input.to_string());
    };

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(state) = state {
        if state != csrf_token {
            anyhow::bail!("Authorization state mismatch; start the login again");
        }
    }

    code.context("Redirect URL has no 'code' parameter")
}

fn print_entities(response: &ListResponse) {
    if response.entities.is_empty() {
        println!("No files found.");
        return;
    }

    for entity in &response.entities {
        if entity.is_directory() {
            println!("  [DIR]  {}  {}/", entity.id, entity.name);
        } else {
            println!("  [FILE] {}  {}", entity.id, entity.name);
        }
    }

    if response.has_more {
        println!("More results available; narrow the search to see them.");
    }
}

/// Run the OAuth flow and store the resulting tokens.
async fn cmd_login(
    config_path: &Path,
    client_id: Option<String>,
    client_secret: Option<String>,
    no_browser: bool,
) -> Result<()> {
    let auth_config = client_id.map(|client_id| AuthConfig {
        client_id,
        client_secret: client_secret.unwrap_or_default(),
        ..AuthConfig::default()
    });

    let auth = AuthManager::new(auth_config.clone().unwrap_or_default())
        .context("Invalid OAuth configuration")?;
    let (auth_url, csrf_token) = auth.authorization_url();

    println!("Open this URL to authorize VaultDrive:\n\n  {}\n", auth_url);
    if !no_browser {
        if let Err(e) = open::that(&auth_url) {
            warn!("Could not open a browser: {}", e);
        }
    }

    println!("Paste the authorization code or the redirect URL:");
    let mut input = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read authorization code")?;
    let code = extract_code(&input, &csrf_token)?;

    let tokens = auth
        .exchange_code(&code)
        .await
        .map_err(|e| remote_error(e, "Login"))?;

    config::save_config(
        config_path,
        &GDriveConfig {
            tokens,
            auth_config,
        },
    )?;

    println!("Logged in. Credentials saved to {}", config_path.display());
    Ok(())
}

async fn cmd_search(config_path: &Path, name: &str) -> Result<()> {
    let provider = open_provider(config_path)?;
    let response = provider
        .search(name)
        .await
        .map_err(|e| remote_error(e, "Search"))?;

    print_entities(&response);
    Ok(())
}

async fn cmd_list(config_path: &Path, parent: Option<&str>) -> Result<()> {
    let provider = open_provider(config_path)?;
    let parent = parent.map(|id| Entity::directory(id, id));
    let response = provider
        .list(parent.as_ref())
        .await
        .map_err(|e| remote_error(e, "List"))?;

    print_entities(&response);
    Ok(())
}

/// Download a file and write its metadata sidecar.
async fn cmd_pull(config_path: &Path, id: &str, out: &Path) -> Result<()> {
    let provider = open_provider(config_path)?;
    let loaded = provider
        .load_entity(&Entity::file(id, id))
        .await
        .map_err(|e| remote_error(e, "Download"))?;

    std::fs::write(out, &loaded.content)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    config::write_sidecar(out, &loaded.metadata)?;

    info!("Pulled {} ({} bytes)", id, loaded.content.len());
    println!("Saved to {}", out.display());
    Ok(())
}

/// Upload a file, checking the sidecar's version against the remote.
async fn cmd_push(config_path: &Path, id: &str, file: &Path, force: bool) -> Result<()> {
    let data =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let previous = if force {
        None
    } else {
        let sidecar = config::read_sidecar(file)?;
        if sidecar.is_none() {
            warn!(
                "No metadata for {}; uploading without a version check",
                file.display()
            );
        }
        sidecar
    };

    let provider = open_provider(config_path)?;
    match provider
        .save_entity(&Entity::file(id, id), data, previous.as_ref())
        .await
    {
        Ok(metadata) => {
            config::write_sidecar(file, &metadata)?;
            println!("Uploaded {}", file.display());
            Ok(())
        }
        Err(Error::Conflict(conflict)) => {
            println!("The remote file changed since it was last pulled.");
            println!("  Local baseline: version {}", conflict.expected.version);
            println!(
                "  Remote:         version {} (modified {})",
                conflict.remote.version,
                conflict
                    .remote
                    .modified_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string())
            );
            anyhow::bail!("Upload refused; pull the remote copy and merge, or rerun with --force")
        }
        Err(e) => Err(remote_error(e, "Upload")),
    }
}

async fn cmd_create(
    config_path: &Path,
    name: &str,
    file: &Path,
    parent: Option<&str>,
) -> Result<()> {
    let data =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let provider = open_provider(config_path)?;
    let target = CreateTarget {
        name: name.to_string(),
        parent: parent.map(|id| Entity::directory(id, id)),
    };
    let source = provider
        .create_entity(&target, data)
        .await
        .map_err(|e| remote_error(e, "Create"))?;

    config::write_sidecar(file, &source.metadata)?;
    println!("Created {}", source.entity);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_bare_code() {
        assert_eq!(extract_code("  4/abc-def\n", "csrf").unwrap(), "4/abc-def");
    }

    #[test]
    fn test_extract_code_from_redirect_url() {
        let input = "http://localhost:8080/callback?state=csrf&code=4%2Fabc&scope=drive";
        assert_eq!(extract_code(input, "csrf").unwrap(), "4/abc");
    }

    #[test]
    fn test_extract_code_state_mismatch() {
        let input = "http://localhost:8080/callback?state=other&code=abc";
        assert!(extract_code(input, "csrf").is_err());
    }

    #[test]
    fn test_extract_code_missing_code() {
        let input = "http://localhost:8080/callback?state=csrf";
        assert!(extract_code(input, "csrf").is_err());
    }

    #[test]
    fn test_extract_empty_input() {
        assert!(extract_code("\n", "csrf").is_err());
    }

    #[test]
    fn test_remote_error_hint() {
        let err = remote_error(Error::Network("timeout".to_string()), "Upload");
        assert!(err.to_string().contains("try again"));

        let err = remote_error(Error::InvalidInput("bad".to_string()), "Upload");
        assert!(!err.to_string().contains("try again"));
    }
}
