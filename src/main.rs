use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use dbxlink::api::WriteMode;
use dbxlink::auth::{
    FileTokenStore, HostCapabilities, KeyringTokenStore, LocationFeed, TokenStore, TOKEN_KEY,
};
use dbxlink::config::ClientConfig;
use dbxlink::security::Sanitizer;
use dbxlink::DropboxClient;

#[derive(Debug, Clone, clap::Args)]
struct GlobalArgs {
    /// Config file. Defaults to the per-user config directory
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Keep the token in the OS credential manager under this service name
    /// instead of a file next to the config
    #[arg(long, value_name = "NAME")]
    keyring: Option<String>,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[clap(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a config file for a Dropbox app
    Init {
        #[arg(long)]
        app_key: String,
        #[arg(long)]
        redirect_uri: String,
    },
    /// Sign in through the browser and store the token
    Auth {
        /// Redirect URL already carrying the token; skips the browser
        #[arg(long, value_name = "URL")]
        redirect: Option<url::Url>,
    },
    /// Show whether a token is stored
    Status,
    /// Download a file
    Download {
        /// Dropbox path, e.g. /notes.txt
        path: String,
        #[arg(long)]
        rev: Option<String>,
        /// Local destination. Defaults to the file name in the current directory
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Upload a local file
    Upload {
        local: PathBuf,
        remote: String,
        #[arg(long, value_enum, default_value_t = Mode::Add)]
        mode: Mode,
        /// Revision to replace; implies update mode
        #[arg(long, value_name = "REV")]
        update: Option<String>,
        #[arg(long)]
        autorename: bool,
        #[arg(long)]
        mute: bool,
    },
    /// Revoke the token on the server and forget it
    Revoke,
    /// Forget the token without revoking it
    Logout,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Add,
    Overwrite,
}

impl GlobalArgs {
    fn load_config(&self) -> Result<ClientConfig> {
        let config = match &self.config {
            Some(path) => ClientConfig::load_from(path),
            None => ClientConfig::load(),
        };
        config.context("Failed to load config. Run `dbxlink init` first")
    }

    fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        let store: Arc<dyn TokenStore> = match &self.keyring {
            Some(service) => {
                if !KeyringTokenStore::is_durable() {
                    tracing::warn!("No platform keyring in this build, the token will not be kept");
                }
                Arc::new(KeyringTokenStore::with_service(service.as_str())?)
            }
            None => match self.config.as_deref().and_then(Path::parent) {
                Some(dir) => Arc::new(FileTokenStore::new(dir.join(TOKEN_KEY))),
                None => Arc::new(FileTokenStore::in_config_dir()?),
            },
        };
        Ok(store)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dbxlink::init_tracing();
    let args = Args::parse();

    if let Command::Init {
        app_key,
        redirect_uri,
    } = &args.command
    {
        let config = ClientConfig::new(app_key.as_str(), redirect_uri.as_str());
        let path = match &args.global.config {
            Some(path) => {
                config.save_to(path)?;
                path.clone()
            }
            None => config.save()?,
        };
        println!("Config written to {}", path.display());
        return Ok(());
    }

    let feed = LocationFeed::new();
    let client = DropboxClient::new(
        args.global.load_config()?,
        args.global.token_store()?,
        HostCapabilities::new(feed.clone()),
    )?;

    match args.command {
        Command::Init { .. } => {}
        Command::Auth { redirect: Some(location) } => {
            if client.capture_redirect(&location).await?.is_none() {
                bail!("No access token in {}", Sanitizer::sanitize_url(location.as_str()));
            }
            println!("Signed in");
        }
        Command::Auth { redirect: None } => authenticate(&client, feed).await?,
        Command::Status => match client.token().await? {
            Some(token) => println!("Signed in ({})", Sanitizer::sanitize_token(token.as_str())),
            None => println!("Not signed in"),
        },
        Command::Download { path, rev, output } => {
            let blob = client.files_download(&path, rev.as_deref()).await?;
            let output = match output {
                Some(output) => output,
                None => default_output(&path)?,
            };
            tokio::fs::write(&output, &blob.data)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Saved {} bytes to {}", blob.data.len(), output.display());
        }
        Command::Upload {
            local,
            remote,
            mode,
            update,
            autorename,
            mute,
        } => {
            let file = tokio::fs::read(&local)
                .await
                .with_context(|| format!("Failed to read {}", local.display()))?;
            let modified = tokio::fs::metadata(&local)
                .await?
                .modified()
                .ok()
                .map(DateTime::<Utc>::from);
            let mode = match (update, mode) {
                (Some(rev), _) => WriteMode::Update { update: rev },
                (None, Mode::Add) => WriteMode::Add,
                (None, Mode::Overwrite) => WriteMode::Overwrite,
            };

            let metadata = client
                .files_upload(file, &remote, mode, autorename, modified, mute)
                .await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Command::Revoke => {
            client.revoke_token().await?;
            println!("Token revoked");
        }
        Command::Logout => {
            client.logout().await?;
            println!("Signed out");
        }
    }

    Ok(())
}

/// Runs the flow while forwarding pasted redirect URLs into the location feed
async fn authenticate(client: &DropboxClient, feed: LocationFeed) -> Result<()> {
    println!("A browser window will open. After approving access, paste the URL you were redirected to:");

    // tokio stdin would block runtime shutdown
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(|line| line.ok()) {
            if line.trim().is_empty() {
                continue;
            }
            if let Err(e) = feed.publish_str(&line) {
                tracing::warn!("Ignoring input: {}", e);
            }
        }
    });

    let result = tokio::select! {
        result = client.authenticate() => result.map(|_| ()).map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("Authentication cancelled")),
    };

    result?;
    println!("Signed in");
    Ok(())
}

fn default_output(path: &str) -> Result<PathBuf> {
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => Ok(PathBuf::from(name)),
        _ => bail!("Cannot derive a file name from {}, use --output", path),
    }
}
