//! coedit terminal editor.
//!
//! Opens one page, autosaves it as you type lines on stdin, and shows live
//! updates from other editors.
//!
//! Usage:
//!   coedit notes/today
//!   coedit /editor/notes/today/ --server https://pages.example.com
//!   coedit recipes --create --no-live

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use coedit_cli::command::HELP;
use coedit_cli::{Command, Terminal, print_events};
use coedit_client::{
    ClientConfig, EditorServices, FileTokenStore, IdentityProvider, MemoryTokenStore, PageApi,
    http_api, open_editor_at,
};

/// Edit a coedit page from the terminal.
#[derive(Parser, Debug)]
#[command(name = "coedit")]
#[command(about = "Collaborative page editor for the terminal")]
struct Args {
    /// Page to edit: a name (`notes/today`) or editor path (`/editor/notes/today/`)
    page: String,

    /// Page server base URL
    #[arg(long)]
    server: Option<Url>,

    /// Config file (default: $XDG_CONFIG_HOME/coedit/client.ron)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Autosave quiet period in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Don't open the live update channel
    #[arg(long)]
    no_live: bool,

    /// Resolve the page name through the server, creating it if needed
    #[arg(long)]
    create: bool,
}

impl Args {
    fn config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ClientConfig::load_default()?,
        };
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(ms) = self.debounce_ms {
            config.debounce_ms = ms;
        }
        if self.no_live {
            config.live_updates = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    #[cfg(feature = "telemetry")]
    let _otel_guard = if coedit_telemetry::otel_enabled() {
        let (otel_layer, guard) = coedit_telemetry::otel_layer("coedit")?;
        registry.with(otel_layer).init();
        Some(guard)
    } else {
        registry.init();
        None
    };
    #[cfg(not(feature = "telemetry"))]
    registry.init();

    let args = Args::parse();
    let config = args.config()?;

    let identity = match config.identity_path() {
        Some(path) => IdentityProvider::new(FileTokenStore::new(path)),
        None => IdentityProvider::new(MemoryTokenStore::default()),
    };

    let api = http_api(&config)?;
    let path = if args.create {
        api.access_or_create(&args.page).await?
    } else {
        args.page.clone()
    };

    let terminal = Arc::new(Terminal::new());
    let services = EditorServices {
        api,
        prompt: terminal.clone(),
        notify: terminal.clone(),
        children: terminal.clone(),
    };
    let (editor, task) = open_editor_at(&config, &path, &identity, services)
        .await
        .with_context(|| format!("opening {path}"))?;
    tracing::info!(document = %editor.document(), server = %config.server_url, "editing");

    tokio::spawn(print_events(terminal.clone(), editor.subscribe()));
    terminal.say(&editor.content().await?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(line) = terminal.route_line(line) else {
            continue;
        };
        let command = Command::parse(&line);
        match command {
            Command::Quit => break,
            Command::Help => terminal.say(HELP),
            Command::Show => terminal.say(&editor.content().await?),
            _ => editor.update(move |buffer| command.apply(buffer))?,
        }
    }

    terminal.close_prompts();
    if editor.snapshot().await?.dirty {
        tracing::warn!("leaving with unsaved edits");
    }
    editor.shutdown().await?;
    task.await?;
    Ok(())
}
