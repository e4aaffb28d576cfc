use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use yamlens::app::App;
use yamlens::config::{Config, Theme};
use yamlens::parse;
use yamlens::sync::SyncClient;

/// Terminal YAML tree viewer with editor cursor sync.
#[derive(Parser)]
#[command(name = "yamlens", version, about)]
struct Cli {
    /// YAML file to view
    file: PathBuf,

    /// Use ASCII characters instead of Nerd Font icons
    #[arg(long)]
    no_icons: bool,

    /// Color theme
    #[arg(long, value_enum, default_value_t = Theme::Auto)]
    theme: Theme,

    /// Unix socket path for editor cursor sync
    #[arg(long)]
    sync_socket: Option<PathBuf>,
}

fn main() -> Result<()> {
    // logs go to stderr; redirect it when running inside a terminal session
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let doc = parse::parse_file(&cli.file)
        .with_context(|| format!("could not load {}", cli.file.display()))?;

    // a missing peer is not fatal: fall back to standalone mode
    let sync = cli.sync_socket.and_then(|path| match SyncClient::connect(&path) {
        Ok(client) => Some(client),
        Err(err) => {
            warn!(socket = %path.display(), %err, "cursor sync unavailable, running standalone");
            None
        }
    });

    let config = Config {
        use_icons: !cli.no_icons,
        theme: cli.theme,
    };

    let mut terminal = ratatui::init();
    let result = App::new(doc, &config, sync).run(&mut terminal);
    ratatui::restore();
    result
}
