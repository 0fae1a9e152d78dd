//! pdesk - three terminal sessions around an AI coding assistant.
//!
//! Main entry point. Runs the session hub behind a line-based console.

mod console;

use anyhow::{Context, Result};
use clap::Parser;
use console::Console;
use pdesk_workspace::{
    Collaborators, Layout, LocalProject, LoginShellProbe, PackageJsonScripts, ProjectFiles,
    SessionHub, UrlPolicy,
};
use platform::{SystemBrowser, SystemClipboard};
use settings::constants::terminal::{DEFAULT_COLS, DEFAULT_ROWS};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use terminal::{NativeSpawner, ShellCommand};
use terminal_view::{Container, HeadlessFactory};
use tokio::io::BufReader;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "pdesk")]
#[command(version)]
#[command(about = "Project terminals driven by an AI coding assistant")]
struct Cli {
    /// Project folder. Defaults to the last one opened.
    project: Option<PathBuf>,

    /// Start only the main terminal.
    #[arg(long)]
    exec_only: bool,

    /// Open assistant login URLs in the browser instead of copying them.
    #[arg(long)]
    open_browser: bool,

    /// Read config.toml and last_path.txt from this directory.
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,
}

/// Create the config directory so the config template can be written.
fn init_paths() -> Result<()> {
    let dir = pdesk_paths::config_dir();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {:?}", dir))?;
    debug!("Config directory: {:?}", dir);
    Ok(())
}

fn is_debug_mode() -> bool {
    std::env::var("PDESK_DEBUG").is_ok()
}

/// Logs go to stderr; stdout carries the active terminal.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = if is_debug_mode() {
        "pdesk=trace,pdesk_workspace=trace,terminal=trace,terminal_view=trace,info"
    } else {
        "pdesk=info,warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    if is_debug_mode() {
        info!(
            "pdesk v{} starting up (DEBUG MODE ENABLED)",
            env!("CARGO_PKG_VERSION")
        );
    } else {
        info!("pdesk v{} starting up", env!("CARGO_PKG_VERSION"));
    }
}

async fn run(cli: Cli, config: settings::Config) -> Result<()> {
    let fallback = std::env::current_dir().context("Could not determine current directory")?;
    let project = LocalProject::for_user(fallback);
    if let Some(dir) = &cli.project {
        let dir = dir
            .canonicalize()
            .with_context(|| format!("Project folder {} not found", dir.display()))?;
        project.save_current_path(&dir)?;
    }

    let collaborators = Collaborators {
        spawner: Arc::new(NativeSpawner::new(ShellCommand::from_config(&config))),
        widgets: Arc::new(HeadlessFactory::new(config.scrollback_lines)),
        clipboard: Arc::new(SystemClipboard::new()),
        browser: Arc::new(SystemBrowser),
        project: Arc::new(project),
        scripts: Arc::new(PackageJsonScripts::new(PathBuf::new())),
        assistant: Arc::new(LoginShellProbe::new(config.assistant_cli.clone())),
    };

    let mut hub = SessionHub::new(collaborators, &config, tokio::runtime::Handle::current());
    if cli.open_browser {
        hub.set_url_policy(UrlPolicy::OpenAssistantInBrowser);
    }
    let layout = if cli.exec_only {
        Layout::ExecOnly
    } else {
        Layout::Tabs
    };
    hub.bootstrap(Container::for_grid(DEFAULT_COLS, DEFAULT_ROWS), layout);

    let mut console = Console::new(hub, std::io::stdout());
    let result = console
        .run(BufReader::new(tokio::io::stdin()))
        .await;
    console.into_hub().shutdown();
    result
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(dir) = cli.config_dir.clone() {
        pdesk_paths::set_config_dir(dir);
    }
    init_logging();
    init_paths()?;

    if let Some(path) = settings::ensure_config_file() {
        debug!("Config file: {:?}", path);
    }
    let config = settings::load_config();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("pdesk-worker")
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(run(cli, config));
    // Stdin reads block a worker thread until the next line.
    runtime.shutdown_timeout(Duration::from_millis(500));

    info!("pdesk shut down");
    result
}
