use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::BlogApp;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::storage;

pub mod commands;

use self::commands::{
    ComposeArgs, DeleteAllArgs, DeleteArgs, DraftArgs, EditArgs, ListArgs, LoginArgs, NewArgs,
    PostRef,
};

#[derive(Parser, Debug)]
#[command(
    name = "blogdesk",
    version,
    about = "Personal blog editor with autosaved drafts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over BLOGDESK_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over BLOGDESK_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print posts, all categories by default
    List(ListArgs),
    /// Print a single post
    Show(PostRef),
    /// Enter admin mode
    Login(LoginArgs),
    /// Leave admin mode and drop every draft
    Logout,
    /// Show admin state, post counts and pending drafts
    Status,
    /// Create a post; omitted fields fall back to the category's new-post draft
    New(NewArgs),
    /// Edit a post; omitted fields fall back to its draft, then its stored text
    Edit(EditArgs),
    /// Delete one post
    Delete(DeleteArgs),
    /// Delete every post in a category
    DeleteAll(DeleteAllArgs),
    /// Inspect or discard drafts
    Draft(DraftArgs),
    /// Interactive editor with autosave
    Compose(ComposeArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let store = storage::init(&paths, &config.storage)?;

    let mut app = BlogApp::open(store, Arc::new(config)).context("opening blog")?;
    let command = cli.command.unwrap_or(Commands::List(ListArgs::default()));
    match command {
        Commands::List(args) => commands::list_posts(&app, args),
        Commands::Show(args) => commands::show_post(&app, args),
        Commands::Login(args) => commands::login(&mut app, args),
        Commands::Logout => commands::logout(&mut app),
        Commands::Status => commands::status(&app),
        Commands::New(args) => commands::new_post(&mut app, args),
        Commands::Edit(args) => commands::edit_post(&mut app, args),
        Commands::Delete(args) => commands::delete_post(&mut app, args),
        Commands::DeleteAll(args) => commands::delete_all(&mut app, args),
        Commands::Draft(args) => commands::handle_draft_command(&mut app, args),
        Commands::Compose(args) => commands::compose(&mut app, args),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
