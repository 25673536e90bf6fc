// src/main.rs

use appdb::config::Config;
use appdb::db::Database;
use appdb::repository::{self, RepositoryClient, manifest};
use appdb::sources::SourceManager;
use appdb::{Error, Result};
use clap::{Parser, Subcommand};
use tracing::info;

/// Exit code when a privileged command is refused
const EXIT_PRIVILEGE: i32 = 1;

/// Exit code for every other failure
const EXIT_FAILURE: i32 = 2;

#[derive(Parser)]
#[command(name = "appdb")]
#[command(author, version, about = "Cross-package-manager database of organization-managed apps", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that every package source is configured to match the manifest
    CheckSources,
    /// Regenerate package-source configuration from the manifest (requires root)
    UpdateSource,
    /// Rebuild the app catalog from the remote manifest
    UpdateDb,
    /// Regenerate sources, rebuild the catalog, and rescan installed apps (requires root)
    Update,
    /// Rebuild the installed-apps table by querying every package source
    UpdateInstalled,
    /// Print the location of the database file
    GetDbLocation,
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };
    if cli.verbose {
        config.verbose = true;
    }

    // Initialize tracing subscriber for logging
    let default_filter = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    if let Err(e) = run(&cli.command, &config) {
        eprintln!("{}", e);
        if matches!(e, Error::ConfigurationMismatch { .. }) {
            eprintln!("Run 'appdb update-source' as root to regenerate source configuration.");
        }
        std::process::exit(exit_code(&e));
    }
}

/// Map an error to the process exit code
fn exit_code(e: &Error) -> i32 {
    match e {
        Error::PrivilegeRequired => EXIT_PRIVILEGE,
        _ => EXIT_FAILURE,
    }
}

/// Fail unless the process runs with an effective uid of root
///
/// Commands that mutate source configuration call this before touching
/// anything, so a refusal is side-effect free.
fn require_root() -> Result<()> {
    if nix::unistd::geteuid().is_root() {
        Ok(())
    } else {
        Err(Error::PrivilegeRequired)
    }
}

fn run(command: &Commands, config: &Config) -> Result<()> {
    match command {
        Commands::CheckSources => check_sources(config),
        Commands::UpdateSource => {
            require_root()?;
            update_source(config)
        }
        Commands::UpdateDb => update_db(config),
        Commands::Update => {
            require_root()?;
            update_source(config)?;
            update_db(config)?;
            update_installed(config)
        }
        Commands::UpdateInstalled => update_installed(config),
        Commands::GetDbLocation => {
            println!("{}", config.db_path.display());
            Ok(())
        }
    }
}

/// Fetch the source manifest and verify every adapter's configuration
fn check_sources(config: &Config) -> Result<()> {
    let specs = fetch_source_specs(config)?;
    SourceManager::new().check_sources(&specs)?;
    println!("All sources are correctly configured.");
    Ok(())
}

/// Fetch the source manifest and regenerate adapter configuration
fn update_source(config: &Config) -> Result<()> {
    let specs = fetch_source_specs(config)?;
    info!("Generating source configuration");
    SourceManager::new().generate_sources(&specs)?;
    println!("Source configuration regenerated.");
    Ok(())
}

/// Fetch the app manifest and rebuild the catalog table
fn update_db(config: &Config) -> Result<()> {
    let client = RepositoryClient::new()?;
    let url = repository::manifest_url(&config.repo_url, repository::CATALOG_MANIFEST);
    let doc = client.fetch_yaml(&url)?;
    let apps = manifest::apps_from_yaml(&doc)?;

    info!("Rebuilding catalog from {} manifest entries", apps.len());
    let mut db = Database::open_writable(&config.db_path)?;
    let count = db.rebuild_catalog(&apps)?;
    println!("Catalog rebuilt: {} app(s).", count);
    Ok(())
}

/// Rescan every source and rebuild the installed-apps table
fn update_installed(config: &Config) -> Result<()> {
    let mut db = Database::open_writable(&config.db_path)?;
    let count = SourceManager::new().update_installed(&mut db)?;
    println!("Installed apps rescanned: {} row(s).", count);
    Ok(())
}

fn fetch_source_specs(config: &Config) -> Result<manifest::SourceSpecs> {
    let client = RepositoryClient::new()?;
    let url = repository::manifest_url(&config.repo_url, repository::SOURCE_MANIFEST);
    let doc = client.fetch_yaml(&url)?;
    manifest::source_specs_from_yaml(&doc)
}
