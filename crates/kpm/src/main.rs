//! Kinetrix Package Manager (kpm)

use clap::{Parser, Subcommand};

use kinetrix_pm::commands;
use kinetrix_pm::config::Config;

#[derive(Parser)]
#[command(name = "kpm")]
#[command(about = "Kinetrix package manager", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new Kinetrix package in the current directory
    Init {
        /// Package name (defaults to the directory name)
        name: Option<String>,
    },
    /// Install a package, or everything the manifest declares
    Install {
        /// Package to install, as name or name@range
        package: Option<String>,
    },
    /// List installed dependencies
    List,
    /// Search the local stdlib for packages
    Search {
        /// Substring to match against package names
        query: String,
    },
    /// Show package information
    Info {
        /// Package name
        package: String,
    },
    /// Publish this package to the registry
    Publish,
    /// Manage the package cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Print the kpm version
    Version,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove every cached package
    Clear,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("kpm v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::from_env()?;

    match cli.command {
        Commands::Init { name } => {
            let dir = std::env::current_dir()?;
            commands::init_project(&dir, name.as_deref())?;
        }
        Commands::Install { package } => {
            commands::install_package(package.as_deref(), None, &config)?;
        }
        Commands::List => commands::list_installed(None)?,
        Commands::Search { query } => commands::search_packages(&query, &config)?,
        Commands::Info { package } => commands::show_info(&package, &config)?,
        Commands::Publish => commands::publish_package(None, &config)?,
        Commands::Cache { action } => match action {
            CacheAction::Clear => commands::clear_cache(&config)?,
        },
        Commands::Version => {}
    }

    Ok(())
}
