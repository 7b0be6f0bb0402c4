use crate::boundary::policy::CatalogPolicy;
use crate::boundary::scope::LoaderScope;
use crate::boundary::version::VersionNumber;
use crate::capture::document::{load_document, to_value};
use crate::config::settings::DriverSettings;
use crate::config::types::TaskError;
use crate::exec::driver::ExecutionDriver;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Driver settings file (defaults to ./isotask.json when present)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task document inside an isolation boundary
    Run {
        /// Task document (JSON element tree)
        document: PathBuf,
        /// Implementation to load; defaults to the document's root element name
        #[arg(long)]
        implementation: Option<String>,
        /// Exact implementation version instead of the newest one
        #[arg(long = "impl-version")]
        impl_version: Option<String>,
        /// Print the execution report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the captured configuration tree of a document
    Show {
        document: PathBuf,
    },
    /// List bundled implementations and their host requirements
    List,
}

fn load_settings(path: Option<&PathBuf>) -> Result<DriverSettings> {
    let settings = match path {
        Some(path) => DriverSettings::load_from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => DriverSettings::load_default()?,
    };
    Ok(settings)
}

/// Report an invocation failure and exit with its code
fn fail(err: &TaskError) -> ! {
    eprintln!("Error: {}", err.primary());
    if let Some(teardown) = err.teardown_cause() {
        eprintln!("Teardown also failed: {}", teardown);
    }
    std::process::exit(i32::from(err));
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = load_settings(cli.settings.as_ref())?;

    if let Err(e) = crate::observability::audit::init_audit_logger(settings.audit_log.clone()) {
        eprintln!("Failed to initialize audit logger: {}", e);
        std::process::exit(i32::from(&e));
    }

    match cli.command {
        Commands::Run {
            document,
            implementation,
            impl_version,
            json,
        } => {
            let config = load_document(&document).unwrap_or_else(|e| fail(&e));
            let name = implementation.unwrap_or_else(|| config.name().to_string());

            let catalog = Arc::new(crate::tasks::catalog()?);
            let root = LoaderScope::root("host", catalog.oldest())?;
            let driver = ExecutionDriver::new(root, &settings).unwrap_or_else(|e| fail(&e));

            let mut policy = CatalogPolicy::from_settings(Arc::clone(&catalog), name.clone(), &settings);
            if let Some(version) = impl_version {
                let version: VersionNumber = version.parse().unwrap_or_else(|e| fail(&e));
                policy = policy.version(version);
            }

            log::info!("Running {} from {}", name, document.display());
            match driver.execute(&policy, &config) {
                Ok(report) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        for message in &report.messages {
                            println!("{}", message);
                        }
                        eprintln!(
                            "{} {} completed (invocation {})",
                            report.implementation, report.version, report.invocation
                        );
                    }
                    Ok(())
                }
                Err(e) => fail(&e),
            }
        }
        Commands::Show { document } => {
            let config = load_document(&document).unwrap_or_else(|e| fail(&e));
            println!("{}", serde_json::to_string_pretty(&to_value(&config))?);
            eprintln!(
                "{} node(s), depth {}",
                config.node_count(),
                config.depth()
            );
            Ok(())
        }
        Commands::List => {
            let catalog = crate::tasks::catalog()?;
            let host = settings.host_version().unwrap_or_else(|e| fail(&e));
            println!("{:<32} {:<10} {:<16} {}", "NAME", "VERSION", "HOST", "STATUS");
            for def in catalog.definitions() {
                let status = match def.check_host(&host) {
                    Ok(()) => "ok".to_string(),
                    Err(_) => format!("needs host {}", def.host_requirement()),
                };
                println!(
                    "{:<32} {:<10} {:<16} {}",
                    def.name(),
                    def.version().to_string(),
                    def.host_requirement(),
                    status
                );
            }
            Ok(())
        }
    }
}
