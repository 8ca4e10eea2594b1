//! plantd CLI: talk to a running plantd-proxy server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use plantd_proxy::client::{DEFAULT_URL, ProxyClient, URL_ENV};
use plantd_proxy::kind::ResourceKind;
use plantd_proxy::resource::{ResourceManifest, ResourceSelector};

#[derive(Parser)]
#[command(name = "plantd", version, about = "PlantD control-plane proxy client")]
struct Cli {
    /// Base URL of the plantd-proxy server.
    #[arg(long, global = true, env = URL_ENV, default_value = DEFAULT_URL)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List known resource kinds and their aliases.
    Kinds,

    /// Check that the server is up.
    Health,

    /// Print one resource body as JSON.
    Get {
        /// Resource as kind/namespace/name.
        resource: ResourceSelector,
    },

    /// List resources of a kind.
    List {
        kind: String,
        /// Restrict to one namespace.
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Create a resource from a YAML manifest.
    Create {
        #[arg(long, short)]
        file: PathBuf,
    },

    /// Replace a resource body from a YAML manifest.
    Update {
        #[arg(long, short)]
        file: PathBuf,
    },

    /// Delete a resource.
    Delete {
        /// Resource as kind/namespace/name.
        resource: ResourceSelector,
    },

    /// Export resources to an archive.
    Export {
        /// Resources as kind/namespace/name, exported in the order given.
        #[arg(required = true)]
        resources: Vec<ResourceSelector>,

        /// Output file. Defaults to the server-suggested filename.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Import every manifest in an archive.
    Import {
        #[arg(long, short)]
        file: PathBuf,
    },
}

fn read_manifest(path: &PathBuf) -> Result<ResourceManifest> {
    let text = std::fs::read_to_string(path).into_diagnostic()?;
    Ok(ResourceManifest::from_yaml(&text)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = ProxyClient::new(&cli.server);

    match cli.command {
        Commands::Kinds => {
            for kind in ResourceKind::ALL {
                let rules = kind.rules();
                let ops: Vec<String> = rules.operations.iter().map(|op| op.to_string()).collect();
                println!(
                    "{:<14} aliases: {}, {:<16} ops: {}",
                    kind.as_str(),
                    rules.crd_kind,
                    rules.plural,
                    ops.join(",")
                );
            }
        }

        Commands::Health => {
            println!("{}", client.health()?);
        }

        Commands::Get { resource } => {
            let reference = resource.resolve()?;
            print_json(&client.get(&reference)?)?;
        }

        Commands::List { kind, namespace } => {
            let items = client.list(&kind, namespace.as_deref())?;
            for item in &items {
                println!("{}", item.reference());
            }
            println!("{} resource(s)", items.len());
        }

        Commands::Create { file } => {
            let manifest = read_manifest(&file)?;
            let reference = manifest.reference();
            client.create(&reference, &manifest.body)?;
            println!("created {reference}");
        }

        Commands::Update { file } => {
            let manifest = read_manifest(&file)?;
            let reference = manifest.reference();
            client.update(&reference, &manifest.body)?;
            println!("updated {reference}");
        }

        Commands::Delete { resource } => {
            let reference = resource.resolve()?;
            client.delete(&reference)?;
            println!("deleted {reference}");
        }

        Commands::Export { resources, output } => {
            let archive = client.export(&resources)?;
            let path = output
                .or_else(|| archive.filename.clone().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("export.tar.gz"));
            std::fs::write(&path, &archive.bytes).into_diagnostic()?;
            println!(
                "wrote {} resource(s) to {} ({} bytes)",
                resources.len(),
                path.display(),
                archive.bytes.len()
            );
        }

        Commands::Import { file } => {
            let bytes = std::fs::read(&file).into_diagnostic()?;
            let stats = client.import(&bytes)?;
            println!(
                "imported {}/{} resource(s), {} failed",
                stats.succeeded, stats.total, stats.failed
            );
            for failure in &stats.failures {
                match &failure.resource {
                    Some(r) => println!("  {} ({r}): {}: {}", failure.entry, failure.reason, failure.message),
                    None => println!("  {}: {}: {}", failure.entry, failure.reason, failure.message),
                }
            }
        }
    }

    Ok(())
}
