//! # PGSCTL CLI
//!
//! Command-line interface for the PostgresSync controller.
//!
//! Allows operators to trigger dumps and inspect PostgresSync resources
//! without crafting patches by hand.
//!
//! ## Usage
//!
//! ```bash
//! # Trigger a dump for a specific PostgresSync
//! pgsctl dump postgressync orders-db
//!
//! # List all PostgresSync resources
//! pgsctl list postgressync
//!
//! # Show status of a PostgresSync
//! pgsctl status postgressync orders-db --namespace default
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kube::{
    api::{Api, ListParams, Patch, PatchParams},
    Client, ResourceExt,
};
use serde_json::json;

use postgres_sync_controller::crd::PostgresSync;

/// PostgresSync Controller CLI
#[derive(Parser)]
#[command(name = "pgsctl")]
#[command(
    about = "PostgresSync Controller CLI",
    long_about = None,
    after_help = "\
Available resource types:
  postgressync (or 'pgs') - PostgresSync resource

Examples:
  pgsctl list postgressync
  pgsctl dump pgs orders-db
  pgsctl status postgressync orders-db --namespace default
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to "default")
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger a dump for a PostgresSync resource
    Dump {
        /// Resource type
        #[arg(
            value_enum,
            value_name = "RESOURCE_TYPE",
            help = "Resource type\nAvailable types:\n  postgressync (or 'pgs') - PostgresSync resource"
        )]
        resource_type: ResourceType,

        /// Name of the PostgresSync resource
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// List all PostgresSync resources
    List {
        /// Resource type
        #[arg(
            value_enum,
            value_name = "RESOURCE_TYPE",
            help = "Resource type\nAvailable types:\n  postgressync (or 'pgs') - PostgresSync resource"
        )]
        resource_type: Option<ResourceType>,
    },
    /// Show status of a PostgresSync resource
    Status {
        /// Resource type
        #[arg(
            value_enum,
            value_name = "RESOURCE_TYPE",
            help = "Resource type\nAvailable types:\n  postgressync (or 'pgs') - PostgresSync resource"
        )]
        resource_type: ResourceType,

        /// Name of the PostgresSync resource
        #[arg(value_name = "NAME")]
        name: String,
    },
}

/// Resource types supported by pgsctl
#[derive(Clone, ValueEnum)]
enum ResourceType {
    /// PostgresSync resource (short form: 'pgs')
    #[value(name = "postgressync", alias = "pgs")]
    PostgresSync,
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ needs a crypto provider installed before any TLS use
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pgsctl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    match cli.command {
        Commands::Dump {
            resource_type: ResourceType::PostgresSync,
            name,
        } => dump_command(client, name, cli.namespace).await,
        Commands::List { resource_type } => {
            resource_type.ok_or_else(|| {
                anyhow::anyhow!(
                    "Resource type is required.\n\n\
                    Available resource types:\n\
                      postgressync (or 'pgs') - PostgresSync resource\n\n\
                    Example: pgsctl list postgressync"
                )
            })?;
            list_command(client, cli.namespace).await
        }
        Commands::Status {
            resource_type: ResourceType::PostgresSync,
            name,
        } => status_command(client, name, cli.namespace).await,
    }
}

/// Set the dump trigger flag; the controller picks the change up via watch.
async fn dump_command(client: Client, name: String, namespace: Option<String>) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");
    let api: Api<PostgresSync> = Api::namespaced(client, ns);

    // Fail early with a clear message if the resource does not exist
    api.get(&name)
        .await
        .with_context(|| format!("Failed to get PostgresSync '{ns}/{name}'"))?;

    let patch = json!({ "spec": { "dumpOnWebhook": true } });
    api.patch(&name, &PatchParams::apply("pgsctl"), &Patch::Merge(patch))
        .await
        .with_context(|| format!("Failed to trigger dump for PostgresSync '{ns}/{name}'"))?;

    println!("Dump triggered for PostgresSync '{ns}/{name}'");
    println!("The controller will dump the database and push it shortly.");

    Ok(())
}

/// List PostgresSync resources with phase and last sync time.
async fn list_command(client: Client, namespace: Option<String>) -> Result<()> {
    let api: Api<PostgresSync> = if let Some(ns) = &namespace {
        Api::namespaced(client, ns)
    } else {
        Api::all(client)
    };

    let resources = api
        .list(&ListParams::default())
        .await
        .context("Failed to list PostgresSync resources")?;

    if resources.items.is_empty() {
        println!("No PostgresSync resources found");
        return Ok(());
    }

    println!(
        "{:<20} {:<40} {:<12} {:<28}",
        "NAMESPACE", "NAME", "PHASE", "LAST SYNC"
    );
    for resource in resources {
        let phase = resource
            .status
            .as_ref()
            .and_then(|s| s.phase)
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        let last_sync = resource
            .status
            .as_ref()
            .and_then(|s| s.last_sync_time.as_deref())
            .unwrap_or("-");
        println!(
            "{:<20} {:<40} {:<12} {:<28}",
            resource.namespace().unwrap_or_default(),
            resource.name_any(),
            phase,
            last_sync
        );
    }

    Ok(())
}

/// Show the full status of one PostgresSync resource.
async fn status_command(client: Client, name: String, namespace: Option<String>) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");
    let api: Api<PostgresSync> = Api::namespaced(client, ns);

    let resource = api
        .get(&name)
        .await
        .with_context(|| format!("Failed to get PostgresSync '{ns}/{name}'"))?;

    println!("PostgresSync: {ns}/{name}");
    println!("  StatefulSet:    {}", resource.spec.stateful_set_ref.name);
    println!("  Repository:     {}", resource.spec.repository_url);
    println!("  Dump path:      {}", resource.dump_dir());
    println!("  Dump on webhook: {}", resource.spec.dump_on_webhook);

    match &resource.status {
        Some(status) => {
            let phase = status
                .phase
                .map_or_else(|| "-".to_string(), |p| p.to_string());
            println!("  Phase:          {phase}");
            if let Some(message) = &status.message {
                println!("  Message:        {message}");
            }
            if let Some(last_sync) = &status.last_sync_time {
                println!("  Last sync:      {last_sync}");
            }
        }
        None => println!("  Phase:          - (not yet reconciled)"),
    }

    Ok(())
}
