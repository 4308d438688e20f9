//! Service resolver CLI.
//!
//! Loads a resolver configuration, wires the providers it names, and runs
//! selections against them from the command line.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use service_resolver::config::{load_config, ConfigWatcher, ResolverConfig};
use service_resolver::discovery::{
    ConsulHealthProvider, DnsProvider, HealthProvider, SrvDnsProvider, StaticCatalog,
};
use service_resolver::observability::{logging, metrics};
use service_resolver::{MemoryStore, Resolver, SelectionAlgorithm};

#[derive(Parser)]
#[command(name = "service-resolver")]
#[command(about = "Select service instances from directory and DNS registrations", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more selections and print the results
    Select {
        service: String,
        /// round_robin, least_connection or weighted_round_robin
        #[arg(short, long)]
        algorithm: Option<SelectionAlgorithm>,
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Select periodically, reloading the catalog when the config file changes
    Watch {
        service: String,
        #[arg(short, long)]
        algorithm: Option<SelectionAlgorithm>,
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// List services registered in the static catalog
    Services,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResolverConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-resolver starting");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let catalog = Arc::new(StaticCatalog::new(config.catalog.services.clone()));
    let health: Arc<dyn HealthProvider> = if config.consul.enabled {
        Arc::new(ConsulHealthProvider::new(&config.consul)?)
    } else {
        catalog.clone() as Arc<dyn HealthProvider>
    };
    // Consul registrations pair with Consul's DNS interface.
    let dns: Arc<dyn DnsProvider> = if config.consul.enabled || config.dns.enabled {
        Arc::new(SrvDnsProvider::new(&config.dns)?)
    } else {
        catalog.clone() as Arc<dyn DnsProvider>
    };
    let store = Arc::new(MemoryStore::new());
    let resolver = Resolver::new(&config, health.clone(), dns, store.clone());

    tracing::info!(
        default_algorithm = %resolver.default_algorithm(),
        consul = config.consul.enabled,
        dns = config.consul.enabled || config.dns.enabled,
        catalog_services = catalog.service_names().len(),
        cache = config.cache.enabled,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Select {
            service,
            algorithm,
            count,
        } => {
            let algorithm = algorithm.unwrap_or(resolver.default_algorithm());
            let mut tally: BTreeMap<String, usize> = BTreeMap::new();

            for _ in 0..count {
                let result = resolver.select_optimal_service(&service, algorithm).await;
                println!("{}", serde_json::to_string(&result)?);
                let key = match &result.selected {
                    Some(endpoint) => endpoint.to_string(),
                    None => "<none>".to_string(),
                };
                *tally.entry(key).or_default() += 1;
            }

            if count > 1 {
                println!("\nselections over {count} calls ({algorithm}):");
                for (endpoint, hits) in &tally {
                    println!("  {endpoint:<24} {hits}");
                }
            }

            print_stored_metrics(&resolver, health.as_ref(), &service).await?;
        }
        Commands::Watch {
            service,
            algorithm,
            interval_ms,
        } => {
            let algorithm = algorithm.unwrap_or(resolver.default_algorithm());

            // The notify handle must outlive the loop for events to flow.
            let (_watch_handle, mut updates) = match &cli.config {
                Some(path) => {
                    let (watcher, rx) = ConfigWatcher::new(path);
                    (Some(watcher.run()?), Some(rx))
                }
                None => (None, None),
            };

            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let result = resolver.select_optimal_service(&service, algorithm).await;
                        println!("{}", serde_json::to_string(&result)?);
                        let purged = store.purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, "Expired store entries dropped");
                        }
                    }
                    Some(new_config) = next_update(&mut updates) => {
                        catalog.replace(new_config.catalog.services);
                        let removed = resolver.refresh().await;
                        tracing::info!(removed, "Catalog reloaded, caches cleared");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received SIGINT, stopping");
                        break;
                    }
                }
            }
        }
        Commands::Services => {
            for name in catalog.service_names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}

/// Next reloaded config, or never when no file is being watched.
async fn next_update(
    updates: &mut Option<mpsc::UnboundedReceiver<ResolverConfig>>,
) -> Option<ResolverConfig> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn print_stored_metrics(
    resolver: &Resolver,
    health: &dyn HealthProvider,
    service: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let instances = health.get_health_checks(service).await?;
    if instances.is_empty() {
        return Ok(());
    }

    println!("\nstored metrics:");
    for instance in instances {
        match resolver.get_selection_metrics(&instance.id).await {
            Some(stored) => println!("  {:<24} {}", instance.id, serde_json::to_string(&stored)?),
            None => println!("  {:<24} -", instance.id),
        }
    }
    Ok(())
}
