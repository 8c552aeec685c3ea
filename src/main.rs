//! msgsec: inspect and serve a message-security configuration.
//!
//! ```text
//! msgsec check                 parse the file, print the installed snapshot
//! msgsec resolve <layer> ...   print the entry a request would resolve to
//! msgsec watch                 install, then hot-reload on file change or SIGHUP
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use msgsec_registry::config::watcher::ConfigWatcher;
use msgsec_registry::config::{load_config, MessageSecurityParser, MsgsecConfig};
use msgsec_registry::lifecycle::{Control, SignalEvent, Signals};
use msgsec_registry::model::{AuthSource, MessagePolicy, Role};
use msgsec_registry::observability::{logging, metrics};
use msgsec_registry::registry::{InMemoryAuthority, Registry};

#[derive(Parser)]
#[command(name = "msgsec", version, about = "Message-security module configuration registry")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "msgsec.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and install the configuration, then print the snapshot
    Check,
    /// Resolve the module entry for a layer
    Resolve {
        layer: String,
        /// Requested provider id
        #[arg(long)]
        provider_id: Option<String>,
        #[arg(long, default_value = "server")]
        role: Role,
        /// Caller-supplied request policy source
        #[arg(long)]
        request_source: Option<AuthSource>,
        /// Caller-supplied response policy source
        #[arg(long)]
        response_source: Option<AuthSource>,
    },
    /// Install the configuration and reload it on change
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability.log_level);

    match cli.command {
        Command::Check => {
            let registry = build_registry(&config);
            let snapshot = registry.install(&config.message_security)?;
            println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        }
        Command::Resolve {
            layer,
            provider_id,
            role,
            request_source,
            response_source,
        } => {
            let registry = build_registry(&config);
            registry.install(&config.message_security)?;

            let request = request_source.map(MessagePolicy::mandatory);
            let response = response_source.map(MessagePolicy::mandatory);
            let entry = registry.resolve(
                &layer,
                provider_id.as_deref(),
                request.as_ref(),
                response.as_ref(),
                role,
            );
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Command::Watch => watch(&cli.config, config).await?,
    }
    Ok(())
}

fn build_registry(config: &MsgsecConfig) -> Registry {
    Registry::new(
        Arc::new(MessageSecurityParser::from_env()),
        config.registry.provider_name.clone(),
    )
}

async fn watch(path: &Path, config: MsgsecConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let authority = Arc::new(InMemoryAuthority::new());
    let registry = build_registry(&config).with_authority(authority.clone());
    registry.initialize_once(&config.message_security)?;

    let (watcher, mut updates) = ConfigWatcher::new(
        path,
        Duration::from_secs(config.registry.watch_poll_secs),
    );
    let _watcher = watcher.run()?;

    let control = Arc::new(Control::new());
    let mut control_rx = control.subscribe();
    let _signals = Arc::clone(&control).forward(Signals::install()?);

    tracing::info!(
        path = ?path,
        generation = registry.generation(),
        routed_layers = ?authority.routed_layers(),
        "Watching configuration"
    );

    loop {
        tokio::select! {
            Some(update) = updates.recv() => apply(&registry, &update),
            event = control_rx.recv() => match event {
                Ok(SignalEvent::Reload) => {
                    tracing::info!("Reload requested by signal");
                    match load_config(path) {
                        Ok(update) => apply(&registry, &update),
                        Err(e) => tracing::error!(error = %e, "Failed to load config. Keeping current configuration."),
                    }
                }
                Ok(SignalEvent::Shutdown) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Control events dropped"),
            },
        }
    }

    tracing::info!(generation = registry.generation(), "Shutdown complete");
    Ok(())
}

fn apply(registry: &Registry, update: &MsgsecConfig) {
    // failures are logged by the registry; the previous snapshot stays live
    if let Ok(snapshot) = registry.install(&update.message_security) {
        tracing::info!(
            generation = snapshot.generation,
            registered = ?registry.registered_layers(),
            "Configuration reloaded"
        );
    }
}
