//! `topica` – Topica broker daemon.
//!
//! 1. Loads `~/.topica/config.toml` (defaults when absent) plus `TOPICA_*`
//!    environment overrides.
//! 2. Starts the WebSocket broker.
//! 3. Optionally opens the serial device named by `serial_device` and
//!    publishes its LiDAR records under `serial_prefix`.
//! 4. Shuts everything down cleanly on Ctrl-C.
//!
//! `topica init` writes the default config file and exits.

mod config;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use topica_registry::TopicRegistry;
use topica_serial::{RegistrySink, SerialLink, StreamAligner};
use topica_server::{ServerContext, TopicaServer};
use topica_types::TopicaError;

fn main() {
    let _guard = telemetry::init_tracing("topica");
    print_banner();

    if std::env::args().nth(1).as_deref() == Some("init") {
        write_default_config();
        return;
    }

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        Ok(None) => {
            println!(
                "  No config at {}, using defaults ({} to create one).",
                config::config_path().display().to_string().dimmed(),
                "topica init".bold()
            );
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let shutdown = CancellationToken::new();
    let on_ctrlc = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        on_ctrlc.cancel();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "cannot start tokio runtime");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(run(cfg, shutdown));
    // A serial read may be parked in a blocking thread.
    runtime.shutdown_timeout(Duration::from_secs(1));

    match result {
        Ok(()) => println!("{}", "  ✓ Topica stopped.".green()),
        Err(e) => {
            error!(error = %e, "topica failed");
            std::process::exit(1);
        }
    }
}

async fn run(cfg: config::Config, shutdown: CancellationToken) -> Result<(), TopicaError> {
    let server_config = cfg
        .server_config()
        .map_err(|e| TopicaError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

    let registry = Arc::new(TopicRegistry::with_settings(cfg.strict, cfg.verbose));
    let ctx = Arc::new(ServerContext::new(Arc::clone(&registry), server_config));
    let server = TopicaServer::bind(ctx).await?;
    println!(
        "  Broker listening on {}{}",
        "ws://".dimmed(),
        server.local_addr()?.to_string().bold()
    );

    let serial = cfg.serial_device.clone().map(|device| {
        tokio::spawn(run_serial(
            device,
            cfg.serial_prefix.clone(),
            Arc::clone(&registry),
            shutdown.child_token(),
        ))
    });

    server.run_until(shutdown.clone()).await?;

    if let Some(task) = serial {
        shutdown.cancel();
        let _ = task.await;
    }
    Ok(())
}

async fn run_serial(device: String, prefix: String, registry: Arc<TopicRegistry>, cancel: CancellationToken) {
    let file = match tokio::fs::OpenOptions::new().read(true).write(true).open(&device).await {
        Ok(file) => file,
        Err(e) => {
            error!(device = %device, error = %e, "cannot open serial device");
            return;
        }
    };
    let (reader, writer) = tokio::io::split(file);

    let aligner = StreamAligner::lidar();
    let sink = match RegistrySink::new(registry, &prefix, aligner.layout()) {
        Ok(sink) => sink,
        Err(e) => {
            error!(prefix = %prefix, error = %e, "cannot register serial topics");
            return;
        }
    };
    info!(device = %device, topics = ?sink.paths(), "publishing serial records");

    match SerialLink::new(device.clone(), aligner).run(reader, writer, sink, cancel).await {
        Ok(stats) => info!(device = %device, records = stats.records, "serial link finished"),
        Err(e) => error!(device = %device, error = %e, "serial link failed"),
    }
}

fn write_default_config() {
    let path = config::config_path();
    if path.exists() {
        println!("  Config already exists at {}", path.display().to_string().bold());
        return;
    }
    match config::save(&config::Config::default()) {
        Ok(()) => println!("  {} Config saved to {}", "✓".green().bold(), path.display().to_string().bold()),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"  ______            _          "#.bold().cyan());
    println!("{}", r#" /_  __/___  ____  (_)________ _"#.bold().cyan());
    println!("{}", r#"  / / / __ \/ __ \/ / ___/ __ `/"#.bold().cyan());
    println!("{}", r#" / / / /_/ / /_/ / / /__/ /_/ / "#.bold().cyan());
    println!("{}", r#"/_/  \____/ .___/_/\___/\__,_/  "#.bold().cyan());
    println!("{}", r#"         /_/                    "#.bold().cyan());
    println!();
    println!("  {} {}", "Topica".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Robot topic broker");
    println!();
}
