//! wfd-p2p-server: Wi-Fi Direct group owner daemon
//!
//! Brings the P2P group up at startup, serves the peer control channel, and
//! tears the group down on SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! sudo ./wfd-p2p-server
//!
//! # Run with custom configuration
//! sudo ./wfd-p2p-server -c /path/to/config.json
//!
//! # Run with environment overrides
//! WFD_LOG_LEVEL=debug WFD_DEVICE_NAME=den-tv sudo ./wfd-p2p-server
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use wfd_p2p_server::config::{load_config_with_env, Config};
use wfd_p2p_server::control::{ControlServer, WfdServerAdapter};
use wfd_p2p_server::dhcp::DhcpSupervisor;
use wfd_p2p_server::invoker::SystemInvoker;
use wfd_p2p_server::listener::{IpAddressListener, ListenerError};
use wfd_p2p_server::p2p::{P2pGroupController, WfdDevice};

/// Command-line arguments
struct Args {
    /// Configuration file path
    config_path: PathBuf,
    /// Generate default configuration
    generate_config: bool,
    /// Check configuration only
    check_config: bool,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config_path = PathBuf::from("/etc/wfd-p2p-server/config.json");
        let mut generate_config = false;
        let mut check_config = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    if let Some(path) = args.next() {
                        config_path = PathBuf::from(path);
                    }
                }
                "-g" | "--generate-config" => {
                    generate_config = true;
                }
                "--check" => {
                    check_config = true;
                }
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "-v" | "--version" => {
                    println!("wfd-p2p-server v{}", wfd_p2p_server::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", arg);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        Self {
            config_path,
            generate_config,
            check_config,
        }
    }
}

fn print_help() {
    println!(
        r#"wfd-p2p-server v{}

Wi-Fi Direct group owner with DHCP and a peer control channel.

USAGE:
    wfd-p2p-server [OPTIONS]

OPTIONS:
    -c, --config <PATH>     Configuration file path [default: /etc/wfd-p2p-server/config.json]
    -g, --generate-config   Generate default configuration and exit
    --check                 Check configuration and exit
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT:
    WFD_LOG_LEVEL          Override log level (trace, debug, info, warn, error)
    WFD_DEVICE_NAME        Override the advertised device name
    WFD_CONTROL_ADDR       Override the control channel listen address
    WFD_DHCP_CONFIG_PATH   Override where udhcpd.conf is written

REQUIREMENTS:
    - wpa_supplicant with P2P support and wpa_cli
    - iproute2 (ip)
    - busybox udhcpd
    - CAP_NET_ADMIN capability (or root)
"#,
        wfd_p2p_server::VERSION
    );
}

/// Initialize logging
fn init_logging(config: &Config) {
    let level = match config.log.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    if let Ok(directive) = "tokio=warn".parse() {
        filter = filter.add_directive(directive);
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.log.target);

    if config.log.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Logs every local address change
struct AddressLogger;

impl IpAddressListener for AddressLogger {
    fn on_ip_address_changed(&self, address: &str) -> Result<(), ListenerError> {
        info!("Local group address is now {}", address);
        Ok(())
    }
}

/// Main application entry point
#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Instant::now();

    // Parse arguments
    let args = Args::parse();

    // Handle generate-config
    if args.generate_config {
        wfd_p2p_server::config::create_default_config(&args.config_path)?;
        println!("Generated default configuration at {:?}", args.config_path);
        return Ok(());
    }

    // Load configuration
    let config = load_config_with_env(&args.config_path).map_err(|e| {
        anyhow::anyhow!("Failed to load configuration from {:?}: {}", args.config_path, e)
    })?;

    // Handle check-config
    if args.check_config {
        println!("Configuration is valid");
        return Ok(());
    }

    // Initialize logging
    init_logging(&config);

    info!("wfd-p2p-server v{}", wfd_p2p_server::VERSION);
    info!("Configuration loaded from {:?}", args.config_path);

    // Build the controller
    let device = WfdDevice::from_config(&config.device);
    let controller = P2pGroupController::new(
        device.clone(),
        &config,
        Box::new(SystemInvoker::new()),
        Box::new(DhcpSupervisor::new(config.dhcp.clone())),
    );
    let controller = Arc::new(Mutex::new(controller));

    // Registry keeps a weak handle; this binding keeps the logger alive
    let address_logger: Arc<dyn IpAddressListener> = Arc::new(AddressLogger);
    controller.lock().add_ip_address_listener(&address_logger);

    if !controller.lock().ping() {
        warn!(
            "wpa_cli does not answer on {}; group creation will likely fail",
            device.wpa_device()
        );
    }

    // Bring the group up
    let worker = Arc::clone(&controller);
    let address = tokio::task::spawn_blocking(move || worker.lock().allow())
        .await?
        .context("Failed to start P2P group")?;
    info!("P2P group up as {} at {}", device.name(), address);

    // Start the control channel
    let adapter = Arc::new(WfdServerAdapter::new(
        device,
        Arc::clone(&controller),
        config.control.clone(),
    ));
    let control = if config.control.enabled {
        let server = match ControlServer::bind(Arc::clone(&adapter)).await {
            Ok(server) => server,
            Err(e) => {
                error!("{}", e);
                shutdown_group(&controller).await;
                return Err(e.into());
            }
        };
        let shutdown_tx = server.shutdown_sender();
        let handle = tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Control server error: {}", e);
            }
        });
        Some((shutdown_tx, handle))
    } else {
        info!("Control channel disabled");
        None
    };

    info!(
        "Startup complete in {:.2}ms",
        start_time.elapsed().as_secs_f64() * 1000.0
    );

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, initiating shutdown...");
        }
        _ = wait_for_sigterm() => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Graceful shutdown
    info!("Shutting down...");

    if let Some((shutdown_tx, handle)) = control {
        let _ = shutdown_tx.send(());
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
    }

    shutdown_group(&controller).await;
    drop(address_logger);

    info!("Shutdown complete");
    Ok(())
}

/// Tear the group down on a blocking worker
async fn shutdown_group(controller: &Arc<Mutex<P2pGroupController>>) {
    let worker = Arc::clone(controller);
    match tokio::task::spawn_blocking(move || worker.lock().disallow()).await {
        Ok(Ok(())) => info!("P2P group removed"),
        Ok(Err(e)) => warn!("P2P group teardown incomplete: {}", e),
        Err(e) => error!("P2P group teardown task failed: {}", e),
    }
}

/// Wait for SIGTERM signal
#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    // On non-Unix platforms, just wait forever
    std::future::pending::<()>().await
}
