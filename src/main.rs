//! RedDB - An In-Memory Multi-Database Key-Value Store
//!
//! This is the main entry point for the RedDB server. It parses the
//! configuration, starts the background sweeper, and accepts client
//! connections through a bounded worker pool.

use reddb::commands::CommandHandler;
use reddb::connection::{handle_connection, ConnectionStats};
use reddb::storage::{start_sweeper, Registry};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Semaphore;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Maximum number of concurrent client connections
    max_clients: usize,
    /// Optional password; None disables protection
    password: Option<String>,
    /// Directory snapshot files are written to and read from;
    /// empty means the working directory
    dump_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: reddb::DEFAULT_HOST.to_string(),
            port: reddb::DEFAULT_PORT,
            max_clients: reddb::DEFAULT_MAX_CLIENTS,
            password: None,
            dump_dir: PathBuf::new(),
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--max-clients" | "-c" => {
                    if i + 1 < args.len() {
                        config.max_clients = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid client limit");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --max-clients requires a value");
                        std::process::exit(1);
                    }
                }
                "--password" => {
                    if i + 1 < args.len() {
                        config.password = Some(args[i + 1].clone());
                        i += 2;
                    } else {
                        eprintln!("Error: --password requires a value");
                        std::process::exit(1);
                    }
                }
                "--dump-dir" | "-d" => {
                    if i + 1 < args.len() {
                        config.dump_dir = PathBuf::from(&args[i + 1]);
                        i += 2;
                    } else {
                        eprintln!("Error: --dump-dir requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("RedDB version {}", reddb::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
RedDB - An In-Memory Multi-Database Key-Value Store

USAGE:
    reddb [OPTIONS]

OPTIONS:
    -h, --host <HOST>          Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>          Port to listen on (default: 7100)
    -c, --max-clients <N>      Maximum concurrent clients (default: 64)
        --password <PASSWORD>  Require AUTH for FLUSH/DUMP/LOAD
    -d, --dump-dir <DIR>       Directory for snapshot files (default: working directory)
    -v, --version              Print version information
        --help                 Print this help message

EXAMPLES:
    reddb                          # Start on 127.0.0.1:7100
    reddb --port 7200              # Start on port 7200
    reddb --password s3cret        # Enable password protection
    reddb --dump-dir /var/reddb    # Keep snapshots out of the working directory
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
RedDB v{} - In-Memory Multi-Database Key-Value Store
────────────────────────────────────────────────────
Listening on:        {}
Password protection: {}
Max clients:         {}

Use Ctrl+C to shutdown gracefully.
"#,
        reddb::VERSION,
        config.bind_address(),
        if config.password.is_some() {
            "Enabled"
        } else {
            "Disabled"
        },
        config.max_clients,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    // Registry with the default database, shared across all tasks
    let registry = Arc::new(Registry::new());
    info!("Registry initialized with default database 0");

    // Start the background expiration sweeper
    let _sweeper = start_sweeper(Arc::clone(&registry));

    // Shared command handler state: registry, password, TIME_DUMP slot
    let command_handler = CommandHandler::new(Arc::clone(&registry), config.password.clone())
        .with_dump_dir(config.dump_dir.clone());

    let stats = Arc::new(ConnectionStats::new());

    // Bounded worker pool: the acceptor blocks when all permits are out
    let clients = Arc::new(Semaphore::new(config.max_clients));

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received, stopping server...");
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, command_handler, stats.clone(), clients) => {}
        _ = shutdown => {}
    }

    // Dropping the sweeper (and any TIME_DUMP task held by the command
    // handler) stops the background work.
    info!(
        connections = stats
            .connections_accepted
            .load(std::sync::atomic::Ordering::Relaxed),
        commands = stats
            .commands_processed
            .load(std::sync::atomic::Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}

/// Accepts connections, bounded by the client semaphore.
///
/// A permit is taken before `accept` and rides along with the connection
/// task, so a saturated pool pauses the acceptor instead of dropping
/// clients.
async fn accept_loop(
    listener: TcpListener,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    clients: Arc<Semaphore>,
) {
    loop {
        let permit = match clients.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return, // Semaphore closed: server is shutting down
        };

        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = command_handler.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                    drop(permit);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
