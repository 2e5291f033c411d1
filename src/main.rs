//! TinyWeb - An Embedded HTTP/1.x Server
//!
//! This is the main entry point for the TinyWeb server.
//! It loads the pool configuration, warms up the backend pool, and serves
//! incoming connections until Ctrl+C.

use anyhow::Context;
use std::sync::Arc;
use tinyweb::connection::{handle_connection, ConnectionStats, Handler, Response};
use tinyweb::http::{HttpRequest, Method};
use tinyweb::pool::{PoolConfig, ResourcePool, TcpConnector};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Pool configuration file
    config_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: tinyweb::DEFAULT_HOST.to_string(),
            port: tinyweb::DEFAULT_PORT,
            config_path: tinyweb::DEFAULT_CONFIG_PATH.to_string(),
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
                "--config" | "-c" => {
                    if i + 1 < args.len() {
                        config.config_path = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --config requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("TinyWeb version {}", tinyweb::VERSION);
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
TinyWeb - An Embedded HTTP/1.x Server

USAGE:
    tinyweb [OPTIONS]

OPTIONS:
    -h, --host <HOST>      Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>      Port to listen on (default: 8080)
    -c, --config <FILE>    Pool configuration file (default: conf.json)
    -v, --version          Print version information
        --help             Print this help message

ENVIRONMENT:
    RUST_LOG               Log filter (default: info)

EXAMPLES:
    tinyweb                          # Start on 127.0.0.1:8080
    tinyweb --port 9000              # Start on port 9000
    tinyweb -c /etc/tinyweb.json     # Use another pool configuration

ENDPOINTS:
    GET /health    Pool size, idle and in-use counts
    anything else  Borrows a backend connection and reports which one
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
TinyWeb v{} - Embedded HTTP/1.x Server
──────────────────────────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        tinyweb::VERSION,
        config.bind_address()
    );
}

/// Serves `/health` from pool state; every other request borrows a
/// backend connection for its duration.
struct AppHandler {
    pool: Arc<ResourcePool<TcpConnector>>,
}

impl Handler for AppHandler {
    async fn handle(&self, request: HttpRequest) -> Response {
        if request.method() == Method::Get && request.path() == "/health" {
            let state = self.pool.state();
            return Response::ok(format!(
                "size={} idle={} in_use={}\n",
                state.size, state.idle, state.in_use
            ));
        }

        match self.pool.acquire().await {
            Ok(conn) => {
                let backend = conn
                    .peer_addr()
                    .map(|addr| addr.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                Response::ok(format!(
                    "{} {} served via {}\n",
                    request.method(),
                    request.path(),
                    backend
                ))
            }
            Err(e) => {
                warn!(path = request.path(), error = %e, "No backend connection available");
                Response::service_unavailable()
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging, RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    let pool_config = PoolConfig::load_or_default(&config.config_path);
    let connector = TcpConnector::from_config(&pool_config);
    let pool = Arc::new(
        ResourcePool::new(connector, pool_config)
            .await
            .context("failed to start the backend connection pool")?,
    );

    let handler = Arc::new(AppHandler {
        pool: Arc::clone(&pool),
    });
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, handler, stats) => {}
        _ = shutdown => {}
    }

    pool.close();
    info!("Server shutdown complete");
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    handler: Arc<AppHandler>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = Arc::clone(&handler);
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
