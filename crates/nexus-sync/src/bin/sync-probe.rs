//! # Sync Probe
//!
//! Runs the client stack end to end against a live API: loads the config,
//! optionally logs in, reads one query and prints it.
//!
//! ## Usage
//! ```bash
//! # Dashboard summary with the configured (or default) API
//! cargo run -p nexus-sync --bin sync-probe
//!
//! # Another query, explicit config file
//! cargo run -p nexus-sync --bin sync-probe -- --query ventas --config ./nexus.toml
//!
//! # Log in first
//! NEXUS_EMAIL=caja@nexus.com NEXUS_PASSWORD=... cargo run -p nexus-sync --bin sync-probe
//! ```
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - Default: `info,nexus_sync=debug`

use nexus_core::LoginCredentials;
use nexus_sync::{queries, Query, QueryClient, Session, SyncConfig};
use serde_json::Value;
use std::env;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nexus_sync=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn query_by_name(name: &str) -> Option<Query> {
    match name {
        "resumen" | "dashboard" => Some(queries::dashboard_resumen()),
        "tiempo-real" => Some(queries::ventas_tiempo_real()),
        "ventas" => Some(queries::ventas()),
        "productos" => Some(queries::productos()),
        "insights" => Some(queries::insights()),
        "user" | "me" => Some(queries::current_user()),
        "tiendas" => Some(queries::admin_tiendas()),
        "usuarios" => Some(queries::admin_usuarios()),
        _ => None,
    }
}

fn print_help() {
    println!("Nexus POS Sync Probe");
    println!();
    println!("Usage: sync-probe [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -q, --query <NAME>   resumen, tiempo-real, ventas, productos, insights,");
    println!("                       user, tiendas, usuarios (default: resumen)");
    println!("  -c, --config <PATH>  Config file (default: platform config dir)");
    println!("  -h, --help           Show this help message");
    println!();
    println!("Environment:");
    println!("  NEXUS_EMAIL / NEXUS_PASSWORD   Log in before reading");
    println!("  NEXUS_API_URL, NEXUS_API_TIMEOUT_MS, ...   Config overrides");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut query_name = String::from("resumen");
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--query" | "-q" => {
                if i + 1 < args.len() {
                    query_name = args[i + 1].clone();
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    init_tracing();

    let Some(query) = query_by_name(&query_name) else {
        error!(query = %query_name, "Unknown query");
        print_help();
        std::process::exit(2);
    };

    let config = SyncConfig::load_or_default(config_path);
    info!(base_url = %config.api.base_url, timeout_ms = config.api.timeout_ms, "Probe starting");

    let client = QueryClient::from_config(&config)?;
    let session = Session::new(client.clone());

    if let (Ok(email), Ok(password)) = (env::var("NEXUS_EMAIL"), env::var("NEXUS_PASSWORD")) {
        let user = session.login(&LoginCredentials { email, password }).await?;
        info!(user = %user.email, tienda = ?user.tienda.as_ref().map(|t| &t.nombre), "Logged in");
    } else if !session.is_authenticated() {
        info!("No stored token and no NEXUS_EMAIL/NEXUS_PASSWORD, reading anonymously");
    }

    match client.read_query::<Value>(&query).await {
        Ok(data) => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        Err(e) => {
            error!(key = %query.key, kind = e.kind(), error = %e, "Read failed");
            Err(e.into())
        }
    }
}
