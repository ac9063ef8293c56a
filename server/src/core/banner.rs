//! Startup banner with the bound receiver endpoints

use std::net::SocketAddr;

use super::config::AppConfig;
use super::constants::APP_NAME_LOWER;

// Label width: "Forwarding to:" is 14 chars, pad to 16 for alignment
const W: usize = 16;

/// Print the startup banner. Addresses are the ones actually bound.
pub fn print_banner(
    config: &AppConfig,
    grpc_addr: Option<SocketAddr>,
    http_addr: Option<SocketAddr>,
) {
    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME_LOWER,
        env!("CARGO_PKG_VERSION")
    );
    println!();

    if let Some(addr) = grpc_addr {
        println!(
            "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
            "OTLP gRPC:", addr
        );
    }
    if let (Some(addr), Some(http)) = (http_addr, &config.protocols.http) {
        println!(
            "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m http://{}{}",
            "OTLP HTTP:", addr, http.metrics_url_path
        );
    }

    match &config.forward {
        Some(forward) => println!(
            "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
            "Forwarding to:", forward.endpoint
        ),
        None => println!(
            "  \x1b[90m➜  {:<W$} log only (use --forward-endpoint)\x1b[0m",
            "Forwarding to:"
        ),
    }
    println!(
        "  \x1b[90m➜  {:<W$} {} metric name(s)\x1b[0m",
        "Redacting:",
        config.restricted_metrics.len()
    );

    println!();
}
