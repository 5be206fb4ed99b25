//! Risk service entry point.
//!
//! Binds the TCP listener, then serves order flow until interrupted.

use clap::Parser;
use risk_service::engine::RiskLimits;
use risk_service::service::{RiskService, RiskServiceConfig};
use std::sync::atomic::Ordering;

/// Pre-trade risk gate enforcing worst-case position limits
#[derive(Parser, Debug)]
#[command(name = "risk_service")]
#[command(about = "Pre-trade risk gate between trading clients and the matching venue")]
struct Args {
    /// IP address to listen on
    ip_address: String,

    /// TCP port for client connections
    tcp_port: u16,

    /// Maximum worst-case long position per instrument
    #[arg(value_parser = clap::value_parser!(i64).range(0..))]
    max_buy_position: i64,

    /// Maximum worst-case short position per instrument
    #[arg(value_parser = clap::value_parser!(i64).range(0..))]
    max_sell_position: i64,
}

fn main() {
    let args = Args::parse();

    let config = RiskServiceConfig::new(
        &args.ip_address,
        args.tcp_port,
        RiskLimits::new(args.max_buy_position as u64, args.max_sell_position as u64),
    );

    let mut service = match RiskService::new(config) {
        Ok(service) => service,
        Err(error) => {
            eprintln!("failed to start risk service: {error}");
            std::process::exit(1);
        }
    };

    let running = service.running_handle();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("failed to set Ctrl-C handler");

    service.run();
}
