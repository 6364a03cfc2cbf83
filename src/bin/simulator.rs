use chargebus::agent::ModuleAgent;
use chargebus::config::{parse_address, SimulatorConfig};
use clap::{App, Arg};
use std::net::Ipv4Addr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("chargebus-simulator")
        .version("0.1.0")
        .author("Power Systems Engineering Team")
        .about("🔌 Charger module simulator - answers bus commands and emits heartbeats")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON config file; flags below override it")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("module-id")
                .short("m")
                .long("module-id")
                .value_name("ID")
                .help("Module address, 0x00-0x3B")
                .takes_value(true)
                .validator(address_validator),
        )
        .arg(
            Arg::with_name("group-id")
                .short("g")
                .long("group-id")
                .value_name("ID")
                .help("Group address")
                .takes_value(true)
                .validator(address_validator),
        )
        .arg(
            Arg::with_name("group")
                .long("group")
                .value_name("ADDR")
                .help("Multicast group of the bus")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("UDP port of the bus")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("interface")
                .long("interface")
                .value_name("ADDR")
                .help("Local interface used to join the group")
                .takes_value(true),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match matches.value_of("config") {
        Some(path) => SimulatorConfig::from_json_file(path)?,
        None => SimulatorConfig::default(),
    };

    if let Some(id) = matches.value_of("module-id").and_then(parse_address) {
        config.module_id = id;
    }
    if let Some(id) = matches.value_of("group-id").and_then(parse_address) {
        config.group_id = id;
    }
    if let Some(group) = matches.value_of("group") {
        config.bus.group = group.parse::<Ipv4Addr>()?;
    }
    if let Some(port) = matches.value_of("port") {
        config.bus.port = port.parse()?;
    }
    if let Some(interface) = matches.value_of("interface") {
        config.bus.interface = interface.parse::<Ipv4Addr>()?;
    }

    println!("🔌 Charger Module Simulator");
    println!("===========================");
    println!(
        "module {:#04X}, group {:#04X}, bus {}:{}",
        config.module_id, config.group_id, config.bus.group, config.bus.port
    );

    let agent = ModuleAgent::from_config(&config).await?;

    // Ctrl+C flips the shutdown flag; both loops drain on their own.
    let shutdown = agent.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("🛑 shutdown requested"),
            Err(e) => warn!("unable to listen for Ctrl+C: {}", e),
        }
        shutdown.stop();
    });

    let mut status_rx = agent.status_receiver();
    let status_logger = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow();
            info!(
                powered_on = status.powered_on,
                voltage = status.measured_voltage,
                current = status.measured_current,
                "📊 module state changed"
            );
        }
    });

    let report = agent.run().await;
    status_logger.abort();

    println!(
        "🚀 Simulator stopped: {} frames received, {} replies, {} heartbeats",
        report.receive.frames_received, report.receive.replies_sent, report.heartbeat.sent
    );

    Ok(())
}

fn address_validator(value: String) -> Result<(), String> {
    match parse_address(&value) {
        Some(_) => Ok(()),
        None => Err(format!("'{}' is not a valid address (decimal or 0x hex)", value)),
    }
}
