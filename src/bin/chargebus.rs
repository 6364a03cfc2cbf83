use chargebus::client::{BusClient, DecodedReply, Request, Target};
use chargebus::config::{parse_address, BusConfig, DEFAULT_MULTICAST_GROUP, DEFAULT_PORT};
use chargebus::heartbeat::{HeartbeatMonitor, Liveness, DEFAULT_HEARTBEAT_TIMEOUT};
use chargebus::protocol::{CommandCode, Frame};
use chargebus::transport::{FrameBus, UdpMulticastBus};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const DEFAULT_WAIT_MS: &str = "500";

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult {
    let default_group = DEFAULT_MULTICAST_GROUP.to_string();
    let default_port = DEFAULT_PORT.to_string();
    let default_timeout = DEFAULT_HEARTBEAT_TIMEOUT.as_millis().to_string();

    let matches = App::new("chargebus")
        .version("0.1.0")
        .author("Power Systems Engineering Team")
        .about("🔌 Charger module bus client - query and control modules on the bus")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("group")
                .long("group")
                .value_name("ADDR")
                .help("Multicast group of the bus")
                .takes_value(true)
                .default_value(&default_group)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("UDP port of the bus")
                .takes_value(true)
                .default_value(&default_port)
                .global(true),
        )
        .arg(
            Arg::with_name("target")
                .short("t")
                .long("target")
                .value_name("ID")
                .help("Module address to talk to")
                .takes_value(true)
                .default_value("0x00")
                .validator(address_validator)
                .global(true),
        )
        .arg(
            Arg::with_name("group-target")
                .short("g")
                .long("group-target")
                .value_name("ID")
                .help("Address a module group instead of a single module")
                .takes_value(true)
                .validator(address_validator)
                .conflicts_with("broadcast")
                .global(true),
        )
        .arg(
            Arg::with_name("broadcast")
                .short("b")
                .long("broadcast")
                .help("Address every module on the bus")
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table")
                .global(true),
        )
        .arg(
            Arg::with_name("wait")
                .short("w")
                .long("wait")
                .value_name("MS")
                .help("How long to wait for a reply")
                .takes_value(true)
                .default_value(DEFAULT_WAIT_MS)
                .validator(number_validator)
                .global(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable verbose output")
                .global(true),
        )
        .subcommand(SubCommand::with_name("read-system").about("📊 Read system voltage/current (0x01)"))
        .subcommand(SubCommand::with_name("read-module").about("📊 Read module voltage/current (0x03)"))
        .subcommand(SubCommand::with_name("status").about("🌡️  Read module status and temperature (0x04)"))
        .subcommand(
            SubCommand::with_name("read-fixed")
                .about("📊 Read voltage/current in mV/mA (0x09, or 0x08 with --system)")
                .arg(
                    Arg::with_name("system")
                        .long("system")
                        .help("Read the system value instead of the module value"),
                ),
        )
        .subcommand(SubCommand::with_name("info").about("ℹ️  Read module capabilities (0x0A)"))
        .subcommand(SubCommand::with_name("external").about("🔋 Read external voltage and allowed current (0x0C)"))
        .subcommand(
            SubCommand::with_name("power")
                .about("⚡ Switch module output on or off (0x1A)")
                .arg(
                    Arg::with_name("state")
                        .help("Output state")
                        .required(true)
                        .possible_values(&["on", "off"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("set-output")
                .about("🎛️  Set output voltage and current (0x1B, or 0x1C with --fixed)")
                .arg(
                    Arg::with_name("voltage")
                        .help("Voltage in volts")
                        .required(true)
                        .validator(float_validator),
                )
                .arg(
                    Arg::with_name("current")
                        .help("Current in amps")
                        .required(true)
                        .validator(float_validator),
                )
                .arg(
                    Arg::with_name("fixed")
                        .long("fixed")
                        .help("Use the fixed-point set-output command"),
                ),
        )
        .subcommand(
            SubCommand::with_name("monitor")
                .about("💓 Watch module heartbeats (Ctrl+C to stop)")
                .arg(
                    Arg::with_name("duration")
                        .long("duration")
                        .value_name("S")
                        .help("Stop after this many seconds")
                        .takes_value(true)
                        .validator(number_validator),
                )
                .arg(
                    Arg::with_name("timeout")
                        .long("timeout")
                        .value_name("MS")
                        .help("Silence after which a module is reported lost")
                        .takes_value(true)
                        .default_value(&default_timeout)
                        .validator(number_validator),
                ),
        )
        .get_matches();

    let verbose = matches.is_present("verbose");
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let options = Options::from_matches(&matches)?;

    if verbose {
        println!("{}", "🔌 chargebus - charger module bus client".bright_blue().bold());
        println!(
            "{} {}:{}",
            "Joining".dimmed(),
            options.bus.group,
            options.bus.port
        );
    }

    let bus = Arc::new(UdpMulticastBus::bind(&options.bus).await?);
    let client = BusClient::new(Arc::clone(&bus));

    match matches.subcommand() {
        ("read-system", _) => query(&client, &options, Request::ReadSystem).await?,
        ("read-module", _) => query(&client, &options, Request::ReadModule).await?,
        ("status", _) => query(&client, &options, Request::ReadStatus).await?,
        ("read-fixed", Some(sub_matches)) => {
            let request = if sub_matches.is_present("system") {
                Request::ReadSystemFixed
            } else {
                Request::ReadModuleFixed
            };
            query(&client, &options, request).await?;
        }
        ("info", _) => query(&client, &options, Request::ReadInfo).await?,
        ("external", _) => query(&client, &options, Request::ReadExternal).await?,
        ("power", Some(sub_matches)) => {
            let request = match sub_matches.value_of("state") {
                Some("on") => Request::PowerOn,
                _ => Request::PowerOff,
            };
            query(&client, &options, request).await?;
        }
        ("set-output", Some(sub_matches)) => {
            let voltage: f64 = sub_matches.value_of("voltage").unwrap_or("0").parse()?;
            let current: f64 = sub_matches.value_of("current").unwrap_or("0").parse()?;
            let request = if sub_matches.is_present("fixed") {
                Request::SetOutputFixed { voltage, current }
            } else {
                Request::SetOutput { voltage, current }
            };
            query(&client, &options, request).await?;
        }
        ("monitor", Some(sub_matches)) => {
            handle_monitor(sub_matches, bus.as_ref(), &options).await?;
        }
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
        }
    }

    Ok(())
}

struct Options {
    bus: BusConfig,
    target: Target,
    format: String,
    wait: Duration,
}

impl Options {
    fn from_matches(matches: &ArgMatches<'_>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut bus = BusConfig::default();
        if let Some(group) = matches.value_of("group") {
            bus.group = group.parse::<Ipv4Addr>()?;
        }
        if let Some(port) = matches.value_of("port") {
            bus.port = port.parse()?;
        }

        let target = if matches.is_present("broadcast") {
            Target::Broadcast
        } else if let Some(group) = matches.value_of("group-target").and_then(parse_address) {
            Target::Group(group)
        } else {
            Target::Module(matches.value_of("target").and_then(parse_address).unwrap_or(0))
        };

        let wait_ms: u64 = matches.value_of("wait").unwrap_or(DEFAULT_WAIT_MS).parse()?;

        Ok(Self {
            bus,
            target,
            format: matches.value_of("format").unwrap_or("table").to_string(),
            wait: Duration::from_millis(wait_ms),
        })
    }
}

async fn query<B: FrameBus>(client: &BusClient<B>, options: &Options, request: Request) -> CliResult {
    let reply = client.request(request, options.target, options.wait).await?;
    match reply {
        Some(frame) => print_reply(&frame, &options.format),
        None => print_silence(request, options),
    }
    Ok(())
}

fn print_reply(frame: &Frame, format: &str) {
    let id = frame.id();
    let decoded = DecodedReply::decode(frame);

    match format {
        "json" => {
            let body = match &decoded {
                Ok(reply) => serde_json::json!({
                    "module": id.source(),
                    "command": id.command(),
                    "reply": reply,
                }),
                Err(e) => serde_json::json!({
                    "module": id.source(),
                    "command": id.command(),
                    "error": e.to_string(),
                }),
            };
            println!("{}", body);
        }
        "compact" => match &decoded {
            Ok(reply) => println!("[{:#04X}] {}", id.source(), reply),
            Err(e) => println!("[{:#04X}] {}", id.source(), e.to_string().red()),
        },
        _ => {
            let command = CommandCode::from_code(id.command())
                .map(|code| code.name().to_string())
                .unwrap_or_else(|| format!("{:#04X}", id.command()));
            println!("{} {}", "📨".bright_blue(), format!("Reply from module {:#04X}", id.source()).bright_blue().bold());
            println!("{} {}", "Command:".bright_white(), command);
            println!("{} {}", "Frame:".bright_white(), frame.to_string().dimmed());
            match &decoded {
                Ok(reply) => print_reply_table(reply),
                Err(e) => println!("{} {}", "❌".red(), format!("Undecodable payload: {}", e).bright_red()),
            }
        }
    }
}

fn print_reply_table(reply: &DecodedReply) {
    match reply {
        DecodedReply::Measurement { voltage, current } => {
            println!("{} {}", "Voltage:".bright_white(), format!("{:.1} V", voltage).bright_green());
            println!("{} {}", "Current:".bright_white(), format!("{:.1} A", current).bright_green());
        }
        DecodedReply::FixedMeasurement { voltage_mv, current_ma } => {
            println!("{} {}", "Voltage:".bright_white(), format!("{} mV", voltage_mv).bright_green());
            println!("{} {}", "Current:".bright_white(), format!("{} mA", current_ma).bright_green());
        }
        DecodedReply::Status { status_bytes, temperature_c } => {
            let alarms = if status_bytes.iter().all(|b| *b == 0) {
                "NONE".bright_green()
            } else {
                format!("{:02X?}", status_bytes).bright_red()
            };
            println!("{} {}", "Alarms:".bright_white(), alarms);
            println!("{} {}", "Temperature:".bright_white(), format!("{} °C", temperature_c).white());
        }
        DecodedReply::Info { voltage_max, voltage_min, max_current, rated_power } => {
            println!("{} {:.1} - {:.1} V", "Voltage range:".bright_white(), voltage_min, voltage_max);
            println!("{} {:.1} A", "Max current:".bright_white(), max_current);
            println!("{} {:.0} W", "Rated power:".bright_white(), rated_power);
        }
        DecodedReply::External { voltage, allowed_current } => {
            println!("{} {:.1} V", "External voltage:".bright_white(), voltage);
            println!("{} {:.1} A", "Allowed current:".bright_white(), allowed_current);
        }
        DecodedReply::PowerState { powered_on } => {
            let state = if *powered_on { "ON".bright_green() } else { "OFF".bright_red() };
            println!("{} {}", "Output:".bright_white(), state);
        }
        DecodedReply::OutputSetting { .. } | DecodedReply::Heartbeat { .. } | DecodedReply::Unknown { .. } => {
            println!("{} {}", "Result:".bright_white(), reply);
        }
    }
}

fn print_silence(request: Request, options: &Options) {
    let broadcast_only = matches!(options.target, Target::Broadcast | Target::Group(_));
    match options.format.as_str() {
        "json" => println!("{}", serde_json::json!({ "reply": null })),
        "compact" => println!("{}", "NO REPLY".yellow()),
        _ => {
            if broadcast_only && request.command() == CommandCode::PowerControl {
                println!("{} {}", "✅".green(), "Sent; group and broadcast power commands are not acknowledged".bright_green());
            } else {
                println!(
                    "{} {}",
                    "⏱️ ".yellow(),
                    format!("No reply within {} ms", options.wait.as_millis()).yellow()
                );
            }
        }
    }
}

async fn handle_monitor<B: FrameBus>(matches: &ArgMatches<'_>, bus: &B, options: &Options) -> CliResult {
    let timeout_ms: u64 = matches.value_of("timeout").unwrap_or("1000").parse()?;
    let timeout = Duration::from_millis(timeout_ms);
    let duration = match matches.value_of("duration") {
        Some(seconds) => Some(Duration::from_secs(seconds.parse()?)),
        None => None,
    };

    println!("{}", "💓 Monitoring module heartbeats (Press Ctrl+C to stop)...".bright_blue().bold());

    let started = Instant::now();
    let mut monitors: BTreeMap<u8, HeartbeatMonitor> = BTreeMap::new();
    let mut lost: BTreeMap<u8, bool> = BTreeMap::new();
    let mut sweep = tokio::time::interval(Duration::from_millis(250));

    loop {
        if let Some(limit) = duration {
            if started.elapsed() >= limit {
                break;
            }
        }

        tokio::select! {
            received = bus.recv() => {
                let frame = match received {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!("skipping frame: {}", e);
                        continue;
                    }
                };
                if !frame.id().is_heartbeat() {
                    continue;
                }

                let module_id = frame.id().source();
                let monitor = monitors
                    .entry(module_id)
                    .or_insert_with(|| HeartbeatMonitor::new(timeout));
                let interval = monitor.record(Instant::now());
                let count = monitor.count();
                lost.insert(module_id, false);
                print_heartbeat(module_id, count, interval, &options.format);
            }
            _ = sweep.tick() => {
                let now = Instant::now();
                for (module_id, monitor) in &monitors {
                    let was_lost = lost.get(module_id).copied().unwrap_or(false);
                    if monitor.liveness(now) == Liveness::TimedOut && !was_lost {
                        lost.insert(*module_id, true);
                        print_lost(*module_id, timeout, &options.format);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    print_monitor_summary(&monitors, &options.format);
    Ok(())
}

fn print_heartbeat(module_id: u8, count: u64, interval: Option<Duration>, format: &str) {
    let interval_ms = interval.map(|i| i.as_millis());
    match format {
        "json" => println!(
            "{}",
            serde_json::json!({ "module": module_id, "heartbeats": count, "interval_ms": interval_ms })
        ),
        "compact" => println!("[{:#04X}] beat #{}", module_id, count),
        _ => {
            let interval_str = match interval_ms {
                Some(ms) if ms > 410 => format!("{:>5} ms", ms).yellow(),
                Some(ms) => format!("{:>5} ms", ms).green(),
                None => "    first".white(),
            };
            println!("│ {:#04X} │ {:>6} │ {} │", module_id, count, interval_str);
        }
    }
}

fn print_lost(module_id: u8, timeout: Duration, format: &str) {
    match format {
        "json" => println!("{}", serde_json::json!({ "module": module_id, "lost": true })),
        _ => println!(
            "{} {}",
            "⚠️ ".red(),
            format!("Module {:#04X} silent for more than {} ms", module_id, timeout.as_millis()).bright_red()
        ),
    }
}

fn print_monitor_summary(monitors: &BTreeMap<u8, HeartbeatMonitor>, format: &str) {
    if format == "json" {
        let summary: Vec<_> = monitors
            .iter()
            .map(|(module_id, monitor)| {
                serde_json::json!({
                    "module": module_id,
                    "heartbeats": monitor.count(),
                    "intervals": monitor.interval_stats(),
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(summary));
        return;
    }

    println!("{}", "Heartbeat summary".bright_blue().bold());
    if monitors.is_empty() {
        println!("{}", "No heartbeats seen".yellow());
    }
    for (module_id, monitor) in monitors {
        match monitor.interval_stats() {
            Some(stats) => println!(
                "{:#04X}: {} beats, interval min {} ms / mean {} ms / max {} ms",
                module_id,
                monitor.count(),
                stats.min.as_millis(),
                stats.mean.as_millis(),
                stats.max.as_millis()
            ),
            None => println!("{:#04X}: {} beats", module_id, monitor.count()),
        }
    }
}

fn address_validator(value: String) -> Result<(), String> {
    match parse_address(&value) {
        Some(_) => Ok(()),
        None => Err(format!("'{}' is not a valid address (decimal or 0x hex)", value)),
    }
}

fn number_validator(value: String) -> Result<(), String> {
    match value.parse::<u64>() {
        Ok(_) => Ok(()),
        Err(_) => Err("Value must be a non-negative whole number".into()),
    }
}

fn float_validator(value: String) -> Result<(), String> {
    match value.parse::<f64>() {
        Ok(v) if v >= 0.0 => Ok(()),
        _ => Err("Value must be a non-negative number".into()),
    }
}
