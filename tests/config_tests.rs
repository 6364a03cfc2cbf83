use chargebus::config::*;
use chargebus::error::ConfigError;
use std::net::Ipv4Addr;
use std::time::Duration;

#[test]
fn test_default_config() {
    let config = SimulatorConfig::default();

    assert_eq!(config.module_id, 0x00);
    assert_eq!(config.group_id, 0x00);
    assert_eq!(config.bus.group, Ipv4Addr::new(224, 0, 0, 1));
    assert_eq!(config.bus.port, 1234);
    assert!(config.bus.multicast_loop);
    assert_eq!(config.heartbeat.min_period(), Duration::from_millis(390));
    assert_eq!(config.heartbeat.max_period(), Duration::from_millis(410));
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_json_falls_back_to_defaults() {
    let config = SimulatorConfig::from_json_str(r#"{ "module_id": 5, "bus": { "port": 4321 } }"#)
        .unwrap();

    assert_eq!(config.module_id, 5);
    assert_eq!(config.group_id, 0);
    assert_eq!(config.bus.port, 4321);
    assert_eq!(config.bus.group, DEFAULT_MULTICAST_GROUP);
    assert_eq!(config.heartbeat.min_period_ms, DEFAULT_HEARTBEAT_MIN_MS);
}

#[test]
fn test_config_round_trips_through_json() {
    let mut config = SimulatorConfig::default();
    config.module_id = 0x3B;
    config.group_id = 0x04;
    config.bus.group = Ipv4Addr::new(239, 1, 2, 3);

    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(SimulatorConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn test_module_id_above_range_is_rejected() {
    let result = SimulatorConfig::from_json_str(r#"{ "module_id": 60 }"#);
    assert!(matches!(result, Err(ConfigError::ModuleIdOutOfRange(0x3C))));
}

#[test]
fn test_group_id_cannot_be_broadcast() {
    let result = SimulatorConfig::from_json_str(r#"{ "group_id": 63 }"#);
    assert!(matches!(result, Err(ConfigError::GroupIdIsBroadcast(0x3F))));
}

#[test]
fn test_bus_group_must_be_multicast() {
    let result = SimulatorConfig::from_json_str(r#"{ "bus": { "group": "192.168.1.10" } }"#);
    assert!(matches!(result, Err(ConfigError::NotMulticast(_))));
}

#[test]
fn test_reversed_heartbeat_range_is_rejected() {
    let result = SimulatorConfig::from_json_str(
        r#"{ "heartbeat": { "min_period_ms": 500, "max_period_ms": 400 } }"#,
    );
    assert!(matches!(
        result,
        Err(ConfigError::HeartbeatRange {
            min_ms: 500,
            max_ms: 400
        })
    ));
}

#[test]
fn test_invalid_json_is_reported() {
    let result = SimulatorConfig::from_json_str("{ module_id: ");
    assert!(matches!(result, Err(ConfigError::Json(_))));
}

#[test]
fn test_missing_file_is_reported() {
    let result = SimulatorConfig::from_json_file("/nonexistent/chargebus/config.json");
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_parse_address() {
    assert_eq!(parse_address("0x3B"), Some(0x3B));
    assert_eq!(parse_address("0X0a"), Some(0x0A));
    assert_eq!(parse_address("17"), Some(17));
    assert_eq!(parse_address(" 5 "), Some(5));
    assert_eq!(parse_address("0x100"), None);
    assert_eq!(parse_address("abc"), None);
    assert_eq!(parse_address(""), None);
}
