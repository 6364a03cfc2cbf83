use chargebus::client::{output_payload, BusClient, DecodedReply, Request, Target};
use chargebus::error::PayloadError;
use chargebus::protocol::payload::{pack_f32_pair, pack_u16_quad, pack_u32_pair};
use chargebus::protocol::*;
use chargebus::router::CommandRouter;
use chargebus::transport::{FrameBus, LoopbackBus};
use chargebus::DeviceState;
use std::sync::Arc;
use std::time::Duration;

fn reply(command: u8, source: u8, data: &[u8]) -> Frame {
    let id = Identifier::request(Scope::Module, command, MONITOR_ADDRESS, source).unwrap();
    Frame::new(id, data).unwrap()
}

#[test]
fn test_request_frames_use_monitor_source_and_padding() {
    let frame = Request::ReadModule.frame(Target::Module(0x02), MONITOR_ADDRESS);

    assert_eq!(
        frame.id().to_raw(),
        encode_id(0, 0x0A, 0x03, 0x02, MONITOR_ADDRESS).unwrap()
    );
    assert_eq!(frame.data(), &[0; 8]);
}

#[test]
fn test_group_and_broadcast_targets() {
    let group = Request::PowerOn.frame(Target::Group(0x01), MONITOR_ADDRESS);
    assert_eq!(group.id().scope(), Scope::Group);
    assert_eq!(group.id().destination(), 0x01);
    assert_eq!(group.data(), &[0x00, 0, 0, 0, 0, 0, 0, 0]);

    let broadcast = Request::PowerOff.frame(Target::Broadcast, MONITOR_ADDRESS);
    assert_eq!(broadcast.id().scope(), Scope::Module);
    assert_eq!(broadcast.id().destination(), BROADCAST_ADDRESS);
    assert_eq!(broadcast.data(), &[0x01, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_set_output_request_payload() {
    let request = Request::SetOutput {
        voltage: 500.0,
        current: 10.0,
    };
    assert_eq!(request.command(), CommandCode::SetOutput);
    assert_eq!(
        request.payload(),
        pack_u32_pair(500_000, 10_000)
    );

    let fixed = Request::SetOutputFixed {
        voltage: 0.1,
        current: 2.5,
    };
    assert_eq!(fixed.command(), CommandCode::SetOutputFixed);
    assert_eq!(output_payload(0.1, 2.5), pack_u32_pair(100, 2_500));
}

#[test]
fn test_decode_measurement_replies() {
    let float = reply(0x03, 0x00, &pack_f32_pair(500.0, 5.0));
    assert_eq!(
        DecodedReply::decode(&float).unwrap(),
        DecodedReply::Measurement {
            voltage: 500.0,
            current: 5.0
        }
    );

    let fixed = reply(0x08, 0x00, &pack_u32_pair(500_000, 5_000));
    assert_eq!(
        DecodedReply::decode(&fixed).unwrap(),
        DecodedReply::FixedMeasurement {
            voltage_mv: 500_000,
            current_ma: 5_000
        }
    );
}

#[test]
fn test_decode_info_and_external_replies() {
    let info = reply(0x0A, 0x00, &pack_u16_quad([7500, 1000, 256, 1500]));
    assert_eq!(
        DecodedReply::decode(&info).unwrap(),
        DecodedReply::Info {
            voltage_max: 750.0,
            voltage_min: 100.0,
            max_current: 25.6,
            rated_power: 15_000.0
        }
    );

    let external = reply(0x0C, 0x00, &pack_u16_quad([5000, 256, 0, 0]));
    assert_eq!(
        DecodedReply::decode(&external).unwrap(),
        DecodedReply::External {
            voltage: 500.0,
            allowed_current: 25.6
        }
    );
}

#[test]
fn test_decode_status_and_power_replies() {
    let status = reply(0x04, 0x00, &[0, 0, 0, 0, 25, 0, 0, 0]);
    assert_eq!(
        DecodedReply::decode(&status).unwrap(),
        DecodedReply::Status {
            status_bytes: [0; 4],
            temperature_c: 25
        }
    );

    let power = reply(0x1A, 0x00, &[0x01, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(
        DecodedReply::decode(&power).unwrap(),
        DecodedReply::PowerState { powered_on: false }
    );
}

#[test]
fn test_decode_heartbeat_and_unknown() {
    let heartbeat = Frame::new(Identifier::heartbeat(0x09), &[0; 8]).unwrap();
    assert_eq!(
        DecodedReply::decode(&heartbeat).unwrap(),
        DecodedReply::Heartbeat { module_id: 0x09 }
    );

    let unknown = reply(0x22, 0x00, &[1, 2]);
    assert!(matches!(
        DecodedReply::decode(&unknown).unwrap(),
        DecodedReply::Unknown { command: 0x22, .. }
    ));
}

#[test]
fn test_decode_undersized_reply_is_an_error() {
    let short = reply(0x1B, 0x00, &[0, 0, 0]);
    assert_eq!(
        DecodedReply::decode(&short),
        Err(PayloadError::TooShort {
            needed: 8,
            actual: 3
        })
    );

    let empty_status = reply(0x04, 0x00, &[]);
    assert!(DecodedReply::decode(&empty_status).is_err());
}

#[test]
fn test_decoded_reply_serializes_with_kind_tag() {
    let json = serde_json::to_value(DecodedReply::PowerState { powered_on: true }).unwrap();
    assert_eq!(json["kind"], "power_state");
    assert_eq!(json["powered_on"], true);
}

/// Answers every frame on `bus` through a router until the bus closes.
fn spawn_responder(bus: LoopbackBus, module_id: u8) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut router = CommandRouter::new(DeviceState::new(module_id, 0x00));
        while let Ok(frame) = bus.recv().await {
            if let Some(reply) = router.handle_frame(&frame) {
                let _ = bus.send(&reply).await;
            }
        }
    })
}

#[tokio::test]
async fn test_client_request_receives_matching_reply() {
    let bus = Arc::new(LoopbackBus::new());
    let responder = spawn_responder(bus.endpoint(), 0x02);
    let client = BusClient::new(Arc::clone(&bus));

    let frame = client
        .request(Request::PowerOn, Target::Module(0x02), Duration::from_millis(500))
        .await
        .unwrap()
        .expect("module answers unicast power-on");

    assert_eq!(frame.id().source(), 0x02);
    assert_eq!(frame.id().destination(), MONITOR_ADDRESS);
    assert_eq!(
        DecodedReply::decode(&frame).unwrap(),
        DecodedReply::PowerState { powered_on: true }
    );

    let frame = client
        .request(Request::ReadModule, Target::Module(0x02), Duration::from_millis(500))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        DecodedReply::decode(&frame).unwrap(),
        DecodedReply::Measurement {
            voltage: 500.0,
            current: 5.0
        }
    );

    responder.abort();
}

#[tokio::test]
async fn test_client_request_times_out_on_silence() {
    let bus = Arc::new(LoopbackBus::new());
    let responder = spawn_responder(bus.endpoint(), 0x02);
    let client = BusClient::new(Arc::clone(&bus));

    let reply = client
        .request(Request::PowerOff, Target::Broadcast, Duration::from_millis(100))
        .await
        .unwrap();
    assert!(reply.is_none());

    let reply = client
        .request(Request::ReadModule, Target::Module(0x07), Duration::from_millis(100))
        .await
        .unwrap();
    assert!(reply.is_none());

    responder.abort();
}
