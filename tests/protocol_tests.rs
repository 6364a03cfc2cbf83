use chargebus::error::{FrameError, IdentifierError, PayloadError};
use chargebus::protocol::payload::*;
use chargebus::protocol::*;

#[test]
fn test_encode_id_packs_fields_msb_first() {
    let raw = encode_id(0, 0x0A, 0x1A, 0x00, 0xF0).unwrap();
    assert_eq!(raw, 0x029A_00F0);

    let all_ones = encode_id(7, 0x0F, 0x3F, 0xFF, 0xFF).unwrap();
    assert_eq!(all_ones, 0x1FFF_FFFF);
}

#[test]
fn test_decode_id_inverts_encode() {
    let samples = [
        (0u8, 0x0Au8, 0x01u8, 0x00u8, 0xF0u8),
        (0, 0x0B, 0x1B, 0x3F, 0x05),
        (3, 0x02, 0x3F, 0x80, 0x00),
        (7, 0x0F, 0x00, 0xFF, 0xFF),
    ];

    for (err, scope, cmd, dest, src) in samples {
        let raw = encode_id(err, scope, cmd, dest, src).unwrap();
        assert!(raw <= 0x1FFF_FFFF);
        assert_eq!(decode_id(raw), (err, scope, cmd, dest, src));
    }
}

#[test]
fn test_encode_id_rejects_oversized_fields() {
    assert_eq!(
        encode_id(8, 0x0A, 0x01, 0x00, 0x00),
        Err(IdentifierError::ErrorCodeOutOfRange(8))
    );
    assert_eq!(
        encode_id(0, 0x10, 0x01, 0x00, 0x00),
        Err(IdentifierError::ScopeOutOfRange(0x10))
    );
    assert_eq!(
        encode_id(0, 0x0A, 0x40, 0x00, 0x00),
        Err(IdentifierError::CommandOutOfRange(0x40))
    );
}

#[test]
fn test_decode_id_ignores_bits_above_28() {
    let raw = encode_id(0, 0x0A, 0x03, 0x01, 0xF0).unwrap();
    assert_eq!(decode_id(raw | 0xE000_0000), decode_id(raw));
    assert!(Identifier::try_from_raw(raw | 0x2000_0000).is_err());
}

#[test]
fn test_heartbeat_identifier_layout() {
    let id = Identifier::heartbeat(0x05);
    assert_eq!(id.to_raw(), 0x0757_F805);
    assert_eq!(decode_id(HEARTBEAT_ID_BASE), (1, 0x0D, 0x17, 0xF8, 0x00));
    assert_eq!(id.command(), HEARTBEAT_COMMAND);
    assert_eq!(id.source(), 0x05);
    assert!(id.is_heartbeat());
    assert_eq!(id.scope(), Scope::Other(0x0D));
}

#[test]
fn test_request_identifier_is_not_heartbeat() {
    let id = Identifier::request(Scope::Module, 0x17, 0xF8, 0x05).unwrap();
    assert!(!id.is_heartbeat());
}

#[test]
fn test_reply_identifier_swaps_addresses() {
    let request = Identifier::request(Scope::Group, 0x1B, 0x02, 0xF0).unwrap();
    let reply = Identifier::reply_to(&request, 0x07);

    assert_eq!(reply.error_code(), 0);
    assert_eq!(reply.scope(), Scope::Module);
    assert_eq!(reply.command(), 0x1B);
    assert_eq!(reply.destination(), 0xF0);
    assert_eq!(reply.source(), 0x07);
}

#[test]
fn test_scope_codes() {
    assert_eq!(Scope::from_code(0x0A), Scope::Module);
    assert_eq!(Scope::from_code(0x0B), Scope::Group);
    assert_eq!(Scope::from_code(0x03), Scope::Other(0x03));
    assert_eq!(Scope::Module.code(), 0x0A);
    assert_eq!(Scope::Group.code(), 0x0B);
}

#[test]
fn test_command_codes_round_trip() {
    for command in CommandCode::ALL {
        assert_eq!(CommandCode::from_code(command.code()), Some(command));
        assert!(command.code() <= 0x3F);
    }
    assert_eq!(CommandCode::from_code(0x02), None);
    assert_eq!(CommandCode::from_code(HEARTBEAT_COMMAND), None);
}

#[test]
fn test_float_pair_is_big_endian() {
    let payload = pack_f32_pair(500.0, 5.0);
    assert_eq!(&payload[..], &[0x43, 0xFA, 0x00, 0x00, 0x40, 0xA0, 0x00, 0x00]);
    assert_eq!(unpack_f32_pair(&payload).unwrap(), (500.0, 5.0));
}

#[test]
fn test_u32_pair_is_big_endian() {
    let payload = pack_u32_pair(500_000, 10_000);
    assert_eq!(&payload[..], &[0x00, 0x07, 0xA1, 0x20, 0x00, 0x00, 0x27, 0x10]);
    assert_eq!(unpack_u32_pair(&payload).unwrap(), (500_000, 10_000));
}

#[test]
fn test_u16_quad_is_big_endian() {
    let payload = pack_u16_quad([7500, 1000, 256, 1500]);
    assert_eq!(&payload[..], &[0x1D, 0x4C, 0x03, 0xE8, 0x01, 0x00, 0x05, 0xDC]);
    assert_eq!(unpack_u16_quad(&payload).unwrap(), [7500, 1000, 256, 1500]);
}

#[test]
fn test_undersized_payloads_are_errors() {
    assert_eq!(
        unpack_u32_pair(&[0, 0, 0, 1]),
        Err(PayloadError::TooShort {
            needed: 8,
            actual: 4
        })
    );
    assert!(unpack_f32_pair(&[]).is_err());
    assert!(unpack_u16_quad(&[0; 7]).is_err());
    assert!(unpack_u32_be(&[0, 1, 2]).is_err());
    assert!(unpack_u16_be(&[0]).is_err());
}

#[test]
fn test_fixed_point_scaling_truncates_and_clamps() {
    assert_eq!(to_fixed_u32(500.0, 1000.0), 500_000);
    assert_eq!(to_fixed_u32(0.0015, 1000.0), 1);
    assert_eq!(to_fixed_u32(-3.0, 1000.0), 0);
    assert_eq!(to_fixed_u16(750.0, 10.0), 7500);
    assert_eq!(to_fixed_u16(1.0e9, 10.0), u16::MAX);
}

#[test]
fn test_padded_payload() {
    let payload = padded(&[0x01]).unwrap();
    assert_eq!(&payload[..], &[0x01, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(padded(&[0; 9]), Err(PayloadError::TooLong(9)));
}

#[test]
fn test_frame_datagram_layout() {
    let id = Identifier::request(Scope::Module, 0x1A, 0x00, 0xF0).unwrap();
    let frame = Frame::new(id, &[0x01, 0, 0, 0, 0, 0, 0, 0]).unwrap();
    let bytes = frame.encode();

    assert_eq!(bytes.len(), DATAGRAM_LEN);
    assert_eq!(&bytes[..4], &[0x82, 0x9A, 0x00, 0xF0]);
    assert_eq!(bytes[4], 8);
    assert_eq!(bytes[5], 0x01);

    assert_eq!(Frame::decode(&bytes).unwrap(), frame);
}

#[test]
fn test_frame_short_payload_is_zero_padded_on_wire() {
    let id = Identifier::request(Scope::Module, 0x04, 0x00, 0xF0).unwrap();
    let frame = Frame::new(id, &[0xAA, 0xBB]).unwrap();
    let bytes = frame.encode();

    assert_eq!(bytes[4], 2);
    assert_eq!(&bytes[5..], &[0xAA, 0xBB, 0, 0, 0, 0, 0, 0]);

    let decoded = Frame::decode(&bytes).unwrap();
    assert_eq!(decoded.data(), &[0xAA, 0xBB]);
}

#[test]
fn test_frame_decode_rejects_malformed_datagrams() {
    let id = Identifier::request(Scope::Module, 0x01, 0x00, 0xF0).unwrap();
    let mut bytes = Frame::new(id, &[0; 8]).unwrap().encode();

    assert_eq!(
        Frame::decode(&bytes[..12]),
        Err(FrameError::InvalidLength(12))
    );

    bytes[4] = 9;
    assert_eq!(Frame::decode(&bytes), Err(FrameError::InvalidDlc(9)));

    bytes[4] = 8;
    bytes[0] &= 0x7F;
    assert_eq!(Frame::decode(&bytes), Err(FrameError::NotExtended));

    bytes[0] = 0xE0;
    assert!(matches!(
        Frame::decode(&bytes),
        Err(FrameError::Identifier(IdentifierError::RawOutOfRange(_)))
    ));
}

#[test]
fn test_frame_rejects_oversized_data() {
    let id = Identifier::request(Scope::Module, 0x01, 0x00, 0xF0).unwrap();
    assert_eq!(Frame::new(id, &[0; 9]), Err(PayloadError::TooLong(9)));
}

#[test]
fn test_encode_decode_over_every_field_combination() {
    let edges = [0x00u8, 0x01, 0x3F, 0x80, 0xFF];

    for err in 0u8..=7 {
        for scope in 0u8..=0x0F {
            for cmd in 0u8..=0x3F {
                for dest in edges {
                    for src in edges {
                        let raw = encode_id(err, scope, cmd, dest, src).unwrap();
                        assert!(raw <= 0x1FFF_FFFF);
                        assert_eq!(decode_id(raw), (err, scope, cmd, dest, src));
                    }
                }
            }
        }
    }
}

#[test]
fn test_identifier_scope_is_canonical() {
    let built = Identifier::new(0, Scope::Other(0x0A), 0x1A, 0x00, 0xF0).unwrap();
    let decoded = Identifier::from_raw(built.to_raw());

    assert_eq!(built.scope(), Scope::Module);
    assert_eq!(built, decoded);
    assert_eq!(
        Identifier::new(0, Scope::Other(0x0B), 0x1A, 0x00, 0xF0).unwrap().scope(),
        Scope::Group
    );
    assert_eq!(
        Identifier::for_command(Scope::Other(0x0A), CommandCode::PowerControl, 0x00, 0xF0),
        built
    );
}

#[test]
fn test_identifier_serializes_as_raw_value() {
    let id = Identifier::request(Scope::Module, 0x1A, 0x00, 0xF0).unwrap();
    assert_eq!(serde_json::to_string(&id).unwrap(), "43647216");
    assert_eq!(serde_json::from_str::<Identifier>("43647216").unwrap(), id);
}

#[test]
fn test_identifier_deserialize_rejects_wide_values() {
    assert!(serde_json::from_str::<Identifier>("4294967295").is_err());
    assert!(serde_json::from_str::<Identifier>("536870912").is_err());
    assert!(serde_json::from_str::<Identifier>(
        r#"{"error_code":0,"scope":"Module","command":255,"destination":0,"source":240}"#
    )
    .is_err());
}

#[test]
fn test_f32_pair_is_bit_exact_for_special_values() {
    let values = [
        0.0f32,
        -0.0,
        f32::INFINITY,
        f32::NEG_INFINITY,
        f32::MAX,
        f32::MIN,
        f32::MIN_POSITIVE,
        f32::from_bits(0x0000_0001),
        f32::from_bits(0x807F_FFFF),
        f32::from_bits(0x7FC0_1234),
        f32::from_bits(0xFFA0_0001),
        f32::EPSILON,
    ];

    for first in values {
        for second in values {
            let (a, b) = unpack_f32_pair(&pack_f32_pair(first, second)).unwrap();
            assert_eq!(a.to_bits(), first.to_bits());
            assert_eq!(b.to_bits(), second.to_bits());
        }
    }
}

#[test]
fn test_integer_codecs_at_bounds() {
    for (first, second) in [(0, 0), (u32::MAX, 0), (0, u32::MAX), (u32::MAX, u32::MAX)] {
        let payload = pack_u32_pair(first, second);
        assert_eq!(unpack_u32_pair(&payload).unwrap(), (first, second));
    }
    assert_eq!(&pack_u32_pair(u32::MAX, 0)[..], &[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);

    for quad in [[0, 0, 0, 0], [u16::MAX; 4], [0, u16::MAX, 1, u16::MAX - 1]] {
        assert_eq!(unpack_u16_quad(&pack_u16_quad(quad)).unwrap(), quad);
    }
    assert_eq!(unpack_u16_be(&pack_u16_be(u16::MAX)).unwrap(), u16::MAX);
    assert_eq!(unpack_u32_be(&pack_u32_be(0)).unwrap(), 0);
}
