//! Big-endian numeric payload codecs.
//!
//! Every multi-byte field on the bus is big-endian. Unpackers read from the
//! front of the slice and report [`PayloadError::TooShort`] instead of
//! indexing past the end.

use crate::error::PayloadError;

pub const MAX_PAYLOAD_LEN: usize = 8;

/// Frame data, at most eight bytes.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_LEN>;

pub fn pack_f32_be(value: f32) -> [u8; 4] {
    value.to_be_bytes()
}

pub fn unpack_f32_be(bytes: &[u8]) -> Result<f32, PayloadError> {
    take::<4>(bytes, 0).map(f32::from_be_bytes)
}

pub fn pack_u32_be(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

pub fn unpack_u32_be(bytes: &[u8]) -> Result<u32, PayloadError> {
    take::<4>(bytes, 0).map(u32::from_be_bytes)
}

pub fn pack_u16_be(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn unpack_u16_be(bytes: &[u8]) -> Result<u16, PayloadError> {
    take::<2>(bytes, 0).map(u16::from_be_bytes)
}

/// Two IEEE-754 singles, e.g. voltage then current.
pub fn pack_f32_pair(first: f32, second: f32) -> Payload {
    let mut buf = [0u8; MAX_PAYLOAD_LEN];
    buf[..4].copy_from_slice(&pack_f32_be(first));
    buf[4..].copy_from_slice(&pack_f32_be(second));
    buf.into_iter().collect()
}

pub fn unpack_f32_pair(bytes: &[u8]) -> Result<(f32, f32), PayloadError> {
    ensure_len(bytes, 8)?;
    Ok((
        f32::from_be_bytes(take::<4>(bytes, 0)?),
        f32::from_be_bytes(take::<4>(bytes, 4)?),
    ))
}

/// Two fixed-point words, e.g. millivolts then milliamps.
pub fn pack_u32_pair(first: u32, second: u32) -> Payload {
    let mut buf = [0u8; MAX_PAYLOAD_LEN];
    buf[..4].copy_from_slice(&pack_u32_be(first));
    buf[4..].copy_from_slice(&pack_u32_be(second));
    buf.into_iter().collect()
}

pub fn unpack_u32_pair(bytes: &[u8]) -> Result<(u32, u32), PayloadError> {
    ensure_len(bytes, 8)?;
    Ok((
        u32::from_be_bytes(take::<4>(bytes, 0)?),
        u32::from_be_bytes(take::<4>(bytes, 4)?),
    ))
}

pub fn pack_u16_quad(values: [u16; 4]) -> Payload {
    values.iter().flat_map(|value| pack_u16_be(*value)).collect()
}

pub fn unpack_u16_quad(bytes: &[u8]) -> Result<[u16; 4], PayloadError> {
    ensure_len(bytes, 8)?;
    let mut values = [0u16; 4];
    for (index, value) in values.iter_mut().enumerate() {
        *value = u16::from_be_bytes(take::<2>(bytes, index * 2)?);
    }
    Ok(values)
}

/// Copies `bytes` into a payload, failing above eight bytes.
pub fn payload_from_slice(bytes: &[u8]) -> Result<Payload, PayloadError> {
    Payload::from_slice(bytes).map_err(|()| PayloadError::TooLong(bytes.len()))
}

/// Copies `bytes` into a payload and zero-pads it to eight bytes.
pub fn padded(bytes: &[u8]) -> Result<Payload, PayloadError> {
    let mut payload = payload_from_slice(bytes)?;
    payload.resize_default(MAX_PAYLOAD_LEN).map_err(|()| PayloadError::TooLong(bytes.len()))?;
    Ok(payload)
}

/// Scales a physical value into a fixed-point unsigned field. Truncates
/// toward zero; negative and NaN inputs clamp to 0, overflow saturates.
pub fn to_fixed_u32(value: f64, scale: f64) -> u32 {
    (value * scale) as u32
}

/// Same as [`to_fixed_u32`] for 16-bit fields.
pub fn to_fixed_u16(value: f64, scale: f64) -> u16 {
    (value * scale) as u16
}

fn ensure_len(bytes: &[u8], needed: usize) -> Result<(), PayloadError> {
    if bytes.len() < needed {
        return Err(PayloadError::TooShort {
            needed,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn take<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N], PayloadError> {
    ensure_len(bytes, offset + N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    Ok(out)
}
