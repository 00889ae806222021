//! Field-level helpers shared by the protocol builders.

use crate::EncodeError;

/// CRC-16/X-25 (a.k.a. CRC-ITU as GT06 documents it).
///
/// Polynomial 0x1021 processed LSB-first (reflected constant 0x8408),
/// initial value 0xFFFF, final XOR 0xFFFF.
pub fn crc_itu(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0x8408;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

/// Reduces an upstream device id to the `width` digits a protocol expects.
///
/// The id is left-padded with zeros to 20 characters, every non-digit is
/// dropped, and the rightmost `width` digits are kept. Ids that contain
/// fewer digits than `width` come out zero-padded.
pub fn normalize_device_id(device_id: &str, width: usize) -> String {
    let padded = format!("{device_id:0>20}");
    let digits: String = padded.chars().filter(char::is_ascii_digit).collect();
    if digits.len() >= width {
        digits[digits.len() - width..].to_string()
    } else {
        format!("{digits:0>width$}")
    }
}

/// Packs a string of decimal digits as BCD, two digits per byte.
///
/// An odd number of digits gets a leading zero nibble.
pub fn digits_to_bcd(digits: &str) -> Result<Vec<u8>, EncodeError> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(EncodeError::InvalidIdentity(digits.to_string()));
    }

    let padded = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits.to_string()
    };

    Ok(padded
        .as_bytes()
        .chunks(2)
        .map(|pair| ((pair[0] - b'0') << 4) | (pair[1] - b'0'))
        .collect())
}

/// Validates a required coordinate and returns it.
pub(crate) fn coordinate(
    value: Option<f64>,
    field: &'static str,
    limit: f64,
) -> Result<f64, EncodeError> {
    let value = value.ok_or(EncodeError::MissingField(field))?;
    if !value.is_finite() || value.abs() > limit {
        return Err(EncodeError::out_of_range(field, value));
    }
    Ok(value)
}

/// Validates an optional reading against `0..=max`.
pub(crate) fn bounded(
    value: Option<f64>,
    field: &'static str,
    max: f64,
) -> Result<Option<f64>, EncodeError> {
    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && (0.0..=max).contains(&v) => Ok(Some(v)),
        Some(v) => Err(EncodeError::out_of_range(field, v)),
    }
}

/// Validates an optional heading against `0..=359`.
pub(crate) fn heading(value: Option<u16>) -> Result<Option<u16>, EncodeError> {
    match value {
        Some(h) if h > 359 => Err(EncodeError::out_of_range("heading", h)),
        other => Ok(other),
    }
}
