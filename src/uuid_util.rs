//! UUID normalization for GATT services and characteristics.
//!
//! Sixteen-bit shorthand identifiers expand into the Bluetooth base UUID
//! `0000xxxx-0000-1000-8000-00805f9b34fb` by substituting the shorthand into
//! the first 32 bits.

use uuid::Uuid;

use crate::{Error, Result};

/// The Bluetooth base UUID with a zeroed 16-bit slot.
const BASE_UUID: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0x80, 0x5f, 0x9b, 0x34, 0xfb,
];

/// Expands a 16-bit shorthand into its full 128-bit UUID.
pub fn number_to_uuid(n: u16) -> Uuid {
    let mut bytes = BASE_UUID;
    bytes[2] = (n >> 8) as u8;
    bytes[3] = (n & 0xff) as u8;
    Uuid::from_bytes(bytes)
}

/// Parses either a full 128-bit UUID string (any case, with or without
/// hyphens) or a 4-hex-digit shorthand into the canonical 128-bit form.
pub fn normalize_uuid(input: &str) -> Result<Uuid> {
    let trimmed = input.trim();
    if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        let n = u16::from_str_radix(trimmed, 16)
            .map_err(|_| Error::InvalidUuid(input.to_string()))?;
        return Ok(number_to_uuid(n));
    }
    Uuid::parse_str(trimmed).map_err(|_| Error::InvalidUuid(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_shorthand_into_base_uuid() {
        let hr = number_to_uuid(0x180d);
        assert_eq!(hr.to_string(), "0000180d-0000-1000-8000-00805f9b34fb");
        let battery = number_to_uuid(0x180f);
        assert_eq!(battery.to_string(), "0000180f-0000-1000-8000-00805f9b34fb");
    }

    #[test]
    fn shorthand_string_matches_numeric_expansion() {
        assert_eq!(normalize_uuid("180d").unwrap(), number_to_uuid(0x180d));
        assert_eq!(normalize_uuid("180D").unwrap(), number_to_uuid(0x180d));
        assert_eq!(normalize_uuid("0000").unwrap(), number_to_uuid(0x0000));
    }

    #[test]
    fn full_form_is_case_insensitive() {
        let lower = normalize_uuid("0000180d-0000-1000-8000-00805f9b34fb").unwrap();
        let upper = normalize_uuid("0000180D-0000-1000-8000-00805F9B34FB").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn normalization_is_idempotent() {
        for n in [0x0000u16, 0x180d, 0x2a37, 0xffff] {
            let once = number_to_uuid(n);
            let twice = normalize_uuid(&once.to_string()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn rejects_malformed_input() {
        for input in ["", "xyz", "180", "180dd", "not-a-uuid", "0000180d-0000"] {
            assert!(matches!(normalize_uuid(input), Err(Error::InvalidUuid(_))));
        }
    }
}
