//! Integrity trailers for both wire formats.
//!
//! Compact packets end in the XOR of every preceding byte. Telemetry frames end
//! in a CRC-8 (polynomial 0x31, seed 0xFF, MSB first, no final xor).

/// CRC-8 polynomial x^8 + x^5 + x^4 + 1
pub const CRC8_POLY: u8 = 0x31;

/// CRC-8 seed used by telemetry frames
pub const CRC8_SEED: u8 = 0xFF;

static CRC8_TABLE: [u8; 256] = build_crc8_table();

const fn build_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// XOR of all bytes
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// CRC-8 (Dallas/Maxim polynomial) with an explicit seed
pub fn crc8(data: &[u8], seed: u8) -> u8 {
    crc8_update(seed, data)
}

/// Continue a CRC-8 computation over more data
pub fn crc8_update(mut crc: u8, data: &[u8]) -> u8 {
    for &byte in data {
        crc = CRC8_TABLE[(crc ^ byte) as usize];
    }
    crc
}

/// Split `packet` into body and trailer and check the trailer against `compute(body)`.
///
/// Returns the body on success.
pub(crate) fn verify_trailer(
    packet: &[u8],
    compute: impl Fn(&[u8]) -> u8,
) -> Result<&[u8], crate::WireError> {
    let (trailer, body) = packet.split_last().ok_or(crate::WireError::Length {
        kind: "packet",
        expected: 1,
        actual: 0,
    })?;
    let expected = compute(body);
    if expected != *trailer {
        return Err(crate::WireError::Checksum {
            expected,
            actual: *trailer,
        });
    }
    Ok(body)
}
