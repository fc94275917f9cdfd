//! CRC-32/MPEG-2 as used by PSI and SCTE-35 sections.
//!
//! Polynomial 0x04C11DB7, initial value 0xFFFFFFFF, MSB first, no final
//! XOR. Running it over a whole section including its trailing CRC_32
//! field yields zero.

const POLYNOMIAL: u32 = 0x04C1_1DB7;

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut value = (n as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            value = if value & 0x8000_0000 != 0 {
                (value << 1) ^ POLYNOMIAL
            } else {
                value << 1
            };
            bit += 1;
        }
        table[n] = value;
        n += 1;
    }
    table
}

static TABLE: [u32; 256] = build_table();

/// Compute CRC-32/MPEG-2 over `data`.
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    data.iter().fold(0xFFFF_FFFF, |crc, &byte| {
        (crc << 8) ^ TABLE[((crc >> 24) as u8 ^ byte) as usize]
    })
}

/// Stored CRC_32 of a section (its last four bytes).
pub fn stored_crc(section: &[u8]) -> Option<u32> {
    let tail = section.len().checked_sub(4)?;
    let bytes: [u8; 4] = section[tail..].try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Append the CRC_32 of `section` to it.
pub fn append_crc(section: &mut Vec<u8>) {
    let crc = crc32_mpeg2(section);
    section.extend_from_slice(&crc.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(crc32_mpeg2(b"123456789"), 0x0376_E6E7);
    }

    #[test]
    fn test_section_residue_is_zero() {
        let mut section = vec![0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00];
        append_crc(&mut section);
        assert_eq!(crc32_mpeg2(&section), 0);
        assert_eq!(stored_crc(&section), Some(crc32_mpeg2(&section[..8])));
    }

    #[test]
    fn test_stored_crc_short() {
        assert_eq!(stored_crc(&[1, 2, 3]), None);
    }
}
