/// Device range status to user status code, indexed by the low 5 bits of
/// `RESULT__RANGE_STATUS`. `255` means the device reported nothing usable.
const STATUS_RTN: [u8; 24] = [
    255, 255, 255, 5, 2, 4, 1, 7, 3, 0, 255, 255, 9, 13, 255, 255, 255, 255, 10, 6, 255, 255, 11,
    12,
];

/// Map a raw `RESULT__RANGE_STATUS` value to the user status code
pub fn map_range_status(raw: u8) -> u8 {
    STATUS_RTN
        .get(usize::from(raw & 0x1F))
        .copied()
        .unwrap_or(255)
}

/// Big-endian word at `offset`
pub fn be_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}
