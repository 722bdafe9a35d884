//! CRC-16-CCITT checksum over AIS payload bits
//!
//! The transmitter appends a 16-bit CRC (polynomial x^16 + x^12 + x^5 + 1,
//! register preset and final xor all-ones) computed over the destuffed data
//! bits. Verification is bit-serial to match the on-air representation: the
//! frame is still a bit vector at this point, not bytes.

/// CRC register width in bits.
pub const CRC_WIDTH: usize = 16;

/// x^16 + x^12 + x^5 + 1, MSB-first over 17 bits.
const POLY: [u8; 17] = [1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1];

/// Compute the CRC-16 of `bits`, returned MSB-first as `CRC_WIDTH` bits.
pub fn compute_crc(bits: &[u8]) -> Vec<u8> {
    // Augmented message: data bits, zero-extended by the register width,
    // with the preset xored into the leading bits.
    let mut augmented = Vec::with_capacity(bits.len() + CRC_WIDTH);
    augmented.extend_from_slice(bits);
    augmented.extend(std::iter::repeat(0).take(CRC_WIDTH));
    for bit in augmented.iter_mut().take(CRC_WIDTH) {
        *bit ^= 1;
    }

    let mut reg = [0u8; CRC_WIDTH + 1];
    reg[1..].copy_from_slice(&augmented[..CRC_WIDTH]);
    for &next in &augmented[CRC_WIDTH..] {
        reg.copy_within(1.., 0);
        reg[CRC_WIDTH] = next;
        if reg[0] == 1 {
            for (r, p) in reg.iter_mut().zip(POLY.iter()) {
                *r ^= p;
            }
        }
    }

    reg[1..].iter().map(|&b| b ^ 1).collect()
}

/// Check a frame whose last `CRC_WIDTH` bits carry the transmitted CRC.
///
/// Returns `None` when the frame is too short to hold a checksum at all;
/// otherwise whether the recomputed CRC matches the transmitted one.
pub fn verify_checksum(frame: &[u8]) -> Option<bool> {
    if frame.len() < CRC_WIDTH {
        return None;
    }
    let (data, transmitted) = frame.split_at(frame.len() - CRC_WIDTH);
    Some(compute_crc(data) == transmitted)
}
