/*
    efmdec
    https://github.com/dbalsom/efmdec

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/sector/scramble.rs

    The sector scramble table: bytes 12..2352 of a sector are XORed on disc
    with the output of a 15-bit LFSR (x^15 + x + 1, seeded with 1) to break
    up regular bit patterns. XOR is its own inverse, so the same table both
    scrambles and descrambles.

*/

use crate::types::RAW_SECTOR_LEN;
use std::sync::OnceLock;

fn build_scramble_table() -> [u8; RAW_SECTOR_LEN] {
    let mut table = [0u8; RAW_SECTOR_LEN];

    // The 12 sync bytes are never scrambled
    let mut register: u16 = 0x0001;
    for entry in table.iter_mut().skip(12) {
        let mut byte = 0u8;
        for bit in 0..8 {
            byte |= ((register & 1) as u8) << bit;
            let feedback = (register ^ (register >> 1)) & 1;
            register = (register >> 1) | (feedback << 14);
        }
        *entry = byte;
    }
    table
}

fn scramble_table() -> &'static [u8; RAW_SECTOR_LEN] {
    static TABLE: OnceLock<[u8; RAW_SECTOR_LEN]> = OnceLock::new();
    TABLE.get_or_init(build_scramble_table)
}

/// XOR a raw sector against the scramble table in place. Applying this
/// twice is the identity.
pub fn descramble(sector: &mut [u8; RAW_SECTOR_LEN]) {
    let table = scramble_table();
    for (byte, &mask) in sector.iter_mut().zip(table.iter()) {
        *byte ^= mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sequence_head() {
        // The first scrambled bytes of the LFSR sequence
        let table = scramble_table();
        assert_eq!(&table[..12], &[0u8; 12]);
        assert_eq!(table[12], 0x01);
        assert_eq!(table[13], 0x80);
    }

    #[test]
    fn self_inverse() {
        let mut sector = [0u8; RAW_SECTOR_LEN];
        for (i, byte) in sector.iter_mut().enumerate() {
            *byte = (i * 31) as u8;
        }
        let original = sector;

        descramble(&mut sector);
        assert_ne!(&sector[12..], &original[12..]);
        assert_eq!(&sector[..12], &original[..12]);

        descramble(&mut sector);
        assert_eq!(sector, original);
    }
}
