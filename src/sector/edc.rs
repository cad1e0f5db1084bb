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

    src/sector/edc.rs

    The Mode 1 sector Error Detection Code: a reflected CRC32 with the
    CD-ROM polynomial, computed over bytes 0..2064 and stored little-endian
    at offset 2064.

*/

use std::sync::OnceLock;

/// Reflected CD-ROM EDC polynomial.
const EDC_POLY: u32 = 0xD801_8001;

/// Offset of the stored 32-bit EDC word in a raw sector.
pub const EDC_OFFSET: usize = 2064;
/// The EDC covers this many bytes (sync + header + user data).
pub const EDC_COVERAGE: usize = 2064;

fn edc_table() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut edc = i as u32;
            for _ in 0..8 {
                edc = (edc >> 1) ^ if edc & 1 != 0 { EDC_POLY } else { 0 };
            }
            *entry = edc;
        }
        table
    })
}

/// Compute the EDC checksum over `data`.
pub fn edc_checksum(data: &[u8]) -> u32 {
    let table = edc_table();
    let mut crc: u32 = 0;
    for &byte in data {
        crc = (crc >> 8) ^ table[((crc ^ byte as u32) & 0xFF) as usize];
    }
    crc
}

/// Read the little-endian EDC word stored in a raw sector.
pub fn stored_edc(sector: &[u8]) -> u32 {
    u32::from_le_bytes([
        sector[EDC_OFFSET],
        sector[EDC_OFFSET + 1],
        sector[EDC_OFFSET + 2],
        sector[EDC_OFFSET + 3],
    ])
}

/// Check a raw sector's payload against its stored EDC word.
pub fn edc_valid(sector: &[u8]) -> bool {
    stored_edc(sector) == edc_checksum(&sector[..EDC_COVERAGE])
}
