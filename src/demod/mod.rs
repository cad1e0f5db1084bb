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

    src/demod/mod.rs

    EFM demodulation: translation of 14-bit channel patterns to 8-bit data
    symbols, with nearest-match correction for invalid patterns, plus
    conversion of a T-value run-length sequence into a demodulated F3 frame.

*/

//! The `demod` module implements Eight-to-Fourteen demodulation.
//!
//! EFM maps each 8-bit data symbol to a 14-bit run-length-limited channel
//! pattern. Demodulation reverses that mapping. A pattern damaged in
//! transit may not appear in the table at all; rather than fail, we
//! substitute the nearest valid pattern (minimum Hamming distance) and set
//! the symbol's error flag so downstream Reed-Solomon stages can treat the
//! position as an erasure. Translation therefore never fails - every
//! 14-bit value yields a byte.
//!
//! The translation tables are immutable and built once on first use; they
//! may be shared freely across pipeline instances and threads.

use crate::{
    types::{F3Frame, FrameType, F3_DATA_LEN},
    EfmError,
};
use bit_vec::BitVec;
use std::sync::OnceLock;

/// Number of channel bits in one F3 frame.
pub const FRAME_CHANNEL_BITS: usize = 588;
/// Number of 14-bit symbols in one F3 frame (1 subcode + 32 data).
pub const FRAME_SYMBOLS: usize = 33;
/// Channel bits taken by the frame sync pattern plus its merging bits.
const SYNC_BITS: usize = 24 + 3;
/// Channel bits per symbol including merging bits.
const SYMBOL_BITS: usize = 14 + 3;

/// Reserved channel pattern marking the first frame of a subcode section.
pub const SYNC0_PATTERN: u16 = 0x801;
/// Reserved channel pattern marking the second frame of a subcode section.
pub const SYNC1_PATTERN: u16 = 0x012;

/// The canonical EFM table: the 14-bit channel pattern for each data symbol
/// 0-255, followed by the two reserved subcode sync patterns (entries 256
/// and 257).
#[rustfmt::skip]
pub const EFM_LUT: [u16; 258] = [
    0x1220, 0x2100, 0x2420, 0x2220, 0x1100, 0x0110, 0x0420, 0x0900, //   8
    0x1240, 0x2040, 0x2440, 0x2240, 0x1040, 0x0040, 0x0440, 0x0840, //  16
    0x2020, 0x2080, 0x2480, 0x0820, 0x1080, 0x0080, 0x0480, 0x0880, //  24
    0x1210, 0x2010, 0x2410, 0x2210, 0x1010, 0x0210, 0x0410, 0x0810, //  32
    0x0020, 0x2108, 0x0220, 0x0920, 0x1108, 0x0108, 0x1020, 0x0908, //  40
    0x1248, 0x2048, 0x2448, 0x2248, 0x1048, 0x0048, 0x0448, 0x0848, //  48
    0x0100, 0x2088, 0x2488, 0x2110, 0x1088, 0x0088, 0x0488, 0x0888, //  56
    0x1208, 0x2008, 0x2408, 0x2208, 0x1008, 0x0208, 0x0408, 0x0808, //  64
    0x1224, 0x2124, 0x2424, 0x2224, 0x1124, 0x0024, 0x0424, 0x0924, //  72
    0x1244, 0x2044, 0x2444, 0x2244, 0x1044, 0x0044, 0x0444, 0x0844, //  80
    0x2024, 0x2084, 0x2484, 0x0824, 0x1084, 0x0084, 0x0484, 0x0884, //  88
    0x1204, 0x2004, 0x2404, 0x2204, 0x1004, 0x0204, 0x0404, 0x0804, //  96
    0x1222, 0x2122, 0x2422, 0x2222, 0x1122, 0x0022, 0x1024, 0x0922, // 104
    0x1242, 0x2042, 0x2442, 0x2242, 0x1042, 0x0042, 0x0442, 0x0842, // 112
    0x2022, 0x2082, 0x2482, 0x0822, 0x1082, 0x0082, 0x0482, 0x0882, // 120
    0x1202, 0x0248, 0x2402, 0x2202, 0x1002, 0x0202, 0x0402, 0x0802, // 128
    0x1221, 0x2121, 0x2421, 0x2221, 0x1121, 0x0021, 0x0421, 0x0921, // 136
    0x1241, 0x2041, 0x2441, 0x2241, 0x1041, 0x0041, 0x0441, 0x0841, // 144
    0x2021, 0x2081, 0x2481, 0x0821, 0x1081, 0x0081, 0x0481, 0x0881, // 152
    0x1201, 0x2090, 0x2401, 0x2201, 0x1090, 0x0201, 0x0401, 0x0890, // 160
    0x0221, 0x2109, 0x1110, 0x0121, 0x1109, 0x0109, 0x1021, 0x0909, // 168
    0x1249, 0x2049, 0x2449, 0x2249, 0x1049, 0x0049, 0x0449, 0x0849, // 176
    0x0120, 0x2089, 0x2489, 0x0910, 0x1089, 0x0089, 0x0489, 0x0889, // 184
    0x1209, 0x2009, 0x2409, 0x2209, 0x1009, 0x0209, 0x0409, 0x0809, // 192
    0x1120, 0x2111, 0x2490, 0x0224, 0x1111, 0x0111, 0x0490, 0x0911, // 200
    0x0241, 0x2101, 0x0244, 0x0240, 0x1101, 0x0101, 0x0090, 0x0901, // 208
    0x0124, 0x2091, 0x2491, 0x2120, 0x1091, 0x0091, 0x0491, 0x0891, // 216
    0x1211, 0x2011, 0x2411, 0x2211, 0x1011, 0x0211, 0x0411, 0x0811, // 224
    0x1102, 0x0102, 0x2112, 0x0902, 0x1112, 0x0112, 0x1022, 0x0912, // 232
    0x2102, 0x2104, 0x0249, 0x0242, 0x1104, 0x0104, 0x0422, 0x0904, // 240
    0x0122, 0x2092, 0x2492, 0x0222, 0x1092, 0x0092, 0x0492, 0x0892, // 248
    0x1212, 0x2012, 0x2412, 0x2212, 0x1012, 0x0212, 0x0412, 0x0812, // 256
    0x0801, 0x0012, // sync0 (256), sync1 (257)
];

/// Translation tables covering every possible 14-bit pattern. `value` is
/// the translated byte, `exact` is true only for the 256 canonical data
/// patterns.
struct DemodTables {
    value: Box<[u8; 16384]>,
    exact: Box<[bool; 16384]>,
}

fn build_demod_tables() -> DemodTables {
    let mut value = Box::new([0u8; 16384]);
    let mut exact = Box::new([false; 16384]);

    // Exact entries first
    for (byte, &pattern) in EFM_LUT.iter().take(256).enumerate() {
        value[pattern as usize] = byte as u8;
        exact[pattern as usize] = true;
    }

    // Every remaining pattern maps to the data pattern at minimum Hamming
    // distance, ties resolved to the lowest byte value
    for pattern in 0..16384u16 {
        if exact[pattern as usize] {
            continue;
        }

        let mut best_byte = 0u8;
        let mut best_distance = u32::MAX;
        for (byte, &candidate) in EFM_LUT.iter().take(256).enumerate() {
            let distance = (pattern ^ candidate).count_ones();
            if distance < best_distance {
                best_distance = distance;
                best_byte = byte as u8;
            }
        }
        value[pattern as usize] = best_byte;
    }

    DemodTables { value, exact }
}

fn demod_tables() -> &'static DemodTables {
    static TABLES: OnceLock<DemodTables> = OnceLock::new();
    TABLES.get_or_init(build_demod_tables)
}

/// Return the canonical 14-bit channel pattern for a data symbol 0-255, or
/// for the reserved sync symbols 256 (Sync0) and 257 (Sync1).
pub fn eight_to_fourteen(symbol: u16) -> u16 {
    EFM_LUT[symbol as usize]
}

/// Statistics maintained by an [`EfmDemodulator`].
#[derive(Copy, Clone, Debug, Default)]
pub struct DemodStatistics {
    pub valid_symbols: u64,
    pub corrected_symbols: u64,
    pub valid_tvalues: u64,
    pub invalid_tvalues: u64,
}

/// Translates 14-bit channel patterns to data symbols and assembles F3
/// frames from T-value sequences. Holds only diagnostic counters; the
/// translation tables themselves are shared and immutable.
#[derive(Default)]
pub struct EfmDemodulator {
    stats: DemodStatistics,
}

impl EfmDemodulator {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn statistics(&self) -> &DemodStatistics {
        &self.stats
    }

    pub fn reset_statistics(&mut self) {
        self.stats = Default::default();
    }

    /// Translate a 14-bit channel pattern to a data symbol. Returns the
    /// byte and true if the pattern was an exact table match; inexact
    /// patterns return the nearest-match byte and false.
    pub fn translate(&mut self, pattern: u16) -> (u8, bool) {
        let tables = demod_tables();
        let index = (pattern & 0x3FFF) as usize;
        let exact = tables.exact[index];

        if exact {
            self.stats.valid_symbols += 1;
        }
        else {
            self.stats.corrected_symbols += 1;
        }
        (tables.value[index], exact)
    }

    /// Convert a T-value sequence covering one 588-bit frame window into a
    /// demodulated F3 frame. T-values outside the legal [3,11] range are
    /// clamped and counted; they cannot be trusted but must not derail the
    /// rest of the frame.
    pub fn frame_from_tvalues(&mut self, tvalues: &[u8]) -> Result<F3Frame, EfmError> {
        if tvalues.is_empty() {
            return Err(EfmError::EmptyFrame);
        }

        // Expand the run lengths into a channel bitstream. Each T-value
        // represents a 1 followed by T-1 zeros. A frame is nominally 588
        // bits; leave headroom for overshoot so a bad T-value doesn't
        // push writes out of range.
        let mut bits = BitVec::from_elem(FRAME_CHANNEL_BITS + 16, false);
        let mut position = 0usize;
        for &t in tvalues {
            let t = if !(3..=11).contains(&t) {
                self.stats.invalid_tvalues += 1;
                t.clamp(3, 11)
            }
            else {
                self.stats.valid_tvalues += 1;
                t
            };

            if position < bits.len() {
                bits.set(position, true);
            }
            position += t as usize;
        }

        // Skip the 24-bit sync pattern and its merging bits, then pull the
        // 33 14-bit symbols, discarding 3 merging bits after each.
        let mut frame = F3Frame::default();
        let mut cursor = SYNC_BITS;

        let subcode_pattern = get_bits(&bits, cursor, 14);
        cursor += SYMBOL_BITS;

        match subcode_pattern {
            SYNC0_PATTERN => {
                frame.frame_type = FrameType::Sync0;
                frame.subcode = 0;
            }
            SYNC1_PATTERN => {
                frame.frame_type = FrameType::Sync1;
                frame.subcode = 0;
            }
            _ => {
                frame.frame_type = FrameType::Subcode;
                let (value, _exact) = self.translate(subcode_pattern);
                frame.subcode = value;
            }
        }

        for i in 0..F3_DATA_LEN {
            let pattern = get_bits(&bits, cursor, 14);
            cursor += SYMBOL_BITS;

            let (value, exact) = self.translate(pattern);
            frame.data[i] = value;
            frame.errors[i] = !exact;
        }

        Ok(frame)
    }
}

/// Extract `width` bits (MSB first) from a bit vector starting at `start`.
/// Reads past the end return zero bits.
fn get_bits(bits: &BitVec, start: usize, width: usize) -> u16 {
    let mut value = 0u16;
    for i in 0..width {
        value <<= 1;
        if bits.get(start + i).unwrap_or(false) {
            value |= 1;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_all_symbols() {
        let mut demod = EfmDemodulator::new();
        for byte in 0..=255u16 {
            let pattern = eight_to_fourteen(byte);
            let (value, exact) = demod.translate(pattern);
            assert_eq!(value as u16, byte);
            assert!(exact, "pattern {pattern:#06x} should be an exact match");
        }
        assert_eq!(demod.statistics().valid_symbols, 256);
    }

    #[test]
    fn translation_is_total() {
        // Every possible 14-bit pattern must translate to some byte, and
        // only canonical data patterns may report an exact match.
        let mut demod = EfmDemodulator::new();
        let mut exact_count = 0;
        for pattern in 0..16384u16 {
            let (_, exact) = demod.translate(pattern);
            if exact {
                exact_count += 1;
            }
        }
        assert_eq!(exact_count, 256);
    }

    #[test]
    fn sync_patterns_are_not_data() {
        // The subcode sync patterns are reserved; they must not collide
        // with any data pattern.
        assert!(!EFM_LUT[..256].contains(&SYNC0_PATTERN));
        assert!(!EFM_LUT[..256].contains(&SYNC1_PATTERN));
    }

    #[test]
    fn corrupt_pattern_corrects_to_nearest() {
        let mut demod = EfmDemodulator::new();
        // Flip one bit of the pattern for byte 0x42; the nearest valid
        // pattern should still be byte 0x42 (Hamming distance 1 vs >= 2
        // between any two valid patterns... not guaranteed in general, but
        // true for this particular flip).
        let clean = eight_to_fourteen(0x42);
        let dirty = clean ^ 0x0001;
        if !EFM_LUT[..256].contains(&dirty) {
            let (value, exact) = demod.translate(dirty);
            assert!(!exact);
            assert_eq!((dirty ^ eight_to_fourteen(value as u16)).count_ones(), 1);
        }
    }

    #[test]
    fn empty_tvalues_is_an_error() {
        let mut demod = EfmDemodulator::new();
        assert!(demod.frame_from_tvalues(&[]).is_err());
    }
}
