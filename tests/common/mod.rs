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

    tests/common/mod.rs

    Common support routines for tests: an EFM channel-frame encoder (the
    forward direction of the demodulator, with RLL-valid merging bits), a
    CIRC chain encoder that produces F3 frame streams decoding to a chosen
    payload, and a Mode 1 sector builder.

*/
#![allow(dead_code)]

use efmdec::{
    circ::{
        c2::{lane_delay, CURRENT_LANES, DELAYED_LANES},
        gf256,
        rs::RsCode,
    },
    demod::eight_to_fourteen,
    sector::{edc, rspc, scramble},
    types::{F3Frame, FrameType, RawSector, SectorAddress, RAW_SECTOR_LEN, SECTOR_SYNC_PATTERN},
};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// EFM channel encoding ------------------------------------------------------

/// The 24-bit F3 frame sync pattern: two maximal (T11) runs back to back.
const SYNC_PATTERN: u32 = 0b1000_0000_0001_0000_0000_0010;

/// Encodes F3 frames into a channel bitstream and finally T-values.
///
/// Merging bits are chosen to keep every run length within [3,11] and -
/// like a conforming encoder - to never place two T11 runs back to back,
/// since that pair is reserved for the frame sync. Some data patterns
/// carry an internal T11, so the boundary decision looks at the runs on
/// both sides, not just the gap it is filling.
pub struct ChannelEncoder {
    bits: Vec<bool>,
}

impl Default for ChannelEncoder {
    fn default() -> Self {
        ChannelEncoder { bits: Vec::new() }
    }
}

impl ChannelEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Append one F3 frame: sync, subcode symbol, 32 data symbols, each
    /// with its merging bits. One frame is exactly 588 channel bits.
    pub fn push_f3_frame(&mut self, frame: &F3Frame) {
        self.push_pattern(SYNC_PATTERN, 24);

        let subcode_symbol = match frame.frame_type {
            FrameType::Sync0 => 256,
            FrameType::Sync1 => 257,
            FrameType::Subcode => frame.subcode as u16,
        };
        self.push_pattern(eight_to_fourteen(subcode_symbol) as u32, 14);

        for &byte in frame.data.iter() {
            self.push_pattern(eight_to_fourteen(byte as u16) as u32, 14);
        }
    }

    /// Append merging bits followed by an `nbits`-wide channel pattern.
    fn push_pattern(&mut self, pattern: u32, nbits: usize) {
        let ones: Vec<usize> = (0..nbits).filter(|i| pattern & (1 << (nbits - 1 - i)) != 0).collect();
        let lead = ones.first().copied().unwrap_or(nbits);
        // The run following the pattern's first 1, when the pattern fixes
        // it; 0 means a later merging decision will settle it
        let next_run = if ones.len() >= 2 { ones[1] - ones[0] } else { 0 };

        self.push_merging(lead, next_run);
        for i in (0..nbits).rev() {
            self.bits.push(pattern & (1 << i) != 0);
        }
    }

    /// Append 3 merging bits ahead of a unit with `lead` leading zeros
    /// whose first internal run is `next_run`. All zeros when the joined
    /// run stays legal, otherwise a single 1 splitting it into two legal
    /// runs; in either case no T11 may end up adjacent to another T11.
    fn push_merging(&mut self, lead: usize, next_run: usize) {
        if self.bits.is_empty() {
            // Nothing to merge against at the very start of the stream
            self.bits.extend_from_slice(&[false; 3]);
            return;
        }

        let trail = self.bits.iter().rev().take_while(|&&b| !b).count();
        let prev_run = self.run_ending_at_last_one();

        let joined = trail + 3 + lead + 1;
        if joined <= 11 && !(joined == 11 && (prev_run == 11 || next_run == 11)) {
            self.bits.extend_from_slice(&[false; 3]);
            return;
        }

        for k in 0..3usize {
            let before = trail + k + 1;
            let after = (2 - k) + lead + 1;
            if !(3..=11).contains(&before) || !(3..=11).contains(&after) {
                continue;
            }
            if before == 11 && (prev_run == 11 || after == 11) {
                continue;
            }
            if after == 11 && (next_run == 11 || before == 11) {
                continue;
            }
            for i in 0..3 {
                self.bits.push(i == k);
            }
            return;
        }
        panic!("no legal merging bit position (trail {trail}, lead {lead})");
    }

    /// Length, in channel bits, of the run ending at the last 1 in the
    /// stream (the distance between the last two 1s).
    fn run_ending_at_last_one(&self) -> usize {
        let mut last = None;
        for (i, &bit) in self.bits.iter().enumerate().rev() {
            if bit {
                match last {
                    None => last = Some(i),
                    Some(end) => return end - i,
                }
            }
        }
        0
    }

    /// Close the stream with one more sync (so the framer can confirm the
    /// final frame) and convert to T-values.
    pub fn finish(mut self) -> Vec<u8> {
        self.push_pattern(SYNC_PATTERN, 24);
        // Terminate the sync's tail run
        self.bits.extend_from_slice(&[false, false, true]);

        bits_to_tvalues(&self.bits)
    }
}

/// Convert a bitstream to the run lengths between consecutive 1 bits.
pub fn bits_to_tvalues(bits: &[bool]) -> Vec<u8> {
    let mut tvalues = Vec::new();
    let mut last_one: Option<usize> = None;
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            if let Some(last) = last_one {
                tvalues.push((i - last) as u8);
            }
            last_one = Some(i);
        }
    }
    tvalues
}

// CIRC chain encoding -------------------------------------------------------

/// Generates an F3 frame stream whose decode through C1, C2 and the final
/// deinterleave yields a chosen Data24 payload stream.
///
/// Built as the exact inverse of the decode chain: payload frames map back
/// through the deinterleave lane tables to C2 codewords (with the four
/// middle parity lanes solved so each word is a valid RS(28,24) codeword),
/// back through the unequal delay lines to C1 blocks, which are RS(32,28)
/// encoded, parity-inverted and split across frame pairs. Payload frame
/// index m decodes out of the pipeline once F3 frame m has been pushed
/// (m >= 111, the warmup depth).
pub struct CircEncoder {
    payload: Vec<[u8; 24]>,
}

impl CircEncoder {
    pub fn new(payload: Vec<[u8; 24]>) -> Self {
        CircEncoder { payload }
    }

    /// Payload frame m, zero outside the configured range.
    fn d(&self, m: isize) -> [u8; 24] {
        if m < 0 || m as usize >= self.payload.len() {
            [0u8; 24]
        }
        else {
            self.payload[m as usize]
        }
    }

    /// C2 codeword n: payload distributed per the deinterleave tables,
    /// with lanes 12-15 solved for codeword validity.
    fn v(&self, n: isize) -> [u8; 28] {
        let mut word = [0u8; 28];
        let current = self.d(n);
        let delayed = self.d(n + 2);
        for &(out, lane) in CURRENT_LANES.iter() {
            word[lane] = current[out];
        }
        for &(out, lane) in DELAYED_LANES.iter() {
            word[lane] = delayed[out];
        }
        solve_mid_parity(&mut word);
        word
    }

    /// C1 block n: each lane drawn from the C2 codeword it will be
    /// delayed into.
    fn b(&self, n: isize) -> [u8; 28] {
        let mut block = [0u8; 28];
        for (lane, byte) in block.iter_mut().enumerate() {
            *byte = self.v(n + lane_delay(lane) as isize)[lane];
        }
        block
    }

    /// C1 codeword n: block plus RS(32,28) parity.
    fn w(&self, n: isize) -> [u8; 32] {
        let rs = RsCode::new(4);
        let block = self.b(n);
        let parity = rs.encode(&block);
        let mut word = [0u8; 32];
        word[..28].copy_from_slice(&block);
        word[28..].copy_from_slice(&parity);
        word
    }

    /// Generate `count` F3 frames. Frame n carries the even symbols of
    /// codeword n and the odd symbols of codeword n+1 (the encoder-side
    /// one-frame delay), with the parity symbols inverted as on disc.
    pub fn frames(&self, count: usize) -> Vec<F3Frame> {
        (0..count)
            .map(|n| {
                let w_now = self.w(n as isize);
                let w_next = self.w(n as isize + 1);

                let mut frame = F3Frame::default();
                for i in 0..32 {
                    frame.data[i] = if i % 2 == 0 { w_now[i] } else { w_next[i] };
                }
                for i in 12..16 {
                    frame.data[i] ^= 0xFF;
                }
                for i in 28..32 {
                    frame.data[i] ^= 0xFF;
                }
                frame
            })
            .collect()
    }
}

/// Solve lanes 12-15 of a 28-symbol word so all four RS syndromes vanish.
fn solve_mid_parity(word: &mut [u8; 28]) {
    // Syndrome j: sum over lanes of word[lane]*a^(j*(27-lane)) = 0.
    // Unknowns are lanes 12..16; move everything else to the right side.
    let mut matrix = [[0u8; 5]; 4];
    for (j, row) in matrix.iter_mut().enumerate() {
        for k in 0..4 {
            row[k] = gf256::alpha_pow(j * (27 - (12 + k)));
        }
        let mut rhs = 0u8;
        for (lane, &value) in word.iter().enumerate() {
            if !(12..16).contains(&lane) {
                rhs ^= gf256::mul(value, gf256::alpha_pow(j * (27 - lane)));
            }
        }
        row[4] = rhs;
    }

    // Gaussian elimination over GF(2^8)
    for col in 0..4 {
        let pivot = (col..4)
            .find(|&r| matrix[r][col] != 0)
            .expect("singular parity system");
        matrix.swap(col, pivot);

        let inv = gf256::div(1, matrix[col][col]);
        for c in col..5 {
            matrix[col][c] = gf256::mul(matrix[col][c], inv);
        }
        for r in 0..4 {
            if r != col && matrix[r][col] != 0 {
                let factor = matrix[r][col];
                for c in col..5 {
                    matrix[r][c] ^= gf256::mul(factor, matrix[col][c]);
                }
            }
        }
    }

    for k in 0..4 {
        word[12 + k] = matrix[k][4];
    }
}

// Sector building -----------------------------------------------------------

/// Build a valid, descrambled Mode 1 raw sector with patterned user data.
pub fn mode1_sector(address: SectorAddress) -> RawSector {
    let mut raw = RawSector::default();
    raw.data[..12].copy_from_slice(&SECTOR_SYNC_PATTERN);
    let (m, s, f) = address.to_bcd();
    raw.data[12] = m;
    raw.data[13] = s;
    raw.data[14] = f;
    raw.data[15] = 1;
    for i in 16..2064 {
        raw.data[i] = (i * 13 + 7) as u8;
    }
    let checksum = edc::edc_checksum(&raw.data[..edc::EDC_COVERAGE]);
    raw.data[edc::EDC_OFFSET..edc::EDC_OFFSET + 4].copy_from_slice(&checksum.to_le_bytes());
    rspc::generate_p_parity(&mut raw.data);
    rspc::generate_q_parity(&mut raw.data);
    raw
}

/// The same sector as it appears on disc: scrambled, sync intact.
pub fn scrambled_mode1_sector(address: SectorAddress) -> [u8; RAW_SECTOR_LEN] {
    let mut data = mode1_sector(address).data;
    scramble::descramble(&mut data); // self-inverse: this scrambles
    data
}

/// Chunk a byte stream into 24-byte payload frames (zero padded).
pub fn payload_frames(bytes: &[u8]) -> Vec<[u8; 24]> {
    bytes
        .chunks(24)
        .map(|chunk| {
            let mut frame = [0u8; 24];
            frame[..chunk.len()].copy_from_slice(chunk);
            frame
        })
        .collect()
}
