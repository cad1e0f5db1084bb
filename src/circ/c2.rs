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

    src/circ/c2.rs

    The C2 CIRC decoder and final deinterleaver: reverses the encoder's
    unequal delay lines across a 109-block window, applies a (28,24)
    Reed-Solomon decode, then undoes the two-frame even/odd spread and
    drops the parity lanes to produce 24-byte payload frames.

*/

//! Second-stage CIRC decoding.
//!
//! The C2 encoder feeds each of the 28 symbol lanes through a delay line
//! of a different length (multiples of 4 frames, per IEC 60908 fig. 13),
//! spreading a codeword across 109 frames so a long burst error lands in
//! many codewords as a few symbols each. Reversing it requires holding a
//! 109-block history; until the window fills, no output is produced, which
//! keeps block counts aligned between input and output once flowing.

use crate::{
    circ::rs::RsCode,
    types::{C1Block, C2Block, Data24, C1_BLOCK_LEN},
};
use std::collections::VecDeque;

/// Window size implied by the longest delay line (27 lanes x 4 frames).
pub const C2_WINDOW: usize = 109;
/// Window size of the final even/odd deinterleave.
const DEINTERLEAVE_WINDOW: usize = 3;
/// Erasure hints beyond this count are unreliable and dropped wholesale.
const MAX_ERASURE_HINTS: usize = 4;

/// Delay, in blocks, applied by the encoder to symbol lane `lane`; the
/// decoder reads lane `lane` from the window element this many blocks
/// behind the newest.
#[inline]
pub fn lane_delay(lane: usize) -> usize {
    (27 - lane) * 4
}

/// Statistics maintained by the [`C2Decoder`].
#[derive(Copy, Clone, Debug, Default)]
pub struct C2Statistics {
    pub passed: u64,
    pub corrected: u64,
    pub failed: u64,
    pub flushes: u64,
}

impl C2Statistics {
    pub fn total(&self) -> u64 {
        self.passed + self.corrected + self.failed
    }
}

/// Reverses the C2 delay lines and decodes RS(28,24) codewords.
pub struct C2Decoder {
    window: VecDeque<C1Block>,
    rs: RsCode,
    stats: C2Statistics,
}

impl Default for C2Decoder {
    fn default() -> Self {
        C2Decoder {
            window: VecDeque::with_capacity(C2_WINDOW + 1),
            rs: RsCode::new(4),
            stats: Default::default(),
        }
    }
}

impl C2Decoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn statistics(&self) -> &C2Statistics {
        &self.stats
    }

    /// Push a C1 block into the delay window, returning a decoded C2 block
    /// once the window is full.
    pub fn push_block(&mut self, block: C1Block) -> Option<C2Block> {
        self.window.push_back(block);
        if self.window.len() > C2_WINDOW {
            self.window.pop_front();
        }
        if self.window.len() < C2_WINDOW {
            return None;
        }
        Some(self.decode())
    }

    /// Discard the delay window, e.g. after a stream discontinuity.
    pub fn flush(&mut self) {
        self.window.clear();
        self.stats.flushes += 1;
    }

    fn decode(&mut self) -> C2Block {
        // Gather one symbol per lane from its delay position. The newest
        // element is at the back of the window; lane 27 has zero delay.
        let newest = self.window.len() - 1;
        let mut codeword = [0u8; C1_BLOCK_LEN];
        let mut flags = [false; C1_BLOCK_LEN];
        for lane in 0..C1_BLOCK_LEN {
            let element = &self.window[newest - lane_delay(lane)];
            codeword[lane] = element.data[lane];
            flags[lane] = element.errors[lane];
        }

        let mut erasures: Vec<usize> = (0..C1_BLOCK_LEN).filter(|&i| flags[i]).collect();
        if erasures.len() > MAX_ERASURE_HINTS {
            erasures.clear();
        }

        let mut scratch = codeword;
        let outcome = self.rs.decode(&mut scratch, &erasures);

        let mut block = C2Block::default();
        match outcome {
            Ok(fixed) => {
                block.data = scratch;
                block.valid = true;
                if fixed == 0 {
                    self.stats.passed += 1;
                }
                else {
                    self.stats.corrected += 1;
                }
            }
            Err(_) => {
                block.data = codeword;
                block.errors = [true; C1_BLOCK_LEN];
                block.valid = false;
                self.stats.failed += 1;
            }
        }
        block
    }
}

/// Statistics maintained by the [`C2Deinterleaver`].
#[derive(Copy, Clone, Debug, Default)]
pub struct DeinterleaveStatistics {
    pub valid: u64,
    pub invalid: u64,
    pub flushes: u64,
}

/// Undoes the final two-frame even/odd spread of the CIRC encoder and
/// drops the four parity lanes, yielding 24-byte payload frames.
///
/// A frame is valid only if both contributing window elements were valid -
/// a conservative AND, since either contributor can poison any byte.
pub struct C2Deinterleaver {
    window: VecDeque<C2Block>,
    stats: DeinterleaveStatistics,
}

impl Default for C2Deinterleaver {
    fn default() -> Self {
        C2Deinterleaver {
            window: VecDeque::with_capacity(DEINTERLEAVE_WINDOW + 1),
            stats: Default::default(),
        }
    }
}

/// Source lane (within the 28-symbol C2 block) for each output byte taken
/// from the current window element.
#[rustfmt::skip]
pub const CURRENT_LANES: [(usize, usize); 12] = [
    (0, 0), (1, 1), (2, 6), (3, 7),
    (8, 2), (9, 3), (10, 8), (11, 9),
    (16, 4), (17, 5), (18, 10), (19, 11),
];

/// Source lane for each output byte taken from the element two frames
/// back. Lanes 12-15 (the C2 parity) are skipped entirely.
#[rustfmt::skip]
pub const DELAYED_LANES: [(usize, usize); 12] = [
    (4, 16), (5, 17), (6, 22), (7, 23),
    (12, 18), (13, 19), (14, 24), (15, 25),
    (20, 20), (21, 21), (22, 26), (23, 27),
];

impl C2Deinterleaver {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn statistics(&self) -> &DeinterleaveStatistics {
        &self.stats
    }

    /// Push a C2 block, returning a deinterleaved payload frame once three
    /// blocks of history are available.
    pub fn push_block(&mut self, block: C2Block) -> Option<Data24> {
        self.window.push_back(block);
        if self.window.len() > DEINTERLEAVE_WINDOW {
            self.window.pop_front();
        }
        if self.window.len() < DEINTERLEAVE_WINDOW {
            return None;
        }

        let current = &self.window[2];
        let delayed = &self.window[0];

        let mut frame = Data24::default();
        for &(out, lane) in &CURRENT_LANES {
            frame.data[out] = current.data[lane];
            frame.errors[out] = current.errors[lane];
        }
        for &(out, lane) in &DELAYED_LANES {
            frame.data[out] = delayed.data[lane];
            frame.errors[out] = delayed.errors[lane];
        }

        frame.valid = current.valid && delayed.valid;
        if frame.valid {
            self.stats.valid += 1;
        }
        else {
            self.stats.invalid += 1;
        }
        Some(frame)
    }

    /// Discard the window, e.g. after a stream discontinuity.
    pub fn flush(&mut self) {
        self.window.clear();
        self.stats.flushes += 1;
    }
}
