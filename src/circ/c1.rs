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

    src/circ/c1.rs

    The C1 CIRC decoder: reverses the encoder's one-frame delay of
    odd-indexed symbols, undoes the parity inversion, and applies a (32,28)
    Reed-Solomon decode with erasure hints from the EFM stage.

*/

use crate::{
    circ::rs::RsCode,
    types::{C1Block, F3Frame, C1_BLOCK_LEN, F3_DATA_LEN},
};

/// Erasure hints beyond this count are unreliable and dropped wholesale.
const MAX_ERASURE_HINTS: usize = 4;
/// A C1 decode producing more corrections than this is treated as a
/// failure; RS(32,28) only guarantees 2.
const MAX_CORRECTIONS: usize = 2;

/// Statistics maintained by the [`C1Decoder`].
#[derive(Copy, Clone, Debug, Default)]
pub struct C1Statistics {
    pub passed: u64,
    pub corrected: u64,
    pub failed: u64,
    pub flushes: u64,
}

impl C1Statistics {
    pub fn total(&self) -> u64 {
        self.passed + self.corrected + self.failed
    }
}

/// Decodes C1 codewords from successive F3 frames.
///
/// The encoder delays odd-indexed symbols by one frame and inverts the
/// parity symbols (positions 12-15 and 28-31) to keep an all-zero channel
/// from looking like a valid codeword; both are undone here before the RS
/// decode. A block is produced for every frame pushed after the first.
pub struct C1Decoder {
    current_data: [u8; F3_DATA_LEN],
    current_errors: [bool; F3_DATA_LEN],
    previous_data: [u8; F3_DATA_LEN],
    previous_errors: [bool; F3_DATA_LEN],
    buffer_level: usize,
    rs: RsCode,
    stats: C1Statistics,
}

impl Default for C1Decoder {
    fn default() -> Self {
        C1Decoder {
            current_data: [0; F3_DATA_LEN],
            current_errors: [false; F3_DATA_LEN],
            previous_data: [0; F3_DATA_LEN],
            previous_errors: [false; F3_DATA_LEN],
            buffer_level: 0,
            rs: RsCode::new(4),
            stats: Default::default(),
        }
    }
}

impl C1Decoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn statistics(&self) -> &C1Statistics {
        &self.stats
    }

    /// Push an F3 frame, returning a decoded C1 block once two frames of
    /// history are available.
    pub fn push_frame(&mut self, frame: &F3Frame) -> Option<C1Block> {
        self.previous_data = self.current_data;
        self.previous_errors = self.current_errors;
        self.current_data = frame.data;
        self.current_errors = frame.errors;

        if self.buffer_level < 2 {
            self.buffer_level += 1;
        }
        if self.buffer_level < 2 {
            return None;
        }

        Some(self.decode())
    }

    /// Clear the frame history, e.g. after a stream discontinuity.
    pub fn flush(&mut self) {
        self.current_data = [0; F3_DATA_LEN];
        self.current_errors = [false; F3_DATA_LEN];
        self.previous_data = [0; F3_DATA_LEN];
        self.previous_errors = [false; F3_DATA_LEN];
        self.buffer_level = 0;
        self.stats.flushes += 1;
    }

    fn decode(&mut self) -> C1Block {
        // Even-indexed symbols come from the current frame, odd-indexed
        // from the previous (the encoder delayed them by one frame)
        let mut codeword = [0u8; F3_DATA_LEN];
        let mut flags = [false; F3_DATA_LEN];
        for i in (0..F3_DATA_LEN).step_by(2) {
            codeword[i] = self.current_data[i];
            codeword[i + 1] = self.previous_data[i + 1];
            flags[i] = self.current_errors[i];
            flags[i + 1] = self.previous_errors[i + 1];
        }

        // Undo the encoder's parity inversion
        for i in 12..16 {
            codeword[i] ^= 0xFF;
        }
        for i in 28..32 {
            codeword[i] ^= 0xFF;
        }

        let mut erasures: Vec<usize> = (0..F3_DATA_LEN).filter(|&i| flags[i]).collect();
        if erasures.len() > MAX_ERASURE_HINTS {
            // Too many hints to be trustworthy; let the decoder work blind
            erasures.clear();
        }

        let mut scratch = codeword;
        let outcome = self.rs.decode(&mut scratch, &erasures);

        let mut block = C1Block::default();
        match outcome {
            Ok(fixed) if fixed <= MAX_CORRECTIONS => {
                block.data.copy_from_slice(&scratch[..C1_BLOCK_LEN]);
                if fixed == 0 {
                    self.stats.passed += 1;
                }
                else {
                    self.stats.corrected += 1;
                }
            }
            _ => {
                // Uncorrectable: pass the data through with every symbol
                // flagged so downstream stages treat it as erasures
                block.data.copy_from_slice(&codeword[..C1_BLOCK_LEN]);
                block.errors = [true; C1_BLOCK_LEN];
                self.stats.failed += 1;
            }
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circ::rs::RsCode;

    /// Build a pair of F3 frames that interleave into the given 32-byte C1
    /// codeword (parity positions pre-inverted as they appear on disc).
    fn frames_for_codeword(codeword: &[u8; 32]) -> (F3Frame, F3Frame) {
        let mut on_disc = *codeword;
        for i in 12..16 {
            on_disc[i] ^= 0xFF;
        }
        for i in 28..32 {
            on_disc[i] ^= 0xFF;
        }

        let mut first = F3Frame::default();
        let mut second = F3Frame::default();
        for i in (0..32).step_by(2) {
            second.data[i] = on_disc[i];
            first.data[i + 1] = on_disc[i + 1];
        }
        (first, second)
    }

    fn valid_codeword() -> [u8; 32] {
        let code = RsCode::new(4);
        let data: Vec<u8> = (0..28).map(|i| (i * 11 + 5) as u8).collect();
        let parity = code.encode(&data);
        let mut codeword = [0u8; 32];
        codeword[..28].copy_from_slice(&data);
        codeword[28..].copy_from_slice(&parity);
        codeword
    }

    #[test]
    fn clean_pair_passes() {
        let codeword = valid_codeword();
        let (first, second) = frames_for_codeword(&codeword);

        let mut c1 = C1Decoder::new();
        assert!(c1.push_frame(&first).is_none());
        let block = c1.push_frame(&second).expect("block after two frames");

        assert_eq!(&block.data[..], &codeword[..28]);
        assert!(block.errors.iter().all(|&e| !e));
        assert_eq!(c1.statistics().passed, 1);
    }

    #[test]
    fn two_erasured_errors_are_corrected() {
        let codeword = valid_codeword();
        let (mut first, mut second) = frames_for_codeword(&codeword);

        // Corrupt one even symbol (second frame) and one odd (first frame)
        second.data[4] ^= 0xA5;
        second.errors[4] = true;
        first.data[9] ^= 0x3C;
        first.errors[9] = true;

        let mut c1 = C1Decoder::new();
        c1.push_frame(&first);
        let block = c1.push_frame(&second).unwrap();

        assert_eq!(&block.data[..], &codeword[..28]);
        assert!(block.errors.iter().all(|&e| !e));
        assert_eq!(c1.statistics().corrected, 1);
    }

    #[test]
    fn three_erasured_errors_flag_failure() {
        // RS(32,28) can resolve three erasures, but this code only trusts
        // up to two corrections - anything more is flagged as a failed
        // block rather than risking a false fix
        let codeword = valid_codeword();
        let (mut first, mut second) = frames_for_codeword(&codeword);

        for &i in &[2usize, 6, 10] {
            second.data[i] ^= 0x11;
            second.errors[i] = true;
        }

        let mut c1 = C1Decoder::new();
        c1.push_frame(&first);
        let block = c1.push_frame(&second).unwrap();

        assert!(block.errors.iter().all(|&e| e));
        assert_eq!(c1.statistics().failed, 1);
    }

    #[test]
    fn block_count_matches_input_windows() {
        let mut c1 = C1Decoder::new();
        let mut blocks = 0;
        for _ in 0..10 {
            if c1.push_frame(&F3Frame::default()).is_some() {
                blocks += 1;
            }
        }
        // One block per frame after the first, regardless of content
        assert_eq!(blocks, 9);
    }
}
