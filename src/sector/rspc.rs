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

    src/sector/rspc.rs

    The Mode 1 sector's two-dimensional Reed-Solomon Product-like Code:
    a Q pass of 52 RS(45,43) codewords over a diagonal permutation of the
    sector body, and a P pass of 86 RS(26,24) codewords over its columns.
    Codeword positions are given by pure index-mapping functions so the
    permutations can be tested apart from the byte shuffling.

*/

//! ECMA-130 Annex A sector ECC.
//!
//! Both passes split the sector body (bytes 12..2076, past the 12 sync
//! bytes) by even/odd byte lane - the low and high halves of 16-bit words
//! are protected by independent codewords. The Q parity lives at offset
//! 2248..2352 of the sector, the P parity at 2076..2248. Each pass decodes
//! every codeword, writing corrections back in place; a pass "succeeds"
//! when all of its codewords decode.

use crate::{circ::rs::RsCode, types::RAW_SECTOR_LEN};

/// Bytes skipped at the front of the sector (the sync pattern).
const BODY_OFFSET: usize = 12;
/// Number of Q codewords (26 diagonals x 2 byte lanes).
pub const Q_CODEWORDS: u32 = 52;
/// Number of P codewords (43 columns x 2 byte lanes).
pub const P_CODEWORDS: u32 = 86;
/// Byte offset (past the sync) where the Q parity block starts.
const Q_PARITY_BASE: usize = 2236;
/// Erasure hints per codeword beyond this count are dropped.
const MAX_ERASURE_HINTS: usize = 2;

/// Byte offset (past the 12 sync bytes) of data element `mq` of Q-parity
/// diagonal `nq`, in the given even/odd byte lane.
#[inline]
pub fn q_data_offset(mq: usize, nq: usize, even_odd: usize) -> usize {
    2 * ((44 * mq + 43 * nq) % 1118) + even_odd
}

/// Byte offsets (past the sync bytes) of the two parity bytes of Q
/// diagonal `nq`.
#[inline]
pub fn q_parity_offsets(nq: usize, even_odd: usize) -> (usize, usize) {
    (
        Q_PARITY_BASE + 2 * ((43 * 26 + nq) % 1118) + even_odd,
        Q_PARITY_BASE + 2 * ((44 * 26 + nq) % 1118) + even_odd,
    )
}

/// Byte offset (past the sync bytes) of element `mp` of P-parity column
/// `np`, in the given even/odd byte lane. Elements 24 and 25 are the
/// column's parity bytes.
#[inline]
pub fn p_data_offset(mp: usize, np: usize, even_odd: usize) -> usize {
    2 * (43 * mp + np) + even_odd
}

/// Run the Q-parity pass over a raw sector in place. Returns the number of
/// codewords that decoded successfully (52 means the pass succeeded).
pub fn q_parity_pass(
    data: &mut [u8; RAW_SECTOR_LEN],
    erasures: &[bool; RAW_SECTOR_LEN],
) -> u32 {
    let rs = RsCode::new(2);
    let body = BODY_OFFSET;
    let mut successes = 0;

    for even_odd in 0..2 {
        for nq in 0..26 {
            let mut codeword = [0u8; 45];
            let mut hints: Vec<usize> = Vec::new();

            for mq in 0..43 {
                let offset = body + q_data_offset(mq, nq, even_odd);
                codeword[mq] = data[offset];
                if erasures[offset] {
                    hints.push(mq);
                }
            }
            let (p0, p1) = q_parity_offsets(nq, even_odd);
            codeword[43] = data[body + p0];
            codeword[44] = data[body + p1];

            if hints.len() > MAX_ERASURE_HINTS {
                hints.clear();
            }

            if rs.decode(&mut codeword, &hints).is_ok() {
                successes += 1;
                for mq in 0..43 {
                    data[body + q_data_offset(mq, nq, even_odd)] = codeword[mq];
                }
            }
        }
    }
    successes
}

/// Run the P-parity pass over a raw sector in place. Returns the number of
/// codewords that decoded successfully (86 means the pass succeeded).
pub fn p_parity_pass(
    data: &mut [u8; RAW_SECTOR_LEN],
    erasures: &[bool; RAW_SECTOR_LEN],
) -> u32 {
    let rs = RsCode::new(2);
    let body = BODY_OFFSET;
    let mut successes = 0;

    for even_odd in 0..2 {
        for np in 0..43 {
            let mut codeword = [0u8; 26];
            let mut hints: Vec<usize> = Vec::new();

            for mp in 0..26 {
                let offset = body + p_data_offset(mp, np, even_odd);
                codeword[mp] = data[offset];
                if erasures[offset] {
                    hints.push(mp);
                }
            }

            if hints.len() > MAX_ERASURE_HINTS {
                hints.clear();
            }

            if rs.decode(&mut codeword, &hints).is_ok() {
                successes += 1;
                for mp in 0..24 {
                    data[body + p_data_offset(mp, np, even_odd)] = codeword[mp];
                }
            }
        }
    }
    successes
}

/// Generate valid Q parity for a sector body in place. Used to build
/// reference sectors; decoding is the interesting direction.
pub fn generate_q_parity(data: &mut [u8; RAW_SECTOR_LEN]) {
    let rs = RsCode::new(2);
    for even_odd in 0..2 {
        for nq in 0..26 {
            let mut message = [0u8; 43];
            for (mq, byte) in message.iter_mut().enumerate() {
                *byte = data[BODY_OFFSET + q_data_offset(mq, nq, even_odd)];
            }
            let parity = rs.encode(&message);
            let (p0, p1) = q_parity_offsets(nq, even_odd);
            data[BODY_OFFSET + p0] = parity[0];
            data[BODY_OFFSET + p1] = parity[1];
        }
    }
}

/// Generate valid P parity for a sector body in place.
pub fn generate_p_parity(data: &mut [u8; RAW_SECTOR_LEN]) {
    let rs = RsCode::new(2);
    for even_odd in 0..2 {
        for np in 0..43 {
            let mut message = [0u8; 24];
            for (mp, byte) in message.iter_mut().enumerate() {
                *byte = data[BODY_OFFSET + p_data_offset(mp, np, even_odd)];
            }
            let parity = rs.encode(&message);
            data[BODY_OFFSET + p_data_offset(24, np, even_odd)] = parity[0];
            data[BODY_OFFSET + p_data_offset(25, np, even_odd)] = parity[1];
        }
    }
}
