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

    src/circ/mod.rs

    Cross-Interleaved Reed-Solomon (CIRC) error correction: the C1 and C2
    decode stages and the GF(2^8) / Reed-Solomon machinery they share with
    the sector-level codes.

*/

pub mod c1;
pub mod c2;
pub mod gf256;
pub mod rs;

pub use c1::{C1Decoder, C1Statistics};
pub use c2::{C2Decoder, C2Deinterleaver, C2Statistics, DeinterleaveStatistics, C2_WINDOW};
pub use rs::{RsCode, RsError};
