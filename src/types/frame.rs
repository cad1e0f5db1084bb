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

    src/types/frame.rs

    Defines the frame types passed between decode stages: F3 frames out of
    the framer, C1/C2 blocks out of the CIRC decoders, and Data24 frames
    feeding the audio and sector emitters.

*/

use std::fmt::{self, Display, Formatter};

/// Number of data symbols in an F3 frame (excluding the subcode symbol).
pub const F3_DATA_LEN: usize = 32;
/// Number of symbols in a C1/C2 codeword block.
pub const C1_BLOCK_LEN: usize = 28;
/// Number of data symbols left after C2 parity is dropped.
pub const DATA24_LEN: usize = 24;

/// Discriminates the subcode position of an F3 frame. Two reserved channel
/// patterns mark the start of a subcode section (Sync0 followed by Sync1);
/// every other frame carries an ordinary subcode symbol.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameType {
    #[default]
    Subcode,
    Sync0,
    Sync1,
}

impl Display for FrameType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Subcode => write!(f, "Subcode"),
            FrameType::Sync0 => write!(f, "Sync0"),
            FrameType::Sync1 => write!(f, "Sync1"),
        }
    }
}

/// An F3 frame as defined by clause 18 of ECMA-130: one subcode symbol plus
/// 32 data symbols, each data symbol carrying an error flag set when the
/// symbol could not be translated from a valid channel pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct F3Frame {
    pub frame_type: FrameType,
    pub subcode: u8,
    pub data: [u8; F3_DATA_LEN],
    pub errors: [bool; F3_DATA_LEN],
}

impl Default for F3Frame {
    fn default() -> Self {
        F3Frame {
            frame_type: FrameType::Subcode,
            subcode: 0,
            data: [0; F3_DATA_LEN],
            errors: [false; F3_DATA_LEN],
        }
    }
}

impl F3Frame {
    /// Count of data symbols flagged as errors.
    pub fn error_count(&self) -> usize {
        self.errors.iter().filter(|&&e| e).count()
    }
}

/// A C1-corrected block: 28 data symbols with per-symbol error flags.
/// Produced by the C1 decoder, consumed by the C2 delay lines.
#[derive(Copy, Clone, Debug)]
pub struct C1Block {
    pub data: [u8; C1_BLOCK_LEN],
    pub errors: [bool; C1_BLOCK_LEN],
}

impl Default for C1Block {
    fn default() -> Self {
        C1Block {
            data: [0; C1_BLOCK_LEN],
            errors: [false; C1_BLOCK_LEN],
        }
    }
}

/// A C2-corrected block: still 28 symbols wide (parity lanes are dropped by
/// the deinterleaver, not the decoder), plus a block validity flag.
#[derive(Copy, Clone, Debug)]
pub struct C2Block {
    pub data: [u8; C1_BLOCK_LEN],
    pub errors: [bool; C1_BLOCK_LEN],
    pub valid: bool,
}

impl Default for C2Block {
    fn default() -> Self {
        C2Block {
            data: [0; C1_BLOCK_LEN],
            errors: [false; C1_BLOCK_LEN],
            valid: false,
        }
    }
}

/// A fully deinterleaved 24-byte payload frame - the unit consumed by the
/// audio and sector emitters. `valid` is the conservative AND of the
/// contributing C2 blocks; `padded` marks frames synthesized to fill a gap
/// rather than decoded from the stream.
#[derive(Copy, Clone, Debug)]
pub struct Data24 {
    pub data: [u8; DATA24_LEN],
    pub errors: [bool; DATA24_LEN],
    pub valid: bool,
    pub padded: bool,
}

impl Default for Data24 {
    fn default() -> Self {
        Data24 {
            data: [0; DATA24_LEN],
            errors: [false; DATA24_LEN],
            valid: false,
            padded: false,
        }
    }
}

impl Data24 {
    /// A zero-filled padding frame used when sections are missing from the
    /// input stream.
    pub fn padding() -> Data24 {
        Data24 {
            data: [0; DATA24_LEN],
            errors: [true; DATA24_LEN],
            valid: false,
            padded: true,
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.iter().filter(|&&e| e).count()
    }
}
